// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::interaction::FrontEndQueue;
use crate::pipeline::TransactionAuthorizationPipeline;

/// Interactions endpoint of an attached front-end.
#[derive(Clone)]
pub struct FrontEnd {
    pub queue: Arc<FrontEndQueue>,
    /// Bearer token the front-end authenticates with.
    pub token: String,
}

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<TransactionAuthorizationPipeline>,
    pub network_name: String,
    /// Cancelled on shutdown; every request context derives from it.
    pub shutdown: CancellationToken,
    /// `None` when reviews are answered automatically.
    pub front_end: Option<FrontEnd>,
}

impl AppState {
    pub fn new(
        pipeline: Arc<TransactionAuthorizationPipeline>,
        network_name: impl Into<String>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            pipeline,
            network_name: network_name.into(),
            shutdown,
            front_end: None,
        }
    }

    pub fn with_front_end(mut self, queue: Arc<FrontEndQueue>, token: impl Into<String>) -> Self {
        self.front_end = Some(FrontEnd {
            queue,
            token: token.into(),
        });
        self
    }
}
