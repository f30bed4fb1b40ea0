// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Network node access.
//!
//! ## Modules
//!
//! - `types` - Wire types (last block, spam statistics, sending mode)
//! - `http` - [`Node`] implementation over the node's REST API
//! - `selector` - Round-robin [`NodeSelector`] with bounded retries

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::RequestContext;
use crate::interaction::LogType;
use crate::transaction::Transaction;

pub mod http;
pub mod selector;
pub mod types;

pub use http::HttpNode;
pub use selector::RoundRobinSelector;
pub use types::{
    LastBlock, PowBlockState, PowStatistics, SendingMode, SpamStatistic, SpamStatistics,
    VoteSpamStatistics,
};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum NodeError {
    #[error("could not reach the node {host}: {reason}")]
    Unreachable { host: String, reason: String },

    #[error("the node {host} returned an unexpected response: {reason}")]
    InvalidResponse { host: String, reason: String },

    /// The network refused the transaction.
    #[error("the transaction failed: {message}")]
    TransactionRejected { code: u32, message: String },

    #[error("no healthy node available")]
    NoHealthyNode,

    #[error("the request has been interrupted")]
    Interrupted,
}

/// Progress callback invoked by node selection, for front-end feedback.
pub type ReportingHook<'a> = &'a (dyn Fn(LogType, String) + Send + Sync);

/// Reporting hook that discards every report.
pub fn no_report(_: LogType, _: String) {}

#[async_trait]
pub trait Node: Send + Sync {
    fn host(&self) -> &str;

    async fn last_block(&self) -> Result<LastBlock, NodeError>;

    async fn spam_statistics(&self, public_key: &str) -> Result<SpamStatistics, NodeError>;

    /// Runs the node's checks on `tx` without broadcasting it.
    async fn check_transaction(&self, tx: &Transaction) -> Result<(), NodeError>;

    /// Broadcasts `tx`, returning the hash the node assigned to it.
    async fn send_transaction(
        &self,
        tx: &Transaction,
        mode: SendingMode,
    ) -> Result<String, NodeError>;

    async fn health_check(&self) -> Result<(), NodeError> {
        self.last_block().await.map(|_| ())
    }
}

#[async_trait]
pub trait NodeSelector: Send + Sync {
    /// Returns a node that answered its health check.
    async fn node(
        &self,
        ctx: &RequestContext,
        report: ReportingHook<'_>,
    ) -> Result<Arc<dyn Node>, NodeError>;
}
