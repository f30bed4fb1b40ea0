// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Round-robin node selection with bounded retries.
//!
//! Each call starts from the node after the one the previous call started
//! from and health-checks every node once per pass. After `max_retries`
//! failed passes the selector gives up with [`NodeError::NoHealthyNode`].
//! The rotating cursor is the only shared state.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{Node, NodeError, NodeSelector, ReportingHook};
use crate::context::RequestContext;
use crate::interaction::LogType;

pub struct RoundRobinSelector {
    nodes: Vec<Arc<dyn Node>>,
    cursor: AtomicUsize,
    max_retries: u32,
    retry_delay: Duration,
}

impl RoundRobinSelector {
    pub fn new(nodes: Vec<Arc<dyn Node>>, max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            nodes,
            cursor: AtomicUsize::new(0),
            max_retries: max_retries.max(1),
            retry_delay,
        }
    }

    pub fn hosts(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.host().to_string()).collect()
    }
}

#[async_trait]
impl NodeSelector for RoundRobinSelector {
    async fn node(
        &self,
        ctx: &RequestContext,
        report: ReportingHook<'_>,
    ) -> Result<Arc<dyn Node>, NodeError> {
        if self.nodes.is_empty() {
            report(LogType::Error, "No node is configured".to_string());
            return Err(NodeError::NoHealthyNode);
        }

        let count = self.nodes.len();
        for attempt in 1..=self.max_retries {
            let start = self.cursor.fetch_add(1, Ordering::Relaxed) % count;

            for offset in 0..count {
                if ctx.is_cancelled() {
                    return Err(NodeError::Interrupted);
                }
                let node = &self.nodes[(start + offset) % count];
                report(LogType::Info, format!("Checking node {}...", node.host()));

                let checked = tokio::select! {
                    biased;
                    _ = ctx.cancelled() => return Err(NodeError::Interrupted),
                    checked = node.health_check() => checked,
                };

                match checked {
                    Ok(()) => {
                        debug!(node = %node.host(), attempt, "Selected healthy node");
                        report(LogType::Success, format!("Using node {}", node.host()));
                        return Ok(Arc::clone(node));
                    }
                    Err(e) => {
                        warn!(node = %node.host(), attempt, error = %e, "Node is not healthy");
                        report(
                            LogType::Warning,
                            format!("Node {} is not healthy: {e}", node.host()),
                        );
                    }
                }
            }

            if attempt < self.max_retries {
                report(
                    LogType::Info,
                    format!(
                        "No healthy node found, retrying in {}ms ({attempt}/{})",
                        self.retry_delay.as_millis(),
                        self.max_retries
                    ),
                );
                tokio::select! {
                    biased;
                    _ = ctx.cancelled() => return Err(NodeError::Interrupted),
                    _ = tokio::time::sleep(self.retry_delay) => {}
                }
            }
        }

        report(LogType::Error, "No healthy node available".to_string());
        Err(NodeError::NoHealthyNode)
    }
}
