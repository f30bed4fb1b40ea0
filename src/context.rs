// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-request context: trace ID and cancellation signal.

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use uuid::Uuid;

/// Context carried through one JSON-RPC request.
///
/// The trace ID ties together every interaction sent to the front-end for
/// the request. The cancellation token fires when the caller goes away or
/// the service shuts down; long waits select on it.
#[derive(Debug, Clone)]
pub struct RequestContext {
    trace_id: String,
    cancellation: CancellationToken,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::with_trace_id(Uuid::new_v4().to_string())
    }

    pub fn with_trace_id(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Derives a context that is cancelled when `parent` is.
    pub fn child_of(parent: &CancellationToken) -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string(),
            cancellation: parent.child_token(),
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancellation.cancelled()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_context_follows_parent_cancellation() {
        let shutdown = CancellationToken::new();
        let ctx = RequestContext::child_of(&shutdown);
        assert!(!ctx.is_cancelled());
        shutdown.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn each_context_gets_its_own_trace_id() {
        let a = RequestContext::new();
        let b = RequestContext::new();
        assert_ne!(a.trace_id(), b.trace_id());
        assert_eq!(RequestContext::with_trace_id("t-1").trace_id(), "t-1");
    }
}
