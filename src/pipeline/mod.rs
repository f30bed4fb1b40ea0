// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Transaction Authorization Pipeline
//!
//! Orchestrates every sensitive request a connected application makes:
//!
//! ```text
//! params -> key policy -> review -> node -> spam checks -> PoW + sign -> dispatch -> notify
//! ```
//!
//! The pipeline owns no global state. Its collaborators are injected as
//! trait objects so tests can script each of them.
//!
//! ## Modules
//!
//! - `transaction` - check, sign and send
//! - `keys` - key listing and the permission request workflow
//! - `connect` - wallet connection workflow
//! - `request_controller` - one in-flight transaction per public key

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::connections::SessionRegistry;
use crate::context::RequestContext;
use crate::error::{ApiError, ERR_COULD_NOT_GET_CHAIN_ID_FROM_NODE, ERR_NO_HEALTHY_NODE_AVAILABLE};
use crate::interaction::{
    ErrorType, FailedTransaction, InteractionError, InteractionSession, Interactor, LogType,
    SuccessfulTransaction,
};
use crate::node::{LastBlock, NodeError, NodeSelector};
use crate::spam::SpamGuard;
use crate::wallet::WalletStore;

pub mod connect;
pub mod keys;
pub mod request_controller;
pub mod transaction;

pub use request_controller::{KeyLease, RequestController};
pub use transaction::{AuthorizationMode, AuthorizedTransaction, TransactionRequest};

pub struct TransactionAuthorizationPipeline {
    wallet_store: Arc<dyn WalletStore>,
    interactor: Arc<dyn Interactor>,
    node_selector: Arc<dyn NodeSelector>,
    spam_guard: Arc<dyn SpamGuard>,
    request_controller: RequestController,
    registry: Arc<SessionRegistry>,
}

impl TransactionAuthorizationPipeline {
    pub fn new(
        wallet_store: Arc<dyn WalletStore>,
        interactor: Arc<dyn Interactor>,
        node_selector: Arc<dyn NodeSelector>,
        spam_guard: Arc<dyn SpamGuard>,
        request_controller: RequestController,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            wallet_store,
            interactor,
            node_selector,
            spam_guard,
            request_controller,
            registry,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Chain ID of the network, as reported by a healthy node.
    pub async fn get_chain_id(&self, ctx: &RequestContext) -> Result<String, ApiError> {
        self.last_block(ctx).await.map(|block| block.chain_id)
    }

    /// Last block a healthy node knows about.
    pub async fn last_block(&self, ctx: &RequestContext) -> Result<LastBlock, ApiError> {
        let report = |log_type: LogType, message: String| {
            debug!(trace_id = %ctx.trace_id(), ?log_type, "{message}");
        };
        let node = self
            .node_selector
            .node(ctx, &report)
            .await
            .map_err(|e| match e {
                NodeError::Interrupted => ApiError::request_interrupted(),
                _ => ApiError::network(ERR_NO_HEALTHY_NODE_AVAILABLE),
            })?;

        interruptible(ctx.cancellation(), node.last_block())
            .await
            .map_err(|e| match e {
                NodeError::Interrupted => ApiError::request_interrupted(),
                e => {
                    debug!(node = %node.host(), error = %e, "Could not get the last block");
                    ApiError::network(ERR_COULD_NOT_GET_CHAIN_ID_FROM_NODE)
                }
            })
    }
}

/// Runs a node call, giving up with [`NodeError::Interrupted`] when the
/// request is cancelled.
async fn interruptible<T>(
    cancellation: &CancellationToken,
    call: impl std::future::Future<Output = Result<T, NodeError>>,
) -> Result<T, NodeError> {
    tokio::select! {
        biased;
        _ = cancellation.cancelled() => Err(NodeError::Interrupted),
        result = call => result,
    }
}

/// Front-end feedback for one request.
///
/// Connections that need no interaction open no session, and all the
/// notifications are then skipped.
struct Feedback {
    session: Option<InteractionSession>,
}

impl Feedback {
    fn silent() -> Self {
        Self { session: None }
    }

    fn session(session: InteractionSession) -> Self {
        Self {
            session: Some(session),
        }
    }

    fn log(&self, log_type: LogType, message: &str) {
        if let Some(session) = &self.session {
            session.log(log_type, message);
        }
    }

    fn fail(&self, error_type: ErrorType, error: ApiError) -> ApiError {
        match &self.session {
            Some(session) => session.fail(error_type, error),
            None => error,
        }
    }

    fn flow_error(&self, error: InteractionError, internal_context: &str) -> ApiError {
        match &self.session {
            Some(session) => session.flow_error(error, internal_context),
            None => ApiError::internal(format!("{internal_context}: {error}")),
        }
    }

    fn notify_success(&self, step: u8, message: &str) {
        if let Some(session) = &self.session {
            session.notify_success(step, message);
        }
    }

    fn notify_successful_transaction(&self, step: u8, transaction: SuccessfulTransaction) {
        if let Some(session) = &self.session {
            session
                .interactor()
                .notify_successful_transaction(session.trace_id(), step, transaction);
        }
    }

    fn notify_failed_transaction(&self, step: u8, transaction: FailedTransaction) {
        if let Some(session) = &self.session {
            session
                .interactor()
                .notify_failed_transaction(session.trace_id(), step, transaction);
        }
    }
}
