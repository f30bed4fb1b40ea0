// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Interaction Coordinator
//!
//! Every sensitive action a connected application asks for is mediated by
//! the user through a front-end. The service talks to that front-end through
//! the [`Interactor`] trait:
//!
//! - request calls (`request_*`) block until the user answers, the user
//!   closes the connection, or the request context is cancelled;
//! - notification calls (`notify_*`, `log`) are fire-and-forget and never
//!   fail the caller.
//!
//! All the calls of one workflow share the request's trace ID and are
//! framed by a session-began / session-ended pair. [`InteractionSession`]
//! guarantees the session-ended notification is sent exactly once, on every
//! exit path, when it goes out of scope.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::context::RequestContext;
use crate::error::{
    ApiError, ERR_CONNECTION_CLOSED, ERR_REQUEST_INTERRUPTED, ERR_USER_CANCELLED_THE_REQUEST,
    ERR_WRONG_PASSPHRASE,
};
use crate::transaction::Transaction;
use crate::wallet::{StoreError, WalletStore};

pub mod automatic;
pub mod channel;
pub mod front_end;

pub use automatic::AutomaticConsentResponder;
pub use channel::{ChannelInteractor, Interaction, UserResponse};
pub use front_end::{FrontEndError, FrontEndQueue, InteractionEvent, InteractionResponse};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum InteractionError {
    #[error("the connection has been closed")]
    UserClosedConnection,

    #[error("the user cancelled the request")]
    UserCancelledRequest,

    #[error("the request has been interrupted")]
    RequestInterrupted,

    #[error("the interaction failed: {0}")]
    Internal(String),
}

/// Workflow announced when an interaction session begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Workflow {
    WalletConnection,
    PermissionRequest,
    TransactionReview,
    WalletUnlocking,
}

impl Workflow {
    /// Number of steps the front-end should render for this workflow.
    pub fn total_steps(&self) -> u8 {
        match self {
            Workflow::WalletConnection => 3,
            Workflow::PermissionRequest => 3,
            Workflow::TransactionReview => 2,
            Workflow::WalletUnlocking => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    InternalError,
    ServerError,
    NetworkError,
    ApplicationError,
    UserError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogType {
    Info,
    Warning,
    Error,
    Success,
}

/// What the user is asked to approve a transaction for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewKind {
    Checking,
    Signing,
    Sending,
}

/// One pending transaction review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub step: u8,
    pub kind: ReviewKind,
    pub hostname: String,
    pub wallet: String,
    pub public_key: String,
    /// Human-readable rendition of the transaction.
    pub transaction: String,
    pub received_at: DateTime<Utc>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct SelectedWallet {
    pub wallet: String,
    pub passphrase: String,
}

impl fmt::Debug for SelectedWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedWallet")
            .field("wallet", &self.wallet)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessfulTransaction {
    pub tx_hash: String,
    pub transaction: String,
    pub tx: Transaction,
    pub sent_at: DateTime<Utc>,
    pub node_host: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedTransaction {
    pub transaction: String,
    pub tx: Transaction,
    pub error: String,
    pub sent_at: DateTime<Utc>,
    pub node_host: String,
}

#[async_trait]
pub trait Interactor: Send + Sync {
    async fn notify_interaction_session_began(
        &self,
        ctx: &RequestContext,
        workflow: Workflow,
        total_steps: u8,
    ) -> Result<(), InteractionError>;

    fn notify_interaction_session_ended(&self, trace_id: &str);

    fn notify_successful_request(&self, trace_id: &str, step: u8, message: &str);

    fn notify_successful_transaction(
        &self,
        trace_id: &str,
        step: u8,
        transaction: SuccessfulTransaction,
    );

    fn notify_failed_transaction(&self, trace_id: &str, step: u8, transaction: FailedTransaction);

    fn notify_error(&self, trace_id: &str, error_type: ErrorType, error: &str);

    fn log(&self, trace_id: &str, log_type: LogType, message: &str);

    async fn request_wallet_connection_review(
        &self,
        ctx: &RequestContext,
        step: u8,
        hostname: &str,
    ) -> Result<bool, InteractionError>;

    async fn request_wallet_selection(
        &self,
        ctx: &RequestContext,
        step: u8,
        hostname: &str,
        available_wallets: &[String],
    ) -> Result<SelectedWallet, InteractionError>;

    async fn request_passphrase(
        &self,
        ctx: &RequestContext,
        step: u8,
        wallet: &str,
        reason: &str,
    ) -> Result<String, InteractionError>;

    async fn request_permissions_review(
        &self,
        ctx: &RequestContext,
        step: u8,
        hostname: &str,
        wallet: &str,
        permissions: &BTreeMap<String, String>,
    ) -> Result<bool, InteractionError>;

    async fn request_transaction_review(
        &self,
        ctx: &RequestContext,
        review: &ReviewRequest,
    ) -> Result<bool, InteractionError>;
}

/// An open interaction session.
///
/// Dropping it notifies the end of the session.
pub struct InteractionSession {
    interactor: Arc<dyn Interactor>,
    trace_id: String,
}

impl InteractionSession {
    pub async fn begin(
        interactor: Arc<dyn Interactor>,
        ctx: &RequestContext,
        workflow: Workflow,
    ) -> Result<Self, InteractionError> {
        interactor
            .notify_interaction_session_began(ctx, workflow, workflow.total_steps())
            .await?;
        Ok(Self {
            interactor,
            trace_id: ctx.trace_id().to_string(),
        })
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn interactor(&self) -> &dyn Interactor {
        self.interactor.as_ref()
    }

    pub fn log(&self, log_type: LogType, message: &str) {
        self.interactor.log(&self.trace_id, log_type, message);
    }

    pub fn notify_success(&self, step: u8, message: &str) {
        self.interactor
            .notify_successful_request(&self.trace_id, step, message);
    }

    /// Relays `error` to the front-end and hands it back.
    pub fn fail(&self, error_type: ErrorType, error: ApiError) -> ApiError {
        self.interactor
            .notify_error(&self.trace_id, error_type, error.data_text());
        error
    }

    /// Converts a failed request call into the error returned to the caller.
    pub fn flow_error(&self, error: InteractionError, internal_context: &str) -> ApiError {
        request_flow_error(self.interactor.as_ref(), &self.trace_id, error, internal_context)
    }

    /// Asks the passphrase of `wallet` until the store accepts it.
    ///
    /// A wrong passphrase is reported to the user, who is asked again.
    pub async fn unlock_wallet(
        &self,
        ctx: &RequestContext,
        store: &dyn WalletStore,
        step: u8,
        wallet: &str,
        reason: &str,
    ) -> Result<(), ApiError> {
        loop {
            let passphrase = self
                .interactor
                .request_passphrase(ctx, step, wallet, reason)
                .await
                .map_err(|e| self.flow_error(e, "requesting the passphrase failed"))?;

            match store.unlock_wallet(wallet, &passphrase).await {
                Ok(()) => return Ok(()),
                Err(StoreError::WrongPassphrase) => {
                    self.interactor
                        .notify_error(&self.trace_id, ErrorType::UserError, ERR_WRONG_PASSPHRASE);
                }
                Err(e) => {
                    return Err(self.fail(
                        ErrorType::InternalError,
                        ApiError::internal(format!("could not unlock the wallet: {e}")),
                    ));
                }
            }
        }
    }
}

impl Drop for InteractionSession {
    fn drop(&mut self) {
        self.interactor.notify_interaction_session_ended(&self.trace_id);
    }
}

/// Maps a failed request call onto its error class and notifies the
/// front-end about it.
pub fn request_flow_error(
    interactor: &dyn Interactor,
    trace_id: &str,
    error: InteractionError,
    internal_context: &str,
) -> ApiError {
    match error {
        InteractionError::UserClosedConnection => {
            interactor.notify_error(trace_id, ErrorType::ApplicationError, ERR_CONNECTION_CLOSED);
            ApiError::connection_closed()
        }
        InteractionError::UserCancelledRequest => {
            interactor.notify_error(
                trace_id,
                ErrorType::ApplicationError,
                ERR_USER_CANCELLED_THE_REQUEST,
            );
            ApiError::user_cancellation()
        }
        InteractionError::RequestInterrupted => {
            interactor.notify_error(trace_id, ErrorType::ServerError, ERR_REQUEST_INTERRUPTED);
            ApiError::request_interrupted()
        }
        InteractionError::Internal(reason) => {
            let error = ApiError::internal(format!("{internal_context}: {reason}"));
            interactor.notify_error(trace_id, ErrorType::InternalError, error.data_text());
            error
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::codes;
    use tokio::sync::mpsc;

    fn count_ended(rx: &mut mpsc::UnboundedReceiver<Interaction>) -> usize {
        let mut ended = 0;
        while let Ok(interaction) = rx.try_recv() {
            if matches!(interaction, Interaction::SessionEnded { .. }) {
                ended += 1;
            }
        }
        ended
    }

    #[tokio::test]
    async fn session_end_is_sent_once_when_dropped() {
        let (interactor, mut rx) = ChannelInteractor::channel();
        let interactor: Arc<dyn Interactor> = Arc::new(interactor);
        let ctx = RequestContext::with_trace_id("trace-1");

        {
            let session =
                InteractionSession::begin(interactor.clone(), &ctx, Workflow::TransactionReview)
                    .await
                    .unwrap();
            assert_eq!(session.trace_id(), "trace-1");
            match rx.recv().await.unwrap() {
                Interaction::SessionBegan {
                    trace_id,
                    workflow,
                    total_steps,
                } => {
                    assert_eq!(trace_id, "trace-1");
                    assert_eq!(workflow, Workflow::TransactionReview);
                    assert_eq!(total_steps, 2);
                }
                other => panic!("unexpected interaction {other:?}"),
            }
        }

        assert_eq!(count_ended(&mut rx), 1);
    }

    #[tokio::test]
    async fn flow_errors_map_to_their_class() {
        let (interactor, mut rx) = ChannelInteractor::channel();

        let closed =
            request_flow_error(&interactor, "t", InteractionError::UserClosedConnection, "x");
        assert_eq!(closed.code, codes::CONNECTION_CLOSED);

        let interrupted =
            request_flow_error(&interactor, "t", InteractionError::RequestInterrupted, "x");
        assert_eq!(interrupted.code, codes::REQUEST_HAS_BEEN_INTERRUPTED);

        let internal = request_flow_error(
            &interactor,
            "t",
            InteractionError::Internal("boom".to_string()),
            "reviewing the transaction failed",
        );
        assert_eq!(internal.code, codes::INTERNAL_ERROR);
        assert_eq!(internal.data_text(), "reviewing the transaction failed: boom");

        let mut error_types = Vec::new();
        while let Ok(Interaction::ErrorOccurred { error_type, .. }) = rx.try_recv() {
            error_types.push(error_type);
        }
        assert_eq!(
            error_types,
            vec![
                ErrorType::ApplicationError,
                ErrorType::ServerError,
                ErrorType::InternalError
            ]
        );
    }
}
