// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Check, sign and send.
//!
//! | Mode | Review | Node calls | Result |
//! |------|--------|------------|--------|
//! | check | checking | spam statistics, check | signed transaction |
//! | sign | signing | spam statistics | signed transaction |
//! | send | sending | spam statistics, send | signed transaction + hash |
//!
//! Every mode proves work and signs against the node's latest block, so a
//! signed transaction can be broadcast by the caller as-is.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use utoipa::ToSchema;

use super::{interruptible, Feedback, TransactionAuthorizationPipeline};
use crate::connections::ConnectedWallet;
use crate::context::RequestContext;
use crate::error::{
    codes, ApiError, ERR_COULD_NOT_GET_LAST_BLOCK_INFORMATION, ERR_NO_HEALTHY_NODE_AVAILABLE,
    ERR_PUBLIC_KEY_IS_NOT_ALLOWED_TO_BE_USED, ERR_PUBLIC_KEY_IS_REQUIRED,
    ERR_TRANSACTION_IS_REQUIRED, ERR_USER_REJECTED_CHECKING_OF_TRANSACTION,
    ERR_USER_REJECTED_SENDING_OF_TRANSACTION, ERR_USER_REJECTED_SIGNING_OF_TRANSACTION,
};
use crate::interaction::{
    ErrorType, FailedTransaction, InteractionSession, LogType, ReviewKind, ReviewRequest,
    SuccessfulTransaction, Workflow,
};
use crate::node::{Node, NodeError, SendingMode, SpamStatistics};
use crate::spam::{clamp_ttl, ProofOfWorkSolution, SpamError};
use crate::transaction::{sign_transaction, Command, InputData, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationMode {
    Check,
    Sign,
    Send(SendingMode),
}

impl AuthorizationMode {
    fn review_kind(&self) -> ReviewKind {
        match self {
            AuthorizationMode::Check => ReviewKind::Checking,
            AuthorizationMode::Sign => ReviewKind::Signing,
            AuthorizationMode::Send(_) => ReviewKind::Sending,
        }
    }

    fn rejection(&self) -> &'static str {
        match self {
            AuthorizationMode::Check => ERR_USER_REJECTED_CHECKING_OF_TRANSACTION,
            AuthorizationMode::Sign => ERR_USER_REJECTED_SIGNING_OF_TRANSACTION,
            AuthorizationMode::Send(_) => ERR_USER_REJECTED_SENDING_OF_TRANSACTION,
        }
    }
}

/// Parameters of `client.check_transaction`, `client.sign_transaction` and
/// `client.send_transaction`.
#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    #[serde(default)]
    pub public_key: String,
    /// A single command, such as `{"transfer": {...}}`.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub transaction: Value,
    /// TTL in blocks. Capped to the network maximum.
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl TransactionRequest {
    /// Checks the parameters without touching any collaborator.
    pub fn validate(&self) -> Result<Command, ApiError> {
        if self.public_key.is_empty() {
            return Err(ApiError::invalid_params(ERR_PUBLIC_KEY_IS_REQUIRED));
        }
        if self.transaction.is_null() {
            return Err(ApiError::invalid_params(ERR_TRANSACTION_IS_REQUIRED));
        }
        Command::from_value(&self.transaction).map_err(ApiError::invalid_params)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizedTransaction {
    pub received_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    pub transaction: Transaction,
}

impl TransactionAuthorizationPipeline {
    /// Runs a transaction request from `connected_wallet` end to end.
    pub async fn authorize(
        &self,
        ctx: &RequestContext,
        mode: AuthorizationMode,
        request: TransactionRequest,
        connected_wallet: &ConnectedWallet,
    ) -> Result<AuthorizedTransaction, ApiError> {
        let received_at = Utc::now();
        let command = request.validate()?;
        let public_key = request.public_key.as_str();

        if !connected_wallet.can_use_key(public_key) {
            return Err(ApiError::request_not_permitted(
                ERR_PUBLIC_KEY_IS_NOT_ALLOWED_TO_BE_USED,
            ));
        }

        let _lease = self.request_controller.acquire(ctx, public_key).await?;

        let feedback = if connected_wallet.require_interaction() {
            let session = InteractionSession::begin(
                Arc::clone(&self.interactor),
                ctx,
                Workflow::TransactionReview,
            )
            .await
            .map_err(ApiError::request_not_permitted)?;
            Feedback::session(session)
        } else {
            Feedback::silent()
        };

        // The wallet may have changed since the connection was made.
        let wallet = self
            .wallet_store
            .get_wallet(connected_wallet.name())
            .await
            .map_err(|e| {
                feedback.fail(
                    ErrorType::InternalError,
                    ApiError::internal(format!("could not retrieve the wallet: {e}")),
                )
            })?;
        let mut connected_wallet = connected_wallet.clone();
        connected_wallet.refresh_from_wallet(&wallet).map_err(|e| {
            feedback.fail(
                ErrorType::InternalError,
                ApiError::internal(format!("could not refresh the connection: {e}")),
            )
        })?;
        if !connected_wallet.can_use_key(public_key) {
            return Err(feedback.fail(
                ErrorType::ApplicationError,
                ApiError::request_not_permitted(ERR_PUBLIC_KEY_IS_NOT_ALLOWED_TO_BE_USED),
            ));
        }

        if feedback.session.is_some() {
            let review = ReviewRequest {
                step: 1,
                kind: mode.review_kind(),
                hostname: connected_wallet.hostname().to_string(),
                wallet: connected_wallet.name().to_string(),
                public_key: public_key.to_string(),
                transaction: command.to_human_readable(),
                received_at,
            };
            let approved = self
                .interactor
                .request_transaction_review(ctx, &review)
                .await
                .map_err(|e| feedback.flow_error(e, "reviewing the transaction failed"))?;
            if !approved {
                info!(
                    trace_id = %ctx.trace_id(),
                    hostname = %connected_wallet.hostname(),
                    public_key,
                    "User rejected the transaction"
                );
                return Err(feedback.fail(
                    ErrorType::UserError,
                    ApiError::user_rejection(mode.rejection()),
                ));
            }
        }

        let report = |log_type: LogType, message: String| feedback.log(log_type, &message);
        let node = self
            .node_selector
            .node(ctx, &report)
            .await
            .map_err(|e| match e {
                NodeError::Interrupted => {
                    feedback.fail(ErrorType::ServerError, ApiError::request_interrupted())
                }
                _ => feedback.fail(
                    ErrorType::NetworkError,
                    ApiError::network(ERR_NO_HEALTHY_NODE_AVAILABLE),
                ),
            })?;

        let stats = interruptible(ctx.cancellation(), node.spam_statistics(public_key))
            .await
            .map_err(|e| match e {
                NodeError::Interrupted => {
                    feedback.fail(ErrorType::ServerError, ApiError::request_interrupted())
                }
                e => {
                    warn!(node = %node.host(), error = %e, "Could not get spam statistics");
                    feedback.fail(
                        ErrorType::NetworkError,
                        ApiError::network(ERR_COULD_NOT_GET_LAST_BLOCK_INFORMATION),
                    )
                }
            })?;

        self.spam_guard
            .check_submission(&command, &stats)
            .map_err(|e| {
                feedback.fail(
                    ErrorType::ApplicationError,
                    ApiError::application_cancellation(e),
                )
            })?;

        let solution = self
            .prove_work(ctx, public_key, &stats)
            .await
            .map_err(|e| {
                let error_type = if e.code == codes::REQUEST_HAS_BEEN_INTERRUPTED {
                    ErrorType::ServerError
                } else {
                    ErrorType::ApplicationError
                };
                feedback.fail(error_type, e)
            })?;

        let ttl = clamp_ttl(request.ttl, &stats);
        let input = InputData::new(solution.block_height, ttl, command.clone());
        let tx = sign_transaction(&wallet, public_key, &stats.chain_id, &input, solution.proof)
            .map_err(|e| feedback.fail(ErrorType::InternalError, ApiError::internal(e)))?;

        let sending_mode = match mode {
            AuthorizationMode::Sign => {
                feedback.notify_success(2, "The transaction has been signed.");
                return Ok(AuthorizedTransaction {
                    received_at,
                    sent_at: None,
                    transaction_hash: None,
                    transaction: tx,
                });
            }
            AuthorizationMode::Check => None,
            AuthorizationMode::Send(sending_mode) => Some(sending_mode),
        };

        let sent_at = Utc::now();
        let dispatched = self.dispatch(ctx, node.as_ref(), &tx, sending_mode).await;
        let transaction_hash = match dispatched {
            Ok(hash) => hash,
            Err(NodeError::Interrupted) => {
                return Err(feedback.fail(ErrorType::ServerError, ApiError::request_interrupted()));
            }
            Err(e) => {
                warn!(
                    trace_id = %ctx.trace_id(),
                    node = %node.host(),
                    error = %e,
                    "Node refused the transaction"
                );
                feedback.notify_failed_transaction(
                    2,
                    FailedTransaction {
                        transaction: command.to_human_readable(),
                        tx: tx.clone(),
                        error: e.to_string(),
                        sent_at,
                        node_host: node.host().to_string(),
                    },
                );
                let data = format!("{e} (node {})", node.host());
                return Err(match e {
                    NodeError::TransactionRejected { code, .. } => {
                        ApiError::network_rejection(code, data)
                    }
                    _ => ApiError::network(data),
                });
            }
        };

        match &transaction_hash {
            Some(hash) => {
                info!(
                    trace_id = %ctx.trace_id(),
                    node = %node.host(),
                    tx_hash = %hash,
                    "Transaction sent"
                );
                feedback.notify_successful_transaction(
                    2,
                    SuccessfulTransaction {
                        tx_hash: hash.clone(),
                        transaction: command.to_human_readable(),
                        tx: tx.clone(),
                        sent_at,
                        node_host: node.host().to_string(),
                    },
                );
            }
            None => feedback.notify_success(2, "The transaction has been checked."),
        }

        Ok(AuthorizedTransaction {
            received_at,
            sent_at: Some(sent_at),
            transaction_hash,
            transaction: tx,
        })
    }

    /// Searches the proof-of-work on a blocking thread.
    async fn prove_work(
        &self,
        ctx: &RequestContext,
        public_key: &str,
        stats: &SpamStatistics,
    ) -> Result<ProofOfWorkSolution, ApiError> {
        let guard = Arc::clone(&self.spam_guard);
        let public_key = public_key.to_string();
        let stats = stats.clone();
        let cancellation = ctx.cancellation().clone();
        let search = tokio::task::spawn_blocking(move || {
            guard.generate_proof_of_work(&public_key, &stats, &cancellation)
        });

        // Cancelling the context also stops the blocking search at its next checkpoint.
        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(ApiError::request_interrupted()),
            joined = search => match joined
                .map_err(|e| ApiError::internal(format!("the proof-of-work search failed: {e}")))?
            {
                Ok(solution) => Ok(solution),
                Err(SpamError::ProofOfWorkInterrupted) => Err(ApiError::request_interrupted()),
                Err(e) => Err(ApiError::application_cancellation(e)),
            },
        }
    }

    /// Checks or sends `tx`. Sending returns the hash the node assigned.
    async fn dispatch(
        &self,
        ctx: &RequestContext,
        node: &dyn Node,
        tx: &Transaction,
        sending_mode: Option<SendingMode>,
    ) -> Result<Option<String>, NodeError> {
        match sending_mode {
            None => interruptible(ctx.cancellation(), node.check_transaction(tx))
                .await
                .map(|()| None),
            Some(sending_mode) => {
                interruptible(ctx.cancellation(), node.send_transaction(tx, sending_mode))
                    .await
                    .map(Some)
            }
        }
    }
}
