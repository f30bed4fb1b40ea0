// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Front-end transport over HTTP.
//!
//! [`FrontEndQueue`] drains the interaction channel into a queue of
//! [`InteractionEvent`]s the front-end polls for. Request events carry an ID
//! and keep their responder here until the front-end posts an
//! [`InteractionResponse`] for that ID. A request whose caller gave up
//! (cancelled or interrupted) is pruned before it is handed out.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Notify};
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::channel::Responder;
use super::{Interaction, SelectedWallet, UserResponse};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum FrontEndError {
    #[error("there is no pending interaction {0:?}")]
    UnknownInteraction(String),

    #[error("the response does not answer the interaction {0:?}")]
    UnexpectedResponse(String),

    #[error("the interaction {0:?} is no longer awaited")]
    RequestGone(String),

    #[error("{0}")]
    Internal(String),
}

/// One interaction as the front-end sees it.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InteractionEvent {
    pub id: String,
    pub trace_id: String,
    /// `INTERACTION_SESSION_BEGAN`, `REQUEST_PASSPHRASE`, and so on.
    pub name: String,
    #[schema(value_type = Object)]
    pub data: Value,
    /// Whether the front-end must answer it through its ID.
    pub expects_response: bool,
}

/// Answer to a request event.
#[derive(Clone, Deserialize, ToSchema)]
#[serde(tag = "name", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractionResponse {
    /// Answers the connection, permissions and transaction reviews.
    Decision { approved: bool },
    SelectedWallet { wallet: String, passphrase: String },
    EnteredPassphrase { passphrase: String },
    CancelRequest,
    CloseConnection,
}

impl fmt::Debug for InteractionResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decision { approved } => f
                .debug_struct("Decision")
                .field("approved", approved)
                .finish(),
            Self::SelectedWallet { wallet, .. } => f
                .debug_struct("SelectedWallet")
                .field("wallet", wallet)
                .finish_non_exhaustive(),
            Self::EnteredPassphrase { .. } => {
                f.debug_struct("EnteredPassphrase").finish_non_exhaustive()
            }
            Self::CancelRequest => f.write_str("CancelRequest"),
            Self::CloseConnection => f.write_str("CloseConnection"),
        }
    }
}

enum PendingRequest {
    Decision(Responder<bool>),
    Wallet(Responder<SelectedWallet>),
    Passphrase(Responder<String>),
}

impl PendingRequest {
    fn is_closed(&self) -> bool {
        match self {
            Self::Decision(tx) => tx.is_closed(),
            Self::Wallet(tx) => tx.is_closed(),
            Self::Passphrase(tx) => tx.is_closed(),
        }
    }

    /// Ends the request without an answer.
    fn end(self, closing: bool) -> bool {
        fn send<T>(tx: Responder<T>, closing: bool) -> bool {
            let response = if closing {
                UserResponse::CloseConnection
            } else {
                UserResponse::CancelRequest
            };
            tx.send(response).is_ok()
        }
        match self {
            Self::Decision(tx) => send(tx, closing),
            Self::Wallet(tx) => send(tx, closing),
            Self::Passphrase(tx) => send(tx, closing),
        }
    }
}

#[derive(Default)]
struct Inner {
    events: VecDeque<InteractionEvent>,
    pending: HashMap<String, PendingRequest>,
}

impl Inner {
    fn prune(&mut self) {
        let Inner { events, pending } = self;
        pending.retain(|_, request| !request.is_closed());
        events.retain(|event| !event.expects_response || pending.contains_key(&event.id));
    }
}

#[derive(Default)]
pub struct FrontEndQueue {
    inner: Mutex<Inner>,
    arrived: Notify,
}

impl FrontEndQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, FrontEndError> {
        self.inner
            .lock()
            .map_err(|_| FrontEndError::Internal("front-end queue lock poisoned".to_string()))
    }

    /// Queues interactions until the channel closes or `shutdown` fires.
    pub async fn run(
        self: Arc<Self>,
        mut receiver: mpsc::UnboundedReceiver<Interaction>,
        shutdown: CancellationToken,
    ) {
        info!("Waiting for a front-end to answer interactions");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Front-end queue shutting down");
                    return;
                }
                next = receiver.recv() => match next {
                    Some(interaction) => {
                        if let Err(e) = self.push(interaction) {
                            warn!(error = %e, "Could not queue interaction");
                        }
                    }
                    None => return,
                },
            }
        }
    }

    pub fn push(&self, interaction: Interaction) -> Result<(), FrontEndError> {
        let (event, pending) = into_event(interaction);
        debug!(id = %event.id, trace_id = %event.trace_id, name = %event.name, "Interaction queued");

        let mut inner = self.lock()?;
        if let Some(pending) = pending {
            inner.pending.insert(event.id.clone(), pending);
        }
        inner.events.push_back(event);
        drop(inner);
        self.arrived.notify_one();
        Ok(())
    }

    /// Hands out every queued event, waiting up to `wait` for one to arrive.
    pub async fn take_events(&self, wait: Duration) -> Result<Vec<InteractionEvent>, FrontEndError> {
        let deadline = Instant::now() + wait;
        loop {
            let arrived = self.arrived.notified();
            {
                let mut inner = self.lock()?;
                inner.prune();
                if !inner.events.is_empty() {
                    return Ok(inner.events.drain(..).collect());
                }
            }
            if timeout_at(deadline, arrived).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    /// Relays the front-end's answer to the request `id`.
    pub fn respond(&self, id: &str, response: InteractionResponse) -> Result<(), FrontEndError> {
        let mut inner = self.lock()?;
        let pending = inner
            .pending
            .remove(id)
            .ok_or_else(|| FrontEndError::UnknownInteraction(id.to_string()))?;

        let delivered = match (pending, response) {
            (pending, InteractionResponse::CancelRequest) => pending.end(false),
            (pending, InteractionResponse::CloseConnection) => pending.end(true),
            (PendingRequest::Decision(tx), InteractionResponse::Decision { approved }) => {
                tx.send(UserResponse::Answer(approved)).is_ok()
            }
            (
                PendingRequest::Wallet(tx),
                InteractionResponse::SelectedWallet { wallet, passphrase },
            ) => tx
                .send(UserResponse::Answer(SelectedWallet { wallet, passphrase }))
                .is_ok(),
            (PendingRequest::Passphrase(tx), InteractionResponse::EnteredPassphrase { passphrase }) => {
                tx.send(UserResponse::Answer(passphrase)).is_ok()
            }
            (pending, _) => {
                inner.pending.insert(id.to_string(), pending);
                return Err(FrontEndError::UnexpectedResponse(id.to_string()));
            }
        };

        if delivered {
            debug!(id, "Interaction answered");
            Ok(())
        } else {
            Err(FrontEndError::RequestGone(id.to_string()))
        }
    }
}

fn event(trace_id: String, name: &str, data: Value, expects_response: bool) -> InteractionEvent {
    InteractionEvent {
        id: Uuid::new_v4().to_string(),
        trace_id,
        name: name.to_string(),
        data,
        expects_response,
    }
}

fn into_event(interaction: Interaction) -> (InteractionEvent, Option<PendingRequest>) {
    match interaction {
        Interaction::SessionBegan {
            trace_id,
            workflow,
            total_steps,
        } => (
            event(
                trace_id,
                "INTERACTION_SESSION_BEGAN",
                json!({"workflow": workflow, "totalSteps": total_steps}),
                false,
            ),
            None,
        ),
        Interaction::SessionEnded { trace_id } => (
            event(trace_id, "INTERACTION_SESSION_ENDED", json!({}), false),
            None,
        ),
        Interaction::RequestSucceeded {
            trace_id,
            step,
            message,
        } => (
            event(
                trace_id,
                "REQUEST_SUCCEEDED",
                json!({"step": step, "message": message}),
                false,
            ),
            None,
        ),
        Interaction::TransactionSucceeded {
            trace_id,
            step,
            transaction,
        } => (
            event(
                trace_id,
                "TRANSACTION_SUCCEEDED",
                json!({"step": step, "transaction": transaction}),
                false,
            ),
            None,
        ),
        Interaction::TransactionFailed {
            trace_id,
            step,
            transaction,
        } => (
            event(
                trace_id,
                "TRANSACTION_FAILED",
                json!({"step": step, "transaction": transaction}),
                false,
            ),
            None,
        ),
        Interaction::ErrorOccurred {
            trace_id,
            error_type,
            error,
        } => (
            event(
                trace_id,
                "ERROR_OCCURRED",
                json!({"type": error_type, "error": error}),
                false,
            ),
            None,
        ),
        Interaction::Log {
            trace_id,
            log_type,
            message,
        } => (
            event(
                trace_id,
                "LOG",
                json!({"type": log_type, "message": message}),
                false,
            ),
            None,
        ),
        Interaction::WalletConnectionReview {
            trace_id,
            step,
            hostname,
            respond_to,
        } => (
            event(
                trace_id,
                "REQUEST_WALLET_CONNECTION_REVIEW",
                json!({"step": step, "hostname": hostname}),
                true,
            ),
            Some(PendingRequest::Decision(respond_to)),
        ),
        Interaction::WalletSelection {
            trace_id,
            step,
            hostname,
            available_wallets,
            respond_to,
        } => (
            event(
                trace_id,
                "REQUEST_WALLET_SELECTION",
                json!({"step": step, "hostname": hostname, "availableWallets": available_wallets}),
                true,
            ),
            Some(PendingRequest::Wallet(respond_to)),
        ),
        Interaction::Passphrase {
            trace_id,
            step,
            wallet,
            reason,
            respond_to,
        } => (
            event(
                trace_id,
                "REQUEST_PASSPHRASE",
                json!({"step": step, "wallet": wallet, "reason": reason}),
                true,
            ),
            Some(PendingRequest::Passphrase(respond_to)),
        ),
        Interaction::PermissionsReview {
            trace_id,
            step,
            hostname,
            wallet,
            permissions,
            respond_to,
        } => (
            event(
                trace_id,
                "REQUEST_PERMISSIONS_REVIEW",
                json!({
                    "step": step,
                    "hostname": hostname,
                    "wallet": wallet,
                    "permissions": permissions
                }),
                true,
            ),
            Some(PendingRequest::Decision(respond_to)),
        ),
        Interaction::TransactionReview {
            trace_id,
            review,
            respond_to,
        } => (
            event(
                trace_id,
                "REQUEST_TRANSACTION_REVIEW",
                json!(review),
                true,
            ),
            Some(PendingRequest::Decision(respond_to)),
        ),
    }
}
