// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! [`Interactor`] that forwards interactions to a front-end over a channel.
//!
//! Requests carry a `oneshot` responder the front-end answers through.
//! Dropping the responder without answering counts as the user closing the
//! connection.
//!
//! The queue is unbounded: notifications are sent from synchronous code
//! (including `Drop`), and a front-end that falls behind must still see
//! every session end.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::{
    ErrorType, FailedTransaction, InteractionError, Interactor, LogType, ReviewRequest,
    SelectedWallet, SuccessfulTransaction, Workflow,
};
use crate::context::RequestContext;

/// How the user answered a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserResponse<T> {
    Answer(T),
    CancelRequest,
    CloseConnection,
}

pub type Responder<T> = oneshot::Sender<UserResponse<T>>;

/// Messages delivered to the front-end.
#[derive(Debug)]
pub enum Interaction {
    SessionBegan {
        trace_id: String,
        workflow: Workflow,
        total_steps: u8,
    },
    SessionEnded {
        trace_id: String,
    },
    RequestSucceeded {
        trace_id: String,
        step: u8,
        message: String,
    },
    TransactionSucceeded {
        trace_id: String,
        step: u8,
        transaction: Box<SuccessfulTransaction>,
    },
    TransactionFailed {
        trace_id: String,
        step: u8,
        transaction: Box<FailedTransaction>,
    },
    ErrorOccurred {
        trace_id: String,
        error_type: ErrorType,
        error: String,
    },
    Log {
        trace_id: String,
        log_type: LogType,
        message: String,
    },
    WalletConnectionReview {
        trace_id: String,
        step: u8,
        hostname: String,
        respond_to: Responder<bool>,
    },
    WalletSelection {
        trace_id: String,
        step: u8,
        hostname: String,
        available_wallets: Vec<String>,
        respond_to: Responder<SelectedWallet>,
    },
    Passphrase {
        trace_id: String,
        step: u8,
        wallet: String,
        reason: String,
        respond_to: Responder<String>,
    },
    PermissionsReview {
        trace_id: String,
        step: u8,
        hostname: String,
        wallet: String,
        permissions: BTreeMap<String, String>,
        respond_to: Responder<bool>,
    },
    TransactionReview {
        trace_id: String,
        review: ReviewRequest,
        respond_to: Responder<bool>,
    },
}

#[derive(Clone)]
pub struct ChannelInteractor {
    sender: mpsc::UnboundedSender<Interaction>,
}

impl ChannelInteractor {
    pub fn new(sender: mpsc::UnboundedSender<Interaction>) -> Self {
        Self { sender }
    }

    /// Creates an interactor and the receiving end the front-end reads.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Interaction>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }

    fn notify(&self, interaction: Interaction) {
        if self.sender.send(interaction).is_err() {
            debug!("Front-end is gone, notification discarded");
        }
    }

    fn deliver(&self, ctx: &RequestContext, interaction: Interaction) -> Result<(), InteractionError> {
        if ctx.is_cancelled() {
            return Err(InteractionError::RequestInterrupted);
        }
        self.sender
            .send(interaction)
            .map_err(|_| InteractionError::Internal("the front-end is not listening".to_string()))
    }

    async fn request<T: Send>(
        &self,
        ctx: &RequestContext,
        build: impl FnOnce(Responder<T>) -> Interaction + Send,
    ) -> Result<T, InteractionError> {
        let (respond_to, response) = oneshot::channel();
        self.deliver(ctx, build(respond_to))?;

        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(InteractionError::RequestInterrupted),
            answer = response => match answer {
                Ok(UserResponse::Answer(value)) => Ok(value),
                Ok(UserResponse::CancelRequest) => Err(InteractionError::UserCancelledRequest),
                Ok(UserResponse::CloseConnection) | Err(_) => {
                    Err(InteractionError::UserClosedConnection)
                }
            },
        }
    }
}

#[async_trait]
impl Interactor for ChannelInteractor {
    async fn notify_interaction_session_began(
        &self,
        ctx: &RequestContext,
        workflow: Workflow,
        total_steps: u8,
    ) -> Result<(), InteractionError> {
        self.deliver(
            ctx,
            Interaction::SessionBegan {
                trace_id: ctx.trace_id().to_string(),
                workflow,
                total_steps,
            },
        )
    }

    fn notify_interaction_session_ended(&self, trace_id: &str) {
        self.notify(Interaction::SessionEnded {
            trace_id: trace_id.to_string(),
        });
    }

    fn notify_successful_request(&self, trace_id: &str, step: u8, message: &str) {
        self.notify(Interaction::RequestSucceeded {
            trace_id: trace_id.to_string(),
            step,
            message: message.to_string(),
        });
    }

    fn notify_successful_transaction(
        &self,
        trace_id: &str,
        step: u8,
        transaction: SuccessfulTransaction,
    ) {
        self.notify(Interaction::TransactionSucceeded {
            trace_id: trace_id.to_string(),
            step,
            transaction: Box::new(transaction),
        });
    }

    fn notify_failed_transaction(&self, trace_id: &str, step: u8, transaction: FailedTransaction) {
        self.notify(Interaction::TransactionFailed {
            trace_id: trace_id.to_string(),
            step,
            transaction: Box::new(transaction),
        });
    }

    fn notify_error(&self, trace_id: &str, error_type: ErrorType, error: &str) {
        self.notify(Interaction::ErrorOccurred {
            trace_id: trace_id.to_string(),
            error_type,
            error: error.to_string(),
        });
    }

    fn log(&self, trace_id: &str, log_type: LogType, message: &str) {
        match log_type {
            LogType::Warning | LogType::Error => {
                warn!(trace_id = %trace_id, log_type = ?log_type, "{message}")
            }
            LogType::Success => info!(trace_id = %trace_id, "{message}"),
            LogType::Info => debug!(trace_id = %trace_id, "{message}"),
        }
        self.notify(Interaction::Log {
            trace_id: trace_id.to_string(),
            log_type,
            message: message.to_string(),
        });
    }

    async fn request_wallet_connection_review(
        &self,
        ctx: &RequestContext,
        step: u8,
        hostname: &str,
    ) -> Result<bool, InteractionError> {
        self.request(ctx, |respond_to| Interaction::WalletConnectionReview {
            trace_id: ctx.trace_id().to_string(),
            step,
            hostname: hostname.to_string(),
            respond_to,
        })
        .await
    }

    async fn request_wallet_selection(
        &self,
        ctx: &RequestContext,
        step: u8,
        hostname: &str,
        available_wallets: &[String],
    ) -> Result<SelectedWallet, InteractionError> {
        self.request(ctx, |respond_to| Interaction::WalletSelection {
            trace_id: ctx.trace_id().to_string(),
            step,
            hostname: hostname.to_string(),
            available_wallets: available_wallets.to_vec(),
            respond_to,
        })
        .await
    }

    async fn request_passphrase(
        &self,
        ctx: &RequestContext,
        step: u8,
        wallet: &str,
        reason: &str,
    ) -> Result<String, InteractionError> {
        self.request(ctx, |respond_to| Interaction::Passphrase {
            trace_id: ctx.trace_id().to_string(),
            step,
            wallet: wallet.to_string(),
            reason: reason.to_string(),
            respond_to,
        })
        .await
    }

    async fn request_permissions_review(
        &self,
        ctx: &RequestContext,
        step: u8,
        hostname: &str,
        wallet: &str,
        permissions: &BTreeMap<String, String>,
    ) -> Result<bool, InteractionError> {
        self.request(ctx, |respond_to| Interaction::PermissionsReview {
            trace_id: ctx.trace_id().to_string(),
            step,
            hostname: hostname.to_string(),
            wallet: wallet.to_string(),
            permissions: permissions.clone(),
            respond_to,
        })
        .await
    }

    async fn request_transaction_review(
        &self,
        ctx: &RequestContext,
        review: &ReviewRequest,
    ) -> Result<bool, InteractionError> {
        self.request(ctx, |respond_to| Interaction::TransactionReview {
            trace_id: ctx.trace_id().to_string(),
            review: review.clone(),
            respond_to,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::InteractionSession;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn answers_are_relayed_back_to_the_caller() {
        let (interactor, mut rx) = ChannelInteractor::channel();
        let ctx = RequestContext::new();

        let front_end = tokio::spawn(async move {
            match rx.recv().await.unwrap() {
                Interaction::Passphrase {
                    wallet, respond_to, ..
                } => {
                    assert_eq!(wallet, "w1");
                    respond_to
                        .send(UserResponse::Answer("secret".to_string()))
                        .unwrap();
                }
                other => panic!("unexpected interaction {other:?}"),
            }
        });

        let passphrase = interactor
            .request_passphrase(&ctx, 1, "w1", "unlock")
            .await
            .unwrap();
        assert_eq!(passphrase, "secret");
        front_end.await.unwrap();
    }

    #[tokio::test]
    async fn dropped_responder_means_connection_closed() {
        let (interactor, mut rx) = ChannelInteractor::channel();
        let ctx = RequestContext::new();

        tokio::spawn(async move {
            // Receive and drop the responder.
            let _ = rx.recv().await;
        });

        let err = interactor
            .request_wallet_connection_review(&ctx, 1, "app.example")
            .await
            .unwrap_err();
        assert_eq!(err, InteractionError::UserClosedConnection);
    }

    #[tokio::test]
    async fn user_cancellation_is_distinguished() {
        let (interactor, mut rx) = ChannelInteractor::channel();
        let ctx = RequestContext::new();

        tokio::spawn(async move {
            if let Some(Interaction::WalletConnectionReview { respond_to, .. }) = rx.recv().await {
                let _ = respond_to.send(UserResponse::CancelRequest);
            }
        });

        let err = interactor
            .request_wallet_connection_review(&ctx, 1, "app.example")
            .await
            .unwrap_err();
        assert_eq!(err, InteractionError::UserCancelledRequest);
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_pending_review() {
        let (interactor, mut rx) = ChannelInteractor::channel();
        let ctx = RequestContext::new();
        let canceller = ctx.clone();

        // Hold the responder without answering.
        let holder = tokio::spawn(async move {
            let pending = rx.recv().await;
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(pending);
        });

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = interactor
            .request_wallet_connection_review(&ctx, 1, "app.example")
            .await
            .unwrap_err();
        assert_eq!(err, InteractionError::RequestInterrupted);
        holder.abort();
    }

    #[tokio::test]
    async fn session_end_reaches_a_front_end_that_fell_behind() {
        let (interactor, mut rx) = ChannelInteractor::channel();
        let interactor: Arc<dyn Interactor> = Arc::new(interactor);
        let ctx = RequestContext::new();

        let session =
            InteractionSession::begin(Arc::clone(&interactor), &ctx, Workflow::WalletConnection)
                .await
                .unwrap();
        for _ in 0..1_000 {
            interactor.notify_error(ctx.trace_id(), ErrorType::UserError, "nope");
        }
        drop(session);

        let mut received = Vec::new();
        while let Ok(interaction) = rx.try_recv() {
            received.push(interaction);
        }
        assert_eq!(received.len(), 1_002);
        assert!(matches!(received[0], Interaction::SessionBegan { .. }));
        assert!(matches!(
            received.last(),
            Some(Interaction::SessionEnded { trace_id }) if trace_id == ctx.trace_id()
        ));
    }

    #[tokio::test]
    async fn nothing_is_delivered_once_the_request_is_cancelled() {
        let (interactor, mut rx) = ChannelInteractor::channel();
        let ctx = RequestContext::new();
        ctx.cancel();

        let err = interactor
            .request_passphrase(&ctx, 1, "w1", "unlock")
            .await
            .unwrap_err();
        assert_eq!(err, InteractionError::RequestInterrupted);
        assert!(rx.try_recv().is_err());
    }
}
