// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Front-end stand-in for headless deployments.
//!
//! Approves every review it receives. Wallet selection and passphrase
//! requests can only be answered for the wallet it was given credentials
//! for; anything else is cancelled.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{Interaction, SelectedWallet, UserResponse};
use crate::wallet::WalletCredentials;

pub struct AutomaticConsentResponder {
    credentials: Option<WalletCredentials>,
}

impl AutomaticConsentResponder {
    pub fn new(credentials: Option<WalletCredentials>) -> Self {
        Self { credentials }
    }

    /// Answers interactions until the channel closes or `shutdown` fires.
    ///
    /// ```rust,ignore
    /// tokio::spawn(responder.run(receiver, shutdown.clone()));
    /// ```
    pub async fn run(self, mut receiver: mpsc::UnboundedReceiver<Interaction>, shutdown: CancellationToken) {
        info!("Automatic consent enabled, every review will be approved");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Automatic consent responder shutting down");
                    return;
                }
                next = receiver.recv() => match next {
                    Some(interaction) => self.respond(interaction),
                    None => return,
                },
            }
        }
    }

    fn respond(&self, interaction: Interaction) {
        match interaction {
            Interaction::WalletConnectionReview {
                trace_id,
                hostname,
                respond_to,
                ..
            } => {
                info!(trace_id = %trace_id, hostname = %hostname, "Automatically approving wallet connection");
                let _ = respond_to.send(UserResponse::Answer(true));
            }
            Interaction::PermissionsReview {
                trace_id,
                hostname,
                respond_to,
                ..
            } => {
                info!(trace_id = %trace_id, hostname = %hostname, "Automatically approving permissions");
                let _ = respond_to.send(UserResponse::Answer(true));
            }
            Interaction::TransactionReview {
                trace_id,
                review,
                respond_to,
            } => {
                info!(
                    trace_id = %trace_id,
                    hostname = %review.hostname,
                    public_key = %review.public_key,
                    kind = ?review.kind,
                    "Automatically approving transaction"
                );
                let _ = respond_to.send(UserResponse::Answer(true));
            }
            Interaction::WalletSelection {
                available_wallets,
                respond_to,
                ..
            } => {
                let response = match &self.credentials {
                    Some(creds) if available_wallets.contains(&creds.name) => {
                        UserResponse::Answer(SelectedWallet {
                            wallet: creds.name.clone(),
                            passphrase: creds.passphrase.clone(),
                        })
                    }
                    _ => {
                        warn!("No credentials for automatic wallet selection, cancelling");
                        UserResponse::CancelRequest
                    }
                };
                let _ = respond_to.send(response);
            }
            Interaction::Passphrase {
                wallet, respond_to, ..
            } => {
                let response = match &self.credentials {
                    Some(creds) if creds.name == wallet => {
                        UserResponse::Answer(creds.passphrase.clone())
                    }
                    _ => {
                        warn!(wallet = %wallet, "No passphrase known for wallet, cancelling");
                        UserResponse::CancelRequest
                    }
                };
                let _ = respond_to.send(response);
            }
            Interaction::ErrorOccurred {
                trace_id,
                error_type,
                error,
            } => {
                warn!(trace_id = %trace_id, error_type = ?error_type, error = %error, "Request failed");
            }
            Interaction::TransactionSucceeded {
                trace_id,
                transaction,
                ..
            } => {
                info!(
                    trace_id = %trace_id,
                    tx_hash = %transaction.tx_hash,
                    node = %transaction.node_host,
                    "Transaction sent"
                );
            }
            Interaction::TransactionFailed {
                trace_id,
                transaction,
                ..
            } => {
                warn!(
                    trace_id = %trace_id,
                    node = %transaction.node_host,
                    error = %transaction.error,
                    "Transaction failed"
                );
            }
            // Logs are already mirrored by the interactor.
            Interaction::SessionBegan { .. }
            | Interaction::SessionEnded { .. }
            | Interaction::RequestSucceeded { .. }
            | Interaction::Log { .. } => {}
        }
    }
}
