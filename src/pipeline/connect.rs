// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet connection workflow: review, wallet selection, connection.

use std::sync::Arc;

use tracing::info;

use super::TransactionAuthorizationPipeline;
use crate::connections::Token;
use crate::context::RequestContext;
use crate::error::{
    ApiError, ERR_NO_WALLET_TO_CONNECT_TO, ERR_USER_REJECTED_WALLET_CONNECTION,
    ERR_WALLET_DOES_NOT_EXIST, ERR_WRONG_PASSPHRASE,
};
use crate::interaction::{ErrorType, InteractionSession, Workflow};
use crate::wallet::StoreError;

impl TransactionAuthorizationPipeline {
    /// Asks the user to connect `hostname` to one of their wallets.
    pub async fn connect_wallet(
        &self,
        ctx: &RequestContext,
        hostname: &str,
    ) -> Result<Token, ApiError> {
        let session =
            InteractionSession::begin(Arc::clone(&self.interactor), ctx, Workflow::WalletConnection)
                .await
                .map_err(|e| {
                    ApiError::internal(format!("could not start the interaction session: {e}"))
                })?;

        let approved = self
            .interactor
            .request_wallet_connection_review(ctx, 1, hostname)
            .await
            .map_err(|e| session.flow_error(e, "reviewing the wallet connection failed"))?;
        if !approved {
            return Err(session.fail(
                ErrorType::UserError,
                ApiError::user_rejection(ERR_USER_REJECTED_WALLET_CONNECTION),
            ));
        }

        let wallets = self.wallet_store.list_wallets().await.map_err(|e| {
            session.fail(
                ErrorType::InternalError,
                ApiError::internal(format!("could not list the wallets: {e}")),
            )
        })?;
        if wallets.is_empty() {
            return Err(session.fail(
                ErrorType::ApplicationError,
                ApiError::application_cancellation(ERR_NO_WALLET_TO_CONNECT_TO),
            ));
        }

        let wallet_name = loop {
            let selected = self
                .interactor
                .request_wallet_selection(ctx, 2, hostname, &wallets)
                .await
                .map_err(|e| session.flow_error(e, "selecting the wallet failed"))?;

            match self
                .wallet_store
                .unlock_wallet(&selected.wallet, &selected.passphrase)
                .await
            {
                Ok(()) => break selected.wallet,
                Err(StoreError::WalletDoesNotExist(_)) => {
                    self.interactor.notify_error(
                        session.trace_id(),
                        ErrorType::UserError,
                        ERR_WALLET_DOES_NOT_EXIST,
                    );
                }
                Err(StoreError::WrongPassphrase) => {
                    self.interactor.notify_error(
                        session.trace_id(),
                        ErrorType::UserError,
                        ERR_WRONG_PASSPHRASE,
                    );
                }
                Err(e) => {
                    return Err(session.fail(
                        ErrorType::InternalError,
                        ApiError::internal(format!("could not unlock the wallet: {e}")),
                    ));
                }
            }
        };

        let wallet = self.wallet_store.get_wallet(&wallet_name).await.map_err(|e| {
            session.fail(
                ErrorType::InternalError,
                ApiError::internal(format!("could not retrieve the wallet: {e}")),
            )
        })?;
        let token = self.registry.connect(hostname, &wallet).map_err(|e| {
            session.fail(
                ErrorType::InternalError,
                ApiError::internal(format!("could not connect the wallet: {e}")),
            )
        })?;

        info!(trace_id = %ctx.trace_id(), hostname, wallet = %wallet_name, "Connection approved");
        session.notify_success(3, "The connection has been established.");
        Ok(token)
    }
}
