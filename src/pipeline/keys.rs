// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key listing.
//!
//! A connection without read access to the public keys triggers the
//! permission request workflow:
//!
//! 1. the user reviews the requested permissions;
//! 2. the user unlocks the wallet;
//! 3. read access is granted to the hostname and every connection on the
//!    wallet is refreshed.

use std::sync::Arc;

use tracing::info;

use super::TransactionAuthorizationPipeline;
use crate::connections::{ConnectedWallet, RestrictedKey};
use crate::context::RequestContext;
use crate::error::{ApiError, ERR_USER_REJECTED_ACCESS_TO_KEYS};
use crate::interaction::{ErrorType, InteractionSession, Workflow};
use crate::wallet::Permissions;

impl TransactionAuthorizationPipeline {
    /// Keys `connected_wallet` may use, requesting access if needed.
    pub async fn list_keys(
        &self,
        ctx: &RequestContext,
        connected_wallet: &ConnectedWallet,
    ) -> Result<Vec<RestrictedKey>, ApiError> {
        if connected_wallet.can_list_keys() {
            return Ok(connected_wallet.restricted_keys().to_vec());
        }

        let hostname = connected_wallet.hostname();
        let wallet_name = connected_wallet.name();

        let session =
            InteractionSession::begin(Arc::clone(&self.interactor), ctx, Workflow::PermissionRequest)
                .await
                .map_err(ApiError::request_not_permitted)?;

        let requested = Permissions::read_all_keys();
        let approved = self
            .interactor
            .request_permissions_review(ctx, 1, hostname, wallet_name, &requested.summary())
            .await
            .map_err(|e| session.flow_error(e, "reviewing the permissions failed"))?;
        if !approved {
            info!(hostname, wallet = %wallet_name, "User rejected the access to the keys");
            return Err(session.fail(
                ErrorType::UserError,
                ApiError::user_rejection(ERR_USER_REJECTED_ACCESS_TO_KEYS),
            ));
        }

        let reason = format!(
            "The application \"{hostname}\" requests access to the keys of the wallet \"{wallet_name}\"."
        );
        session
            .unlock_wallet(ctx, self.wallet_store.as_ref(), 2, wallet_name, &reason)
            .await?;

        let internal = |context: &str, e: &dyn std::fmt::Display| {
            session.fail(
                ErrorType::InternalError,
                ApiError::internal(format!("{context}: {e}")),
            )
        };
        let mut wallet = self
            .wallet_store
            .get_wallet(wallet_name)
            .await
            .map_err(|e| internal("could not retrieve the wallet", &e))?;
        wallet
            .update_permissions(hostname, requested)
            .map_err(|e| internal("could not update the permissions", &e))?;
        self.wallet_store
            .update_wallet(&wallet)
            .await
            .map_err(|e| internal("could not save the wallet", &e))?;
        self.registry
            .refresh_wallet(&wallet)
            .map_err(|e| internal("could not refresh the connections", &e))?;

        let mut connected_wallet = connected_wallet.clone();
        connected_wallet
            .refresh_from_wallet(&wallet)
            .map_err(|e| internal("could not refresh the connection", &e))?;

        info!(hostname, wallet = %wallet_name, "Read access to the keys granted");
        session.notify_success(3, "The permissions have been updated.");
        Ok(connected_wallet.restricted_keys().to_vec())
    }
}
