// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Live connections between third-party applications and wallets.
//!
//! ## Modules
//!
//! - `connected_wallet` - permission-filtered view of a wallet
//! - `registry` - token to connection map, session policy, wallet events
//! - `token` - opaque connection tokens
//! - `time` - clock abstraction used for session expiry

pub mod connected_wallet;
pub mod registry;
pub mod time;
pub mod token;

pub use connected_wallet::{resolve_restricted_keys, ConnectedWallet, RestrictedKey};
pub use registry::{ConnectionSummary, SessionRegistry};
pub use time::{SystemClock, TimeService};
pub use token::Token;

use crate::error::{ApiError, ERR_NO_SUCH_CONNECTION};
use crate::wallet::StoreError;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("there is no connection matching this token")]
    NoSuchConnection,

    #[error("the token has expired")]
    TokenExpired,

    /// The permissions of `wallet` allow a key the wallet does not hold.
    #[error("the permissions of the wallet {wallet:?} reference the unknown public key {public_key:?}")]
    InconsistentPermissions { wallet: String, public_key: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("connection registry error: {0}")]
    Internal(String),
}

impl From<ConnectionError> for ApiError {
    fn from(error: ConnectionError) -> Self {
        match error {
            ConnectionError::NoSuchConnection => {
                ApiError::authentication_failure(ERR_NO_SUCH_CONNECTION)
            }
            ConnectionError::TokenExpired => ApiError::authentication_failure(error),
            ConnectionError::InconsistentPermissions { .. }
            | ConnectionError::Store(_)
            | ConnectionError::Internal(_) => {
                ApiError::internal(format!("could not resolve the connection: {error}"))
            }
        }
    }
}
