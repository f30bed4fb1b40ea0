// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON-RPC error object returned to connected applications.
//!
//! Every failure leaving the service is one of a small set of classes, each
//! with a stable code range and a stable `message`. The `data` field carries
//! the short human-readable cause.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Stable error codes surfaced to callers.
pub mod codes {
    /// The request payload is not valid JSON.
    pub const PARSE_ERROR: i64 = -32700;
    /// The JSON-RPC envelope is malformed.
    pub const INVALID_REQUEST: i64 = -32600;
    /// The requested method does not exist.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// The method parameters are missing or invalid.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Unexpected failure inside the service.
    pub const INTERNAL_ERROR: i64 = -32603;
    /// The request was cancelled or timed out while waiting.
    pub const REQUEST_HAS_BEEN_INTERRUPTED: i64 = -32001;
    /// The calling application's hostname could not be determined.
    pub const HOSTNAME_RESOLUTION_FAILURE: i64 = -32002;
    /// The presented token does not match a live connection.
    pub const AUTHENTICATION_FAILURE: i64 = -32003;
    /// No node could be reached, or a node answered unexpectedly.
    pub const NODE_COMMUNICATION_FAILED: i64 = 1000;
    /// The network rejected the transaction for an unclassified reason.
    pub const NETWORK_REJECTED_TRANSACTION: i64 = 1001;
    /// The request is not allowed by the connection policy.
    pub const REQUEST_NOT_PERMITTED: i64 = 2000;
    /// The service cancelled the request (spam quota, PoW limit).
    pub const APPLICATION_CANCELLED_THE_REQUEST: i64 = 2001;
    /// The user closed the connection with the front-end.
    pub const CONNECTION_CLOSED: i64 = 3000;
    /// The user rejected the request.
    pub const REQUEST_HAS_BEEN_REJECTED: i64 = 3001;
    /// The user cancelled the request.
    pub const REQUEST_HAS_BEEN_CANCELLED_BY_USER: i64 = 3002;
}

/// ABCI codes the network returns that map onto their own error code,
/// offset by [`codes::NODE_COMMUNICATION_FAILED`].
const MAPPED_ABCI_CODES: [u32; 5] = [51, 60, 70, 80, 89];

pub const INVALID_PARAMS_MESSAGE: &str = "Invalid params";
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal error";
pub const SERVER_ERROR_MESSAGE: &str = "Server error";
pub const NETWORK_ERROR_MESSAGE: &str = "Network error";
pub const APPLICATION_ERROR_MESSAGE: &str = "Application error";
pub const USER_ERROR_MESSAGE: &str = "User error";

// Short, stable error texts carried in `data`.
pub const ERR_PARAMS_REQUIRED: &str = "the params are required";
pub const ERR_PARAMS_DO_NOT_MATCH: &str = "the params do not match expected ones";
pub const ERR_PUBLIC_KEY_IS_REQUIRED: &str = "the public key is required";
pub const ERR_TRANSACTION_IS_REQUIRED: &str = "the transaction is required";
pub const ERR_SENDING_MODE_IS_REQUIRED: &str = "the sending mode is required";
pub const ERR_PUBLIC_KEY_IS_NOT_ALLOWED_TO_BE_USED: &str =
    "this public key is not allowed to be used";
pub const ERR_NO_HEALTHY_NODE_AVAILABLE: &str = "no healthy node available";
pub const ERR_COULD_NOT_GET_LAST_BLOCK_INFORMATION: &str =
    "could not get information about the last block on the network";
pub const ERR_COULD_NOT_GET_CHAIN_ID_FROM_NODE: &str = "could not get the chain ID from the node";
pub const ERR_USER_REJECTED_SENDING_OF_TRANSACTION: &str =
    "the user rejected the sending of the transaction";
pub const ERR_USER_REJECTED_SIGNING_OF_TRANSACTION: &str =
    "the user rejected the signing of the transaction";
pub const ERR_USER_REJECTED_CHECKING_OF_TRANSACTION: &str =
    "the user rejected the checking of the transaction";
pub const ERR_USER_REJECTED_ACCESS_TO_KEYS: &str = "the user rejected the access to the keys";
pub const ERR_USER_REJECTED_WALLET_CONNECTION: &str = "the user rejected the wallet connection";
pub const ERR_CONNECTION_CLOSED: &str = "the connection has been closed";
pub const ERR_USER_CANCELLED_THE_REQUEST: &str = "the user cancelled the request";
pub const ERR_REQUEST_INTERRUPTED: &str = "the request has been interrupted";
pub const ERR_NO_WALLET_TO_CONNECT_TO: &str =
    "there is no wallet to connect to, you should create one first";
pub const ERR_AUTHORIZATION_HEADER_IS_REQUIRED: &str = "the authorization header is required";
pub const ERR_ORIGIN_HEADER_IS_REQUIRED: &str = "the origin header is required";
pub const ERR_NO_SUCH_CONNECTION: &str = "there is no connection matching this token";
pub const ERR_WRONG_PASSPHRASE: &str = "wrong passphrase";
pub const ERR_WALLET_DOES_NOT_EXIST: &str = "the wallet does not exist";

/// JSON-RPC error object `{code, message, data}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, thiserror::Error)]
#[error("{message} ({code}): {}", .data.as_deref().unwrap_or_default())]
pub struct ApiError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl ApiError {
    pub fn new(code: i64, message: impl Into<String>, data: impl ToString) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data.to_string()),
        }
    }

    pub fn invalid_params(data: impl ToString) -> Self {
        Self::new(codes::INVALID_PARAMS, INVALID_PARAMS_MESSAGE, data)
    }

    pub fn internal(data: impl ToString) -> Self {
        Self::new(codes::INTERNAL_ERROR, INTERNAL_ERROR_MESSAGE, data)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            codes::METHOD_NOT_FOUND,
            "Method not found",
            format!("method {method:?} is not supported"),
        )
    }

    pub fn invalid_request(data: impl ToString) -> Self {
        Self::new(codes::INVALID_REQUEST, "Invalid Request", data)
    }

    pub fn parse_error(data: impl ToString) -> Self {
        Self::new(codes::PARSE_ERROR, "Parse error", data)
    }

    pub fn request_interrupted() -> Self {
        Self::new(
            codes::REQUEST_HAS_BEEN_INTERRUPTED,
            SERVER_ERROR_MESSAGE,
            ERR_REQUEST_INTERRUPTED,
        )
    }

    pub fn hostname_resolution_failure(data: impl ToString) -> Self {
        Self::new(codes::HOSTNAME_RESOLUTION_FAILURE, SERVER_ERROR_MESSAGE, data)
    }

    pub fn authentication_failure(data: impl ToString) -> Self {
        Self::new(codes::AUTHENTICATION_FAILURE, SERVER_ERROR_MESSAGE, data)
    }

    pub fn network(data: impl ToString) -> Self {
        Self::new(codes::NODE_COMMUNICATION_FAILED, NETWORK_ERROR_MESSAGE, data)
    }

    /// Maps a transaction rejected by the network onto its error code.
    ///
    /// Known ABCI codes keep their own slot (`1000 + code`); anything else
    /// collapses onto [`codes::NETWORK_REJECTED_TRANSACTION`].
    pub fn network_rejection(abci_code: u32, data: impl ToString) -> Self {
        let code = if MAPPED_ABCI_CODES.contains(&abci_code) {
            codes::NODE_COMMUNICATION_FAILED + i64::from(abci_code)
        } else {
            codes::NETWORK_REJECTED_TRANSACTION
        };
        Self::new(code, NETWORK_ERROR_MESSAGE, data)
    }

    pub fn request_not_permitted(data: impl ToString) -> Self {
        Self::new(codes::REQUEST_NOT_PERMITTED, APPLICATION_ERROR_MESSAGE, data)
    }

    pub fn application_cancellation(data: impl ToString) -> Self {
        Self::new(
            codes::APPLICATION_CANCELLED_THE_REQUEST,
            APPLICATION_ERROR_MESSAGE,
            data,
        )
    }

    pub fn connection_closed() -> Self {
        Self::new(
            codes::CONNECTION_CLOSED,
            USER_ERROR_MESSAGE,
            ERR_CONNECTION_CLOSED,
        )
    }

    pub fn user_rejection(data: impl ToString) -> Self {
        Self::new(codes::REQUEST_HAS_BEEN_REJECTED, USER_ERROR_MESSAGE, data)
    }

    pub fn user_cancellation() -> Self {
        Self::new(
            codes::REQUEST_HAS_BEEN_CANCELLED_BY_USER,
            USER_ERROR_MESSAGE,
            ERR_USER_CANCELLED_THE_REQUEST,
        )
    }

    /// Short error text, used when relaying the error to the front-end.
    pub fn data_text(&self) -> &str {
        self.data.as_deref().unwrap_or(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_code_and_message() {
        let invalid = ApiError::invalid_params(ERR_PUBLIC_KEY_IS_REQUIRED);
        assert_eq!(invalid.code, codes::INVALID_PARAMS);
        assert_eq!(invalid.message, "Invalid params");
        assert_eq!(invalid.data.as_deref(), Some("the public key is required"));

        let network = ApiError::network(ERR_NO_HEALTHY_NODE_AVAILABLE);
        assert_eq!(network.code, 1000);
        assert_eq!(network.message, "Network error");

        let spam = ApiError::application_cancellation("quota exceeded");
        assert_eq!(spam.code, 2001);
        assert_eq!(spam.message, "Application error");

        let interrupted = ApiError::request_interrupted();
        assert_eq!(interrupted.code, -32001);
        assert_eq!(interrupted.message, "Server error");

        let closed = ApiError::connection_closed();
        assert_eq!(closed.code, 3000);
        assert_eq!(closed.data_text(), ERR_CONNECTION_CLOSED);
    }

    #[test]
    fn network_rejection_keeps_known_abci_codes() {
        assert_eq!(ApiError::network_rejection(51, "x").code, 1051);
        assert_eq!(ApiError::network_rejection(89, "x").code, 1089);
        assert_eq!(ApiError::network_rejection(12, "x").code, 1001);
        assert_eq!(ApiError::network_rejection(0, "x").code, 1001);
    }

    #[test]
    fn serializes_as_json_rpc_error_object() {
        let err = ApiError::user_rejection(ERR_USER_REJECTED_SENDING_OF_TRANSACTION);
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(
            json,
            r#"{"code":3001,"message":"User error","data":"the user rejected the sending of the transaction"}"#
        );
    }
}
