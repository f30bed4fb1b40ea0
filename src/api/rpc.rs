// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON-RPC 2.0 endpoint used by connected applications.
//!
//! The calling application is identified by the hostname of its `Origin`
//! header. Every method but `client.connect_wallet` and
//! `client.get_chain_id` needs the token returned on connection, passed as
//! `Authorization: Bearer <token>`.
//!
//! Failures are returned in the `error` member with HTTP status 200, as the
//! JSON-RPC convention requires.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::connections::{ConnectedWallet, ConnectionError, RestrictedKey, Token};
use crate::context::RequestContext;
use crate::error::{
    ApiError, ERR_AUTHORIZATION_HEADER_IS_REQUIRED, ERR_ORIGIN_HEADER_IS_REQUIRED,
    ERR_PARAMS_DO_NOT_MATCH, ERR_PARAMS_REQUIRED, ERR_SENDING_MODE_IS_REQUIRED,
};
use crate::node::SendingMode;
use crate::pipeline::{AuthorizationMode, AuthorizedTransaction, TransactionRequest};
use crate::state::AppState;

pub const JSONRPC_VERSION: &str = "2.0";

pub const CONNECT_WALLET: &str = "client.connect_wallet";
pub const DISCONNECT_WALLET: &str = "client.disconnect_wallet";
pub const LIST_KEYS: &str = "client.list_keys";
pub const CHECK_TRANSACTION: &str = "client.check_transaction";
pub const SIGN_TRANSACTION: &str = "client.sign_transaction";
pub const SEND_TRANSACTION: &str = "client.send_transaction";
pub const GET_CHAIN_ID: &str = "client.get_chain_id";

const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub params: Value,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub id: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    #[schema(value_type = Object)]
    pub id: Value,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Value, error: ApiError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ConnectWalletResult {
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ListKeysResult {
    pub keys: Vec<RestrictedKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChainIdResult {
    #[serde(rename = "chainID")]
    pub chain_id: String,
}

/// Parameters of `client.send_transaction`.
#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendTransactionParams {
    #[serde(flatten)]
    pub request: TransactionRequest,
    #[serde(default)]
    pub sending_mode: Option<SendingMode>,
}

/// Handles one JSON-RPC request from a connected application.
#[utoipa::path(
    post,
    path = "/api/v2/requests",
    tag = "Connected applications",
    request_body = JsonRpcRequest,
    params(
        ("Origin" = String, Header, description = "Origin of the calling application"),
        ("Authorization" = Option<String>, Header, description = "Bearer token returned by client.connect_wallet")
    ),
    responses(
        (status = 200, description = "JSON-RPC response, success or error", body = JsonRpcResponse)
    )
)]
pub async fn handle_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<JsonRpcResponse> {
    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(error) => return Json(JsonRpcResponse::error(Value::Null, error)),
    };

    // The request is interrupted if the caller goes away mid-flight.
    let ctx = RequestContext::child_of(&state.shutdown);
    let _interrupt_on_drop = ctx.cancellation().clone().drop_guard();

    let id = request.id.clone();
    let method = request.method.clone();
    info!(trace_id = %ctx.trace_id(), method = %method, "Request received");

    let response = match dispatch(&state, &ctx, &headers, request).await {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(error) => {
            warn!(trace_id = %ctx.trace_id(), method = %method, error = %error, "Request failed");
            JsonRpcResponse::error(id, error)
        }
    };
    Json(response)
}

fn parse_request(body: &[u8]) -> Result<JsonRpcRequest, ApiError> {
    let value: Value = serde_json::from_slice(body).map_err(ApiError::parse_error)?;
    let request: JsonRpcRequest =
        serde_json::from_value(value).map_err(ApiError::invalid_request)?;
    if request.jsonrpc != JSONRPC_VERSION {
        return Err(ApiError::invalid_request(format!(
            "the JSON-RPC version must be \"{JSONRPC_VERSION}\""
        )));
    }
    if request.method.is_empty() {
        return Err(ApiError::invalid_request("the method is required"));
    }
    Ok(request)
}

async fn dispatch(
    state: &AppState,
    ctx: &RequestContext,
    headers: &HeaderMap,
    request: JsonRpcRequest,
) -> Result<Value, ApiError> {
    let pipeline = &state.pipeline;

    match request.method.as_str() {
        CONNECT_WALLET => {
            let hostname = origin_hostname(headers)?
                .ok_or_else(|| ApiError::hostname_resolution_failure(ERR_ORIGIN_HEADER_IS_REQUIRED))?;
            let token = pipeline.connect_wallet(ctx, &hostname).await?;
            to_result(ConnectWalletResult {
                token: token.as_str().to_string(),
            })
        }
        DISCONNECT_WALLET => {
            let token = bearer_token(headers)?;
            let hostname = origin_hostname(headers)?.unwrap_or_default();
            let registry = pipeline.registry();
            let connected_wallet = registry.get_connected_wallet(&token)?;
            if connected_wallet.require_interaction() && connected_wallet.hostname() != hostname {
                return Err(ConnectionError::NoSuchConnection.into());
            }
            registry.disconnect(&token)?;
            Ok(Value::Null)
        }
        LIST_KEYS => {
            let connected_wallet = authenticate(state, ctx, headers).await?;
            let keys = pipeline.list_keys(ctx, &connected_wallet).await?;
            to_result(ListKeysResult { keys })
        }
        CHECK_TRANSACTION => {
            let params: TransactionRequest = parse_params(request.params)?;
            authorize(state, ctx, headers, AuthorizationMode::Check, params).await
        }
        SIGN_TRANSACTION => {
            let params: TransactionRequest = parse_params(request.params)?;
            authorize(state, ctx, headers, AuthorizationMode::Sign, params).await
        }
        SEND_TRANSACTION => {
            let params: SendTransactionParams = parse_params(request.params)?;
            params.request.validate()?;
            let sending_mode = params
                .sending_mode
                .ok_or_else(|| ApiError::invalid_params(ERR_SENDING_MODE_IS_REQUIRED))?;
            authorize(
                state,
                ctx,
                headers,
                AuthorizationMode::Send(sending_mode),
                params.request,
            )
            .await
        }
        GET_CHAIN_ID => {
            let chain_id = pipeline.get_chain_id(ctx).await?;
            to_result(ChainIdResult { chain_id })
        }
        other => Err(ApiError::method_not_found(other)),
    }
}

async fn authorize(
    state: &AppState,
    ctx: &RequestContext,
    headers: &HeaderMap,
    mode: AuthorizationMode,
    request: TransactionRequest,
) -> Result<Value, ApiError> {
    // Bad parameters are reported before the session is looked at, so they
    // never trigger an unlock.
    request.validate()?;
    let connected_wallet = authenticate(state, ctx, headers).await?;
    let authorized: AuthorizedTransaction = state
        .pipeline
        .authorize(ctx, mode, request, &connected_wallet)
        .await?;
    to_result(authorized)
}

async fn authenticate(
    state: &AppState,
    ctx: &RequestContext,
    headers: &HeaderMap,
) -> Result<ConnectedWallet, ApiError> {
    let token = bearer_token(headers)?;
    // API tokens are used by headless clients that send no origin.
    let hostname = origin_hostname(headers)?.unwrap_or_default();
    debug!(trace_id = %ctx.trace_id(), hostname = %hostname, token = %token.short(), "Authenticating");
    state
        .pipeline
        .registry()
        .authenticate(ctx, &hostname, &token)
        .await
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, ApiError> {
    if params.is_null() {
        return Err(ApiError::invalid_params(ERR_PARAMS_REQUIRED));
    }
    serde_json::from_value(params).map_err(|e| {
        debug!(error = %e, "Params could not be decoded");
        ApiError::invalid_params(ERR_PARAMS_DO_NOT_MATCH)
    })
}

fn to_result<T: Serialize>(result: T) -> Result<Value, ApiError> {
    serde_json::to_value(result)
        .map_err(|e| ApiError::internal(format!("could not serialize the result: {e}")))
}

/// Token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<Token, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ApiError::authentication_failure(ERR_AUTHORIZATION_HEADER_IS_REQUIRED))?;
    let value = value.to_str().map_err(|_| {
        ApiError::authentication_failure("the authorization header is not valid text")
    })?;
    match value.strip_prefix(BEARER_PREFIX).map(str::trim) {
        Some(token) if !token.is_empty() => Ok(Token::from(token)),
        _ => Err(ApiError::authentication_failure(
            "the authorization header must carry a bearer token",
        )),
    }
}

/// Hostname of the `Origin` header, `None` when the header is absent.
pub fn origin_hostname(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    let Some(value) = headers.get(header::ORIGIN) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| {
        ApiError::hostname_resolution_failure("the origin header is not valid text")
    })?;
    let origin = url::Url::parse(value).map_err(|e| {
        ApiError::hostname_resolution_failure(format!("could not parse the origin header: {e}"))
    })?;
    origin
        .host_str()
        .map(|host| Some(host.to_string()))
        .ok_or_else(|| ApiError::hostname_resolution_failure("the origin has no hostname"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::codes;
    use axum::http::HeaderValue;
    use serde_json::json;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        headers
    }

    #[test]
    fn envelope_is_validated() {
        let err = parse_request(b"{not json").unwrap_err();
        assert_eq!(err.code, codes::PARSE_ERROR);

        let err = parse_request(br#"{"jsonrpc":"1.0","method":"client.list_keys","id":1}"#)
            .unwrap_err();
        assert_eq!(err.code, codes::INVALID_REQUEST);

        let err = parse_request(br#"{"jsonrpc":"2.0","id":1}"#).unwrap_err();
        assert_eq!(err.code, codes::INVALID_REQUEST);

        let request =
            parse_request(br#"{"jsonrpc":"2.0","method":"client.get_chain_id","id":"a"}"#)
                .unwrap();
        assert_eq!(request.method, GET_CHAIN_ID);
        assert_eq!(request.id, json!("a"));
        assert!(request.params.is_null());
    }

    #[test]
    fn origin_is_reduced_to_its_hostname() {
        let found = origin_hostname(&headers(&[(
            header::ORIGIN,
            "https://app.example.org:8443",
        )]))
        .unwrap();
        assert_eq!(found.as_deref(), Some("app.example.org"));

        assert_eq!(origin_hostname(&HeaderMap::new()).unwrap(), None);

        let err = origin_hostname(&headers(&[(header::ORIGIN, "not an origin")])).unwrap_err();
        assert_eq!(err.code, codes::HOSTNAME_RESOLUTION_FAILURE);
    }

    #[test]
    fn bearer_token_is_required() {
        let err = bearer_token(&HeaderMap::new()).unwrap_err();
        assert_eq!(err.code, codes::AUTHENTICATION_FAILURE);
        assert_eq!(err.data_text(), ERR_AUTHORIZATION_HEADER_IS_REQUIRED);

        let err = bearer_token(&headers(&[(header::AUTHORIZATION, "Basic abc")])).unwrap_err();
        assert_eq!(err.code, codes::AUTHENTICATION_FAILURE);

        let token = bearer_token(&headers(&[(header::AUTHORIZATION, "Bearer abc123")])).unwrap();
        assert_eq!(token.as_str(), "abc123");
    }

    #[test]
    fn params_must_be_present_and_match() {
        let err = parse_params::<TransactionRequest>(Value::Null).unwrap_err();
        assert_eq!(err.data_text(), ERR_PARAMS_REQUIRED);

        let err = parse_params::<TransactionRequest>(json!({"publicKey": 12})).unwrap_err();
        assert_eq!(err.code, codes::INVALID_PARAMS);
        assert_eq!(err.data_text(), ERR_PARAMS_DO_NOT_MATCH);
    }

    #[test]
    fn send_params_carry_the_sending_mode() {
        let params: SendTransactionParams = parse_params(json!({
            "publicKey": "pk",
            "transaction": {"transfer": {"to": "bob", "amount": "1"}},
            "sendingMode": "TYPE_SYNC"
        }))
        .unwrap();
        assert_eq!(params.request.public_key, "pk");
        assert_eq!(params.sending_mode, Some(SendingMode::Sync));

        let params: SendTransactionParams =
            parse_params(json!({"publicKey": "pk", "transaction": {}})).unwrap();
        assert!(params.sending_mode.is_none());
    }

    #[test]
    fn responses_carry_either_result_or_error() {
        let ok = serde_json::to_value(JsonRpcResponse::success(json!(1), json!({"a": 1}))).unwrap();
        assert_eq!(ok, json!({"jsonrpc": "2.0", "result": {"a": 1}, "id": 1}));

        let failed = serde_json::to_value(JsonRpcResponse::error(
            json!(2),
            ApiError::method_not_found("nope"),
        ))
        .unwrap();
        assert_eq!(failed["error"]["code"], json!(codes::METHOD_NOT_FOUND));
        assert!(failed.get("result").is_none());
    }
}
