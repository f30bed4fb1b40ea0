// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    connections::RestrictedKey,
    error::ApiError,
    interaction::{InteractionEvent, InteractionResponse},
    node::SendingMode,
    pipeline::{AuthorizedTransaction, TransactionRequest},
    state::AppState,
    transaction::{ProofOfWork, Signature, Transaction},
};

pub mod health;
pub mod interactions;
pub mod rpc;

pub fn router(state: AppState) -> Router {
    let v2_routes = Router::new()
        .route("/requests", post(rpc::handle_request))
        .route("/interactions", get(interactions::list_interactions))
        .route("/interactions/{id}", post(interactions::respond))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .with_state(state);

    Router::new()
        .nest("/api/v2", v2_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        rpc::handle_request,
        interactions::list_interactions,
        interactions::respond,
        health::health,
        health::liveness
    ),
    components(
        schemas(
            rpc::JsonRpcRequest,
            rpc::JsonRpcResponse,
            rpc::ConnectWalletResult,
            rpc::ListKeysResult,
            rpc::ChainIdResult,
            rpc::SendTransactionParams,
            ApiError,
            RestrictedKey,
            TransactionRequest,
            AuthorizedTransaction,
            Transaction,
            Signature,
            ProofOfWork,
            SendingMode,
            InteractionEvent,
            InteractionResponse,
            interactions::InteractionsResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Connected applications", description = "JSON-RPC methods for third-party applications"),
        (name = "Interactions", description = "Reviews and notifications for the wallet owner's front-end"),
        (name = "Health", description = "Liveness and readiness checks")
    )
)]
struct ApiDoc;
