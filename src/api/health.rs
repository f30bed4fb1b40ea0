// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::time::Duration;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::context::RequestContext;
use crate::node::LastBlock;
use crate::state::AppState;

/// How long the readiness check waits for a node to answer.
const NODE_CHECK_TIMEOUT: Duration = Duration::from_secs(3);

/// Health check response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    /// Name of the network transactions are dispatched to.
    pub network: String,
    pub checks: HealthChecks,
}

/// Individual health check results.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    pub service: String,
    /// Whether a healthy node reported a chain ID.
    pub nodes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    /// Height of the last block the node knows about.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_height: Option<u64>,
}

/// Simple health check response for liveness checks.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

async fn check_nodes(state: &AppState) -> Result<LastBlock, String> {
    let ctx = RequestContext::child_of(&state.shutdown);
    let _stop_check = ctx.cancellation().clone().drop_guard();
    match tokio::time::timeout(NODE_CHECK_TIMEOUT, state.pipeline.last_block(&ctx)).await {
        Ok(Ok(last_block)) => Ok(last_block),
        Ok(Err(e)) => Err(e.data_text().to_string()),
        Err(_) => Err("timed out".to_string()),
    }
}

/// Health check endpoint handler.
///
/// Returns 200 when a node answers, 503 otherwise.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = ReadyResponse),
        (status = 503, description = "No node is reachable", body = ReadyResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let (nodes, last_block) = match check_nodes(&state).await {
        Ok(last_block) => ("ok".to_string(), Some(last_block)),
        Err(reason) => {
            tracing::warn!(reason = %reason, "Readiness check could not reach a node");
            ("unavailable".to_string(), None)
        }
    };
    let all_ok = last_block.is_some();
    let (chain_id, block_height) = match last_block {
        Some(block) => (Some(block.chain_id), Some(block.block_height)),
        None => (None, None),
    };

    let response = ReadyResponse {
        status: if all_ok { "ok" } else { "degraded" }.to_string(),
        network: state.network_name.clone(),
        checks: HealthChecks {
            service: "ok".to_string(),
            nodes,
            chain_id,
            block_height,
        },
    };

    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

/// Liveness handler.
///
/// Always returns 200 if the process is running.
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
