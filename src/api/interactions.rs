// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Endpoints the front-end polls for interactions and answers them through.

use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::{IntoParams, ToSchema};

use super::rpc::bearer_token;
use crate::interaction::{FrontEndError, FrontEndQueue, InteractionEvent, InteractionResponse};
use crate::state::AppState;

/// Longest a poll may wait for an interaction.
pub const MAX_WAIT_SECS: u64 = 30;

/// HTTP error of the interactions endpoints.
#[derive(Debug)]
pub struct HttpError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<FrontEndError> for HttpError {
    fn from(e: FrontEndError) -> Self {
        let status = match e {
            FrontEndError::UnknownInteraction(_) => StatusCode::NOT_FOUND,
            FrontEndError::UnexpectedResponse(_) => StatusCode::BAD_REQUEST,
            FrontEndError::RequestGone(_) => StatusCode::GONE,
            FrontEndError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

/// Query parameters for polling.
#[derive(Debug, Deserialize, IntoParams)]
pub struct PollQuery {
    /// Seconds to wait for an interaction when none is queued (max 30)
    #[param(default = 0)]
    pub wait_secs: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InteractionsResponse {
    pub interactions: Vec<InteractionEvent>,
}

/// Resolves the queue, checking the front-end's bearer token.
fn authorized_queue<'a>(
    state: &'a AppState,
    headers: &HeaderMap,
) -> Result<&'a FrontEndQueue, HttpError> {
    let front_end = state
        .front_end
        .as_ref()
        .ok_or_else(|| HttpError::new(StatusCode::NOT_FOUND, "no front-end is attached"))?;
    match bearer_token(headers) {
        Ok(token) if token.as_str() == front_end.token => Ok(front_end.queue.as_ref()),
        _ => {
            warn!("Rejected front-end request with a missing or wrong token");
            Err(HttpError::new(StatusCode::UNAUTHORIZED, "invalid front-end token"))
        }
    }
}

/// Takes every pending interaction.
///
/// Waits up to `wait_secs` when nothing is queued.
#[utoipa::path(
    get,
    path = "/api/v2/interactions",
    tag = "Interactions",
    params(PollQuery),
    responses(
        (status = 200, description = "Queued interactions, possibly none", body = InteractionsResponse),
        (status = 401, description = "Invalid front-end token"),
        (status = 404, description = "Reviews are answered automatically")
    )
)]
pub async fn list_interactions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PollQuery>,
) -> Result<Json<InteractionsResponse>, HttpError> {
    let queue = authorized_queue(&state, &headers)?;
    let wait = Duration::from_secs(query.wait_secs.unwrap_or(0).min(MAX_WAIT_SECS));
    let interactions = tokio::select! {
        biased;
        _ = state.shutdown.cancelled() => Vec::new(),
        taken = queue.take_events(wait) => taken?,
    };
    Ok(Json(InteractionsResponse { interactions }))
}

/// Answers the request interaction `id`.
#[utoipa::path(
    post,
    path = "/api/v2/interactions/{id}",
    tag = "Interactions",
    params(
        ("id" = String, Path, description = "Interaction ID")
    ),
    request_body = InteractionResponse,
    responses(
        (status = 204, description = "Answer relayed"),
        (status = 400, description = "The answer does not fit the interaction"),
        (status = 401, description = "Invalid front-end token"),
        (status = 404, description = "No such pending interaction"),
        (status = 410, description = "The request was abandoned")
    )
)]
pub async fn respond(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(response): Json<InteractionResponse>,
) -> Result<StatusCode, HttpError> {
    authorized_queue(&state, &headers)?.respond(&id, response)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn queue_errors_map_to_statuses() {
        let gone: HttpError = FrontEndError::RequestGone("i1".to_string()).into();
        assert_eq!(gone.status, StatusCode::GONE);

        let response = HttpError::from(FrontEndError::UnknownInteraction("i1".to_string()))
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(
            String::from_utf8(body.to_vec()).unwrap(),
            r#"{"error":"there is no pending interaction \"i1\""}"#
        );
    }
}
