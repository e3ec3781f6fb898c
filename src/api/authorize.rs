// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The authorization decision endpoint.

use axum::{extract::State, http::HeaderMap, Json};

use crate::{
    error::ApiError,
    models::{AuthorizeRequest, AuthorizeResponse},
    state::AppState,
};

use super::client_meta;

/// Render an access decision for a requested target.
///
/// Called by the identity provider after session authentication. Denial is
/// a decision, not an error: the response is 200 either way and always
/// carries a destination URL. Only contract violations (missing parameters,
/// an unusable redirect URL, an invalid target) and rate limiting surface
/// as HTTP errors.
#[utoipa::path(
    post,
    path = "/v1/authorize",
    tag = "Decisions",
    request_body = AuthorizeRequest,
    responses(
        (status = 200, description = "Decision rendered", body = AuthorizeResponse),
        (status = 400, description = "Missing parameters or invalid redirect URL"),
        (status = 422, description = "Target failed validation"),
        (status = 429, description = "Rate limited")
    )
)]
pub async fn authorize(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AuthorizeRequest>,
) -> Result<Json<AuthorizeResponse>, ApiError> {
    let client = client_meta(&headers);
    let decision = state
        .engine
        .authorize(
            &request.user_id,
            &request.target,
            &request.redirect_url,
            &client,
        )
        .await?;
    Ok(Json(decision.into()))
}
