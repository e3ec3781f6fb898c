// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token validation endpoints for satellite applications.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    error::ApiError,
    models::{QuickValidateResponse, ValidateRequest, ValidateResponse},
    state::AppState,
};

use super::client_meta;

/// Query parameters for quick validation.
#[derive(Debug, Deserialize, IntoParams)]
pub struct QuickValidateParams {
    /// The auth token as received.
    pub token: String,
    /// The user the caller believes the token belongs to.
    pub user_id: String,
}

/// Fully validate a token and return the principal's current state.
///
/// An invalid token is a 200 with `valid: false` and a fixed reason; the
/// caller is expected to switch on it. Only rate limiting is an HTTP error.
#[utoipa::path(
    post,
    path = "/v1/validate",
    tag = "Decisions",
    request_body = ValidateRequest,
    responses(
        (status = 200, description = "Validation outcome", body = ValidateResponse),
        (status = 429, description = "Rate limited")
    )
)]
pub async fn validate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ValidateRequest>,
) -> Result<Json<ValidateResponse>, ApiError> {
    let client = client_meta(&headers);
    let outcome = state
        .validator
        .validate(&request.token, &request.user_id, &client)
        .await?;
    Ok(Json(outcome.into()))
}

/// Quick validation for boolean and role gates.
///
/// Serves repeat checks for the same token from a short-lived cache; the
/// answer can lag a role change by the cache TTL. Anything that needs the
/// authoritative state must POST `/v1/validate` instead.
#[utoipa::path(
    get,
    path = "/v1/validate/quick",
    tag = "Decisions",
    params(QuickValidateParams),
    responses(
        (status = 200, description = "Validation outcome", body = QuickValidateResponse),
        (status = 429, description = "Rate limited")
    )
)]
pub async fn validate_quick(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<QuickValidateParams>,
) -> Result<Json<QuickValidateResponse>, ApiError> {
    let client = client_meta(&headers);
    let outcome = state
        .validator
        .validate_quick(&params.token, &params.user_id, &client)
        .await?;
    Ok(Json(outcome.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::config::Config;
    use crate::storage::{Principal, PrincipalStore};
    use tempfile::TempDir;

    fn test_state() -> (AppState, TempDir) {
        let dir = TempDir::new().expect("tempdir");
        let state = AppState::new(Config::for_tests(dir.path())).expect("state");
        (state, dir)
    }

    async fn seed(state: &AppState, user_id: &str, role: Role) {
        state
            .store
            .upsert(&Principal::new(user_id, format!("{user_id}@example.com")).with_role(role))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn full_validation_returns_the_stored_principal() {
        let (state, _dir) = test_state();
        seed(&state, "user_1", Role::Premium).await;
        let token = state.codec.mint("user_1", Role::Premium);

        let Json(response) = validate(
            State(state.clone()),
            HeaderMap::new(),
            Json(ValidateRequest {
                token,
                user_id: "user_1".to_string(),
            }),
        )
        .await
        .expect("outcome");

        assert!(response.valid);
        let user = response.user.expect("user");
        assert_eq!(user.id, "user_1");
        assert_eq!(user.role, Role::Premium);
        assert!(user.permissions.contains(&"premium_sites".to_string()));
        assert!(response.issued_at.is_some());
    }

    #[tokio::test]
    async fn validation_tracks_a_role_change_made_after_minting() {
        let (state, _dir) = test_state();
        seed(&state, "user_1", Role::Premium).await;
        let token = state.codec.mint("user_1", Role::Premium);

        // Demote after the token was minted; the answer must follow the store.
        seed(&state, "user_1", Role::Guest).await;

        let Json(response) = validate(
            State(state.clone()),
            HeaderMap::new(),
            Json(ValidateRequest {
                token,
                user_id: "user_1".to_string(),
            }),
        )
        .await
        .expect("outcome");

        assert!(response.valid);
        assert_eq!(response.user.expect("user").role, Role::Guest);
    }

    #[tokio::test]
    async fn garbage_tokens_read_as_expired() {
        let (state, _dir) = test_state();

        let Json(response) = validate(
            State(state.clone()),
            HeaderMap::new(),
            Json(ValidateRequest {
                token: "not-a-token".to_string(),
                user_id: "user_1".to_string(),
            }),
        )
        .await
        .expect("outcome");

        assert!(!response.valid);
        assert_eq!(response.error.as_deref(), Some("Token expired"));
    }

    #[tokio::test]
    async fn subject_mismatch_is_reported() {
        let (state, _dir) = test_state();
        seed(&state, "user_1", Role::Standard).await;
        let token = state.codec.mint("user_1", Role::Standard);

        let Json(response) = validate(
            State(state.clone()),
            HeaderMap::new(),
            Json(ValidateRequest {
                token,
                user_id: "user_2".to_string(),
            }),
        )
        .await
        .expect("outcome");

        assert!(!response.valid);
        assert_eq!(response.error.as_deref(), Some("Token user mismatch"));
    }

    #[tokio::test]
    async fn quick_validation_returns_role_and_issue_time() {
        let (state, _dir) = test_state();
        seed(&state, "user_1", Role::Standard).await;
        let token = state.codec.mint("user_1", Role::Standard);

        let Json(response) = validate_quick(
            State(state.clone()),
            HeaderMap::new(),
            Query(QuickValidateParams {
                token,
                user_id: "user_1".to_string(),
            }),
        )
        .await
        .expect("outcome");

        assert!(response.valid);
        assert_eq!(response.role, Some(Role::Standard));
        assert!(response.issued_at.is_some());
    }

    #[tokio::test]
    async fn quick_validation_rejects_unknown_users_quietly() {
        let (state, _dir) = test_state();
        let token = state.codec.mint("ghost", Role::Standard);

        let Json(response) = validate_quick(
            State(state.clone()),
            HeaderMap::new(),
            Query(QuickValidateParams {
                token,
                user_id: "ghost".to_string(),
            }),
        )
        .await
        .expect("outcome");

        assert!(!response.valid);
        assert_eq!(response.role, None);
    }
}
