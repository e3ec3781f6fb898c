// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::{Auth, Role};
use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::PrincipalStore;

/// Response for GET /v1/users/me
#[derive(Debug, Serialize, ToSchema)]
pub struct UserMeResponse {
    /// The principal's stable ID.
    pub user_id: String,
    /// The principal's email address.
    pub email: String,
    /// First name, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// Last name, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Current role.
    pub role: Role,
    /// Effective permission set (role defaults plus grants), sorted.
    pub permissions: Vec<String>,
}

/// Get the current authenticated principal's snapshot.
///
/// Role and permissions are read fresh from the store, not from the token.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current principal", body = UserMeResponse),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Principal no longer exists")
    )
)]
pub async fn get_current_user(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<UserMeResponse>, ApiError> {
    let principal = state
        .store
        .fetch(&user.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let mut permissions: Vec<String> = principal.effective_permissions().into_iter().collect();
    permissions.sort();

    Ok(Json(UserMeResponse {
        user_id: principal.user_id,
        email: principal.email,
        first_name: principal.first_name,
        last_name: principal.last_name,
        role: principal.role,
        permissions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthenticatedUser, SitePermission};
    use crate::config::Config;
    use crate::storage::{Principal, PrincipalStore};
    use axum::http::StatusCode;
    use tempfile::TempDir;

    fn test_state() -> (AppState, TempDir) {
        let dir = TempDir::new().expect("tempdir");
        let state = AppState::new(Config::for_tests(dir.path())).expect("state");
        (state, dir)
    }

    fn acting(user_id: &str, role: Role) -> Auth {
        Auth(AuthenticatedUser {
            user_id: user_id.to_string(),
            email: format!("{user_id}@example.com"),
            role,
        })
    }

    #[tokio::test]
    async fn me_returns_the_stored_snapshot() {
        let (state, _dir) = test_state();
        let grant = SitePermission::parse("https://partner.example.com").unwrap();
        state
            .store
            .upsert(
                &Principal::new("user_1", "user_1@example.com")
                    .with_role(Role::Standard)
                    .with_permissions(vec![grant]),
            )
            .await
            .unwrap();

        let Json(response) = get_current_user(acting("user_1", Role::Standard), State(state))
            .await
            .expect("snapshot");

        assert_eq!(response.user_id, "user_1");
        assert_eq!(response.role, Role::Standard);
        assert!(response.permissions.contains(&"standard_sites".to_string()));
        assert!(response.permissions.contains(&"https://partner.example.com".to_string()));
    }

    #[tokio::test]
    async fn me_is_not_found_for_a_deleted_principal() {
        let (state, _dir) = test_state();

        let err = get_current_user(acting("ghost", Role::Guest), State(state))
            .await
            .expect_err("ghost has no snapshot");

        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
