// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authenticated callers.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```
//!
//! The token proves identity only. After verifying the signature the
//! extractor re-fetches the principal, so `user.role` is the role stored
//! *now*; a token minted before a demotion carries no leftover privilege.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::engine::fetch_fresh;
use super::error::AuthError;
use super::roles::Role;
use crate::state::AppState;

/// An authenticated caller, as established by [`Auth`].
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Subject of the verified token.
    pub user_id: String,
    pub email: String,
    /// Role from the principal store at request time, not the token claim.
    pub role: Role,
}

/// Extractor for authenticated callers.
///
/// Verifies the `Authorization: Bearer <token>` broker token, then resolves
/// the subject against the principal store. Tests can pre-insert an
/// [`AuthenticatedUser`] into the request extensions to bypass the header
/// path.
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // An upstream layer (or a test) may have authenticated already.
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>().cloned() {
            return Ok(Auth(user));
        }

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthHeader)?;

        let claims = state.codec.verify(token)?;

        let principal = fetch_fresh(
            state.store.as_ref(),
            state.config.principal_timeout,
            &claims.sub,
        )
        .await
        .map_err(|detail| {
            tracing::error!(
                user_id = %claims.sub,
                error = %detail,
                "principal store unavailable while authenticating"
            );
            AuthError::InternalError("principal store unavailable".to_string())
        })?
        .ok_or(AuthError::UnknownPrincipal)?;

        Ok(Auth(AuthenticatedUser {
            user_id: principal.user_id,
            email: principal.email,
            role: principal.role,
        }))
    }
}

/// Extractor that requires the admin console roles (`Admin` or above).
pub struct AdminOnly(pub AuthenticatedUser);

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        if !user.role.is_admin() {
            return Err(AuthError::InsufficientPermissions);
        }

        Ok(AdminOnly(user))
    }
}
