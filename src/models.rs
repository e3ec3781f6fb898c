// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! This module defines the request and response data structures used by
//! the decision endpoints. All types derive `Serialize`, `Deserialize`, and
//! `ToSchema` for automatic JSON handling and OpenAPI documentation.
//!
//! ## Model Categories
//!
//! - **Authorization**: access decisions for a requested target
//! - **Validation**: token checks performed by satellite applications
//!
//! Decision responses are always HTTP 200; `authorized`/`valid` carry the
//! outcome and `error` carries the fixed denial reason. Admin and site
//! management endpoints define their own types next to their handlers.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{Decision, QuickOutcome, Role, ValidatedUser, ValidationOutcome};

// =============================================================================
// Authorization Models
// =============================================================================

/// Request for an authorization decision.
///
/// Sent by the identity provider after it has authenticated the session;
/// `user_id` is trusted caller input.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthorizeRequest {
    /// The principal requesting access.
    pub user_id: String,
    /// Requested target: a catalog permission name, a bare site name, or a
    /// full `https` URL.
    pub target: String,
    /// Where the caller wants the user sent on success. Must be an absolute
    /// `http(s)` URL; existing query parameters are preserved.
    pub redirect_url: String,
}

/// Outcome of an authorization decision.
///
/// Both outcomes carry a destination: the requested URL when granted, the
/// role's landing page when denied. A fresh auth token rides along as the
/// `auth_token` query parameter whenever the principal is known.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthorizeResponse {
    /// Whether access to the target was granted.
    pub authorized: bool,
    /// Destination URL, on denial as well as success.
    pub redirect_url: String,
    /// The principal's current role, when granted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Fixed denial reason, when denied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Decision> for AuthorizeResponse {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Granted { redirect_url, role } => Self {
                authorized: true,
                redirect_url,
                role: Some(role),
                error: None,
            },
            Decision::Denied {
                redirect_url,
                reason,
            } => Self {
                authorized: false,
                redirect_url,
                role: None,
                error: Some(reason),
            },
        }
    }
}

// =============================================================================
// Validation Models
// =============================================================================

/// Request for a full token validation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ValidateRequest {
    /// The auth token as received (opaque to the caller).
    pub token: String,
    /// The user the caller believes the token belongs to.
    pub user_id: String,
}

/// Principal snapshot returned on successful validation.
///
/// Role and permissions are the *current* stored values, never the
/// snapshot embedded in the token.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ValidatedUserInfo {
    /// The principal's stable ID.
    pub id: String,
    /// The principal's email address.
    pub email: String,
    /// First name, if the identity provider supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// Last name, if the identity provider supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Current role.
    pub role: Role,
    /// Effective permission set (role defaults plus grants), sorted.
    pub permissions: Vec<String>,
}

impl From<ValidatedUser> for ValidatedUserInfo {
    fn from(user: ValidatedUser) -> Self {
        Self {
            id: user.user_id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
            permissions: user.permissions,
        }
    }
}

/// Outcome of a full token validation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ValidateResponse {
    /// Whether the token is valid for the claimed user.
    pub valid: bool,
    /// The principal's current state, when valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<ValidatedUserInfo>,
    /// Token issue instant (epoch millis), when valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<i64>,
    /// Fixed failure reason, when invalid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ValidationOutcome> for ValidateResponse {
    fn from(outcome: ValidationOutcome) -> Self {
        match outcome {
            ValidationOutcome::Valid { user, issued_at } => Self {
                valid: true,
                user: Some(user.into()),
                issued_at: Some(issued_at),
                error: None,
            },
            ValidationOutcome::Invalid { reason } => Self {
                valid: false,
                user: None,
                issued_at: None,
                error: Some(reason),
            },
        }
    }
}

/// Outcome of a quick validation: no profile, no permission list.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuickValidateResponse {
    /// Whether the token is valid for the claimed user.
    pub valid: bool,
    /// The principal's current role, when valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Token issue instant (epoch millis), when valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<i64>,
}

impl From<QuickOutcome> for QuickValidateResponse {
    fn from(outcome: QuickOutcome) -> Self {
        Self {
            valid: outcome.valid,
            role: outcome.role,
            issued_at: outcome.issued_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn granted_decision_maps_to_an_authorized_response() {
        let response: AuthorizeResponse = Decision::Granted {
            redirect_url: "https://app.example.com/?auth_token=abc".to_string(),
            role: Role::Premium,
        }
        .into();

        assert!(response.authorized);
        assert_eq!(response.role, Some(Role::Premium));
        assert_eq!(response.error, None);

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains(r#""role":"premium""#));
        assert!(!json.contains("error"));
    }

    #[test]
    fn denied_decision_keeps_the_fallback_url() {
        let response: AuthorizeResponse = Decision::Denied {
            redirect_url: "https://standard.nitroauth.app/?auth_token=abc".to_string(),
            reason: "Insufficient permissions for premium_sites".to_string(),
        }
        .into();

        assert!(!response.authorized);
        assert!(response.redirect_url.contains("auth_token"));
        assert_eq!(response.role, None);

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("Insufficient permissions"));
        assert!(!json.contains(r#""role""#));
    }

    #[test]
    fn invalid_outcome_serializes_without_a_user() {
        let response: ValidateResponse = ValidationOutcome::Invalid {
            reason: "Token expired".to_string(),
        }
        .into();

        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"valid":false,"error":"Token expired"}"#);
    }

    #[test]
    fn valid_outcome_carries_the_current_principal() {
        let response: ValidateResponse = ValidationOutcome::Valid {
            user: ValidatedUser {
                user_id: "user_1".to_string(),
                email: "user_1@example.com".to_string(),
                first_name: Some("Ada".to_string()),
                last_name: None,
                role: Role::Standard,
                permissions: vec!["standard_sites".to_string()],
            },
            issued_at: 1_700_000_000_000,
        }
        .into();

        assert!(response.valid);
        let user = response.user.expect("user present");
        assert_eq!(user.id, "user_1");
        assert_eq!(user.permissions, vec!["standard_sites".to_string()]);
        assert_eq!(response.issued_at, Some(1_700_000_000_000));
    }

    #[test]
    fn quick_response_omits_role_when_invalid() {
        let response = QuickValidateResponse {
            valid: false,
            role: None,
            issued_at: None,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"valid":false}"#);
    }
}
