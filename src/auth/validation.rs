// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token validation for satellite applications.
//!
//! Satellites hand us the token they received (plus the user ID they believe
//! it belongs to) and get back a yes/no with the principal's *current* state.
//! Two tiers:
//!
//! - [`ValidationService::validate`] is the full check: token structure,
//!   signature, expiry, subject match, then a fresh principal read. The
//!   response carries the live role and effective permission set; the role
//!   snapshot inside the token is never the answer.
//! - [`ValidationService::validate_quick`] is the polling variant for boolean
//!   and role gates. Same token checks, but the principal read is served
//!   from a short-TTL cache when possible. A role change can lag here by up
//!   to the cache TTL; anything that cares must use the full check.
//!
//! Failure reasons are fixed strings the satellites switch on, so they are
//! part of the wire contract and deliberately never carry internal detail.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::engine::{fetch_fresh, AuthzError, ClientMeta, DENY_SYSTEM_ERROR, DENY_UNKNOWN_USER};
use super::roles::Role;
use super::token::{is_expired, TokenCodec, TokenError};
use crate::ratelimit::{ClassLimits, OperationClass, RateLimiter};
use crate::storage::audit::{AuditEvent, AuditEventType, AuditSink};
use crate::storage::cache::ValidationCache;
use crate::storage::principals::PrincipalStore;

/// Reason when token or claimed user ID is absent.
pub const REASON_MISSING_PARAMS: &str = "Missing parameters";

/// Reason for stale tokens (and anything undecodable, which must never fare
/// better than a stale token).
pub const REASON_TOKEN_EXPIRED: &str = "Token expired";

/// Reason for structural or signature failures.
pub const REASON_TOKEN_INVALID: &str = "Invalid token";

/// Reason when the token's subject is not the claimed user.
pub const REASON_USER_MISMATCH: &str = "Token user mismatch";

// =============================================================================
// Outcomes
// =============================================================================

/// The principal as reported to a satellite after full validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUser {
    pub user_id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Current stored role, not the token snapshot.
    pub role: Role,
    /// Effective permission set (role defaults plus grants), sorted.
    pub permissions: Vec<String>,
}

/// Result of a full validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid {
        user: ValidatedUser,
        /// Token issue instant (epoch millis), for satellite-side expiry UX.
        issued_at: i64,
    },
    Invalid {
        reason: String,
    },
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid { .. })
    }
}

/// Result of a quick validation: a boolean, the current role, and the token
/// issue time. No permission list, no profile fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuickOutcome {
    pub valid: bool,
    pub role: Option<Role>,
    /// Token issue instant (epoch millis).
    pub issued_at: Option<i64>,
}

impl QuickOutcome {
    fn invalid() -> Self {
        Self {
            valid: false,
            role: None,
            issued_at: None,
        }
    }
}

fn invalid(reason: &str) -> ValidationOutcome {
    ValidationOutcome::Invalid {
        reason: reason.to_string(),
    }
}

// =============================================================================
// Service
// =============================================================================

pub struct ValidationService {
    store: Arc<dyn PrincipalStore>,
    codec: Arc<TokenCodec>,
    limiter: Arc<RateLimiter>,
    audit: Arc<dyn AuditSink>,
    cache: Arc<ValidationCache>,
    validate_limits: ClassLimits,
    principal_timeout: Duration,
}

impl ValidationService {
    pub fn new(
        store: Arc<dyn PrincipalStore>,
        codec: Arc<TokenCodec>,
        limiter: Arc<RateLimiter>,
        audit: Arc<dyn AuditSink>,
        cache: Arc<ValidationCache>,
        validate_limits: ClassLimits,
        principal_timeout: Duration,
    ) -> Self {
        Self {
            store,
            codec,
            limiter,
            audit,
            cache,
            validate_limits,
            principal_timeout,
        }
    }

    /// Full validation. First failure wins; the order is part of the
    /// contract (a stale token reports expired even when the signature would
    /// also have failed).
    pub async fn validate(
        &self,
        token: &str,
        claimed_user_id: &str,
        client: &ClientMeta,
    ) -> Result<ValidationOutcome, AuthzError> {
        let token = token.trim();
        let claimed = claimed_user_id.trim();
        self.admit(claimed, client)?;

        if token.is_empty() || claimed.is_empty() {
            return Ok(invalid(REASON_MISSING_PARAMS));
        }
        if is_expired(token) {
            return Ok(invalid(REASON_TOKEN_EXPIRED));
        }

        let claims = match self.codec.verify(token) {
            Ok(claims) => claims,
            Err(TokenError::Expired) => return Ok(invalid(REASON_TOKEN_EXPIRED)),
            Err(_) => return Ok(invalid(REASON_TOKEN_INVALID)),
        };

        if claims.sub != claimed {
            self.audit_mismatch(claimed, &claims.sub, client);
            return Ok(invalid(REASON_USER_MISMATCH));
        }

        match fetch_fresh(self.store.as_ref(), self.principal_timeout, &claims.sub).await {
            Ok(Some(principal)) => {
                let mut permissions: Vec<String> =
                    principal.effective_permissions().into_iter().collect();
                permissions.sort();
                Ok(ValidationOutcome::Valid {
                    user: ValidatedUser {
                        user_id: principal.user_id,
                        email: principal.email,
                        first_name: principal.first_name,
                        last_name: principal.last_name,
                        role: principal.role,
                        permissions,
                    },
                    issued_at: claims.iat,
                })
            }
            Ok(None) => Ok(invalid(DENY_UNKNOWN_USER)),
            Err(detail) => {
                tracing::error!(
                    user_id = %claims.sub,
                    error = %detail,
                    "principal store unavailable during validation"
                );
                self.audit.record(
                    client.stamp(
                        AuditEvent::new(AuditEventType::SystemError)
                            .with_user(&claims.sub)
                            .with_details(json!({ "error": detail }))
                            .failed(DENY_SYSTEM_ERROR),
                    ),
                );
                Ok(invalid(DENY_SYSTEM_ERROR))
            }
        }
    }

    /// Quick validation: same token checks, cached principal read.
    pub async fn validate_quick(
        &self,
        token: &str,
        claimed_user_id: &str,
        client: &ClientMeta,
    ) -> Result<QuickOutcome, AuthzError> {
        let token = token.trim();
        let claimed = claimed_user_id.trim();
        self.admit(claimed, client)?;

        if token.is_empty() || claimed.is_empty() || is_expired(token) {
            return Ok(QuickOutcome::invalid());
        }

        let claims = match self.codec.verify(token) {
            Ok(claims) => claims,
            Err(_) => return Ok(QuickOutcome::invalid()),
        };
        if claims.sub != claimed {
            self.audit_mismatch(claimed, &claims.sub, client);
            return Ok(QuickOutcome::invalid());
        }

        // The cache holds the stored role from a recent fetch; the token's
        // own role claim is never consulted.
        if let Some(hit) = self.cache.get(token) {
            if hit.user_id == claims.sub {
                return Ok(QuickOutcome {
                    valid: true,
                    role: Some(hit.role),
                    issued_at: Some(claims.iat),
                });
            }
        }

        match fetch_fresh(self.store.as_ref(), self.principal_timeout, &claims.sub).await {
            Ok(Some(principal)) => {
                self.cache
                    .insert(token.to_string(), principal.user_id.clone(), principal.role);
                Ok(QuickOutcome {
                    valid: true,
                    role: Some(principal.role),
                    issued_at: Some(claims.iat),
                })
            }
            Ok(None) => Ok(QuickOutcome::invalid()),
            Err(detail) => {
                tracing::error!(
                    user_id = %claims.sub,
                    error = %detail,
                    "principal store unavailable during quick validation"
                );
                Ok(QuickOutcome::invalid())
            }
        }
    }

    /// Rate admission for the `Validate` class, keyed by the claimed user
    /// (or the client IP when the caller did not even name one).
    fn admit(&self, claimed: &str, client: &ClientMeta) -> Result<(), AuthzError> {
        let key = if claimed.is_empty() {
            client.ip.as_deref().unwrap_or("unknown")
        } else {
            claimed
        };
        let admission = self
            .limiter
            .check(key, OperationClass::Validate, self.validate_limits);
        if admission.is_allowed() {
            Ok(())
        } else {
            Err(AuthzError::RateLimited {
                retry_after_secs: admission.retry_after_secs(),
            })
        }
    }

    fn audit_mismatch(&self, claimed: &str, token_subject: &str, client: &ClientMeta) {
        self.audit.record(
            client.stamp(
                AuditEvent::new(AuditEventType::ValidationFailed)
                    .with_user(claimed)
                    .with_details(json!({ "token_subject": token_subject }))
                    .failed(REASON_USER_MISMATCH),
            ),
        );
    }
}
