// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authorization engine.
//!
//! One entry point, [`AuthorizationEngine::authorize`], turns "may this user
//! enter this target?" into a redirect. The flow is strictly ordered:
//!
//! 1. parameter checks (cheap rejections before any shared state is touched)
//! 2. redirect URL sanity
//! 3. target validation
//! 4. rate admission for the `Authorize` class
//! 5. fresh principal read, bounded by a timeout
//! 6. the permission decision against the effective set
//! 7. token mint + redirect construction
//! 8. audit
//!
//! Two failure philosophies meet here. Caller-contract problems (missing
//! fields, bad URLs, rate exhaustion) are errors the caller can fix and come
//! back from, surfaced as [`AuthzError`]. Everything past the rate check is a
//! *decision*: the caller always receives a destination, and anything wrong
//! on our side of the fence collapses to a generic denial. Store failures
//! deny with `"System error"` and no token; the specifics go to the audit
//! trail and the logs, never to the caller.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use url::Url;

use super::catalog;
use super::permissions::{PermissionError, SitePermission};
use super::roles::Role;
use super::token::TokenCodec;
use crate::ratelimit::{ClassLimits, OperationClass, RateDecision, RateLimiter};
use crate::storage::audit::{AuditEvent, AuditEventType, AuditSink};
use crate::storage::principals::{Principal, PrincipalStore};

/// Query parameter the minted token travels in.
pub const AUTH_TOKEN_PARAM: &str = "auth_token";

/// Denial reason when the principal store cannot answer.
pub const DENY_SYSTEM_ERROR: &str = "System error";

/// Denial reason when the broker has no record of the user.
pub const DENY_UNKNOWN_USER: &str = "Unknown user";

// =============================================================================
// Request/response types
// =============================================================================

/// Caller-contract failures: the request never reached a decision.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    #[error("Missing parameters")]
    MissingParameter,

    #[error("Redirect URL must be an absolute http(s) URL")]
    InvalidRedirect,

    #[error("Invalid target: {0}")]
    InvalidTarget(PermissionError),

    #[error("Too many requests")]
    RateLimited { retry_after_secs: u64 },
}

/// The outcome of an authorization request.
///
/// Both arms carry a destination: denial is a redirect to somewhere the
/// principal *is* allowed, not a dead end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Granted {
        /// Caller-supplied redirect with the token attached.
        redirect_url: String,
        role: Role,
    },
    Denied {
        /// Fallback landing page; carries a token when identity was verified.
        redirect_url: String,
        reason: String,
    },
}

impl Decision {
    pub fn is_granted(&self) -> bool {
        matches!(self, Decision::Granted { .. })
    }

    pub fn redirect_url(&self) -> &str {
        match self {
            Decision::Granted { redirect_url, .. } => redirect_url,
            Decision::Denied { redirect_url, .. } => redirect_url,
        }
    }
}

/// Request metadata carried through to the audit trail.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientMeta {
    /// Stamp an audit event with whatever metadata the request carried.
    pub fn stamp(&self, mut event: AuditEvent) -> AuditEvent {
        if let Some(ip) = &self.ip {
            event = event.with_ip(ip.clone());
        }
        if let Some(agent) = &self.user_agent {
            event = event.with_user_agent(agent.clone());
        }
        event
    }
}

// =============================================================================
// Engine
// =============================================================================

pub struct AuthorizationEngine {
    store: Arc<dyn PrincipalStore>,
    codec: Arc<TokenCodec>,
    limiter: Arc<RateLimiter>,
    audit: Arc<dyn AuditSink>,
    authorize_limits: ClassLimits,
    principal_timeout: Duration,
}

impl AuthorizationEngine {
    pub fn new(
        store: Arc<dyn PrincipalStore>,
        codec: Arc<TokenCodec>,
        limiter: Arc<RateLimiter>,
        audit: Arc<dyn AuditSink>,
        authorize_limits: ClassLimits,
        principal_timeout: Duration,
    ) -> Self {
        Self {
            store,
            codec,
            limiter,
            audit,
            authorize_limits,
            principal_timeout,
        }
    }

    /// Decide whether `requester_id` may enter `target`, and where to send
    /// them.
    ///
    /// `redirect_url` is where the caller wants the user to land on success;
    /// existing query parameters are preserved and the minted token is
    /// appended as `auth_token`. On an ordinary denial the principal is
    /// redirected to their role's landing page, token attached, so the
    /// session stays usable even though the door stayed shut.
    pub async fn authorize(
        &self,
        requester_id: &str,
        target: &str,
        redirect_url: &str,
        client: &ClientMeta,
    ) -> Result<Decision, AuthzError> {
        let requester_id = requester_id.trim();
        let target = target.trim();
        let redirect_url = redirect_url.trim();
        if requester_id.is_empty() || target.is_empty() || redirect_url.is_empty() {
            return Err(AuthzError::MissingParameter);
        }

        let redirect = Url::parse(redirect_url).map_err(|_| AuthzError::InvalidRedirect)?;
        if !matches!(redirect.scheme(), "http" | "https") {
            return Err(AuthzError::InvalidRedirect);
        }

        let target = SitePermission::parse(target).map_err(AuthzError::InvalidTarget)?;

        let admission =
            self.limiter
                .check(requester_id, OperationClass::Authorize, self.authorize_limits);
        if !admission.is_allowed() {
            let retry_after_secs = admission.retry_after_secs();
            self.audit.record(
                client.stamp(
                    AuditEvent::new(AuditEventType::AuthDenied)
                        .with_user(requester_id)
                        .with_site(target.as_str())
                        .with_details(json!({ "retry_after_secs": retry_after_secs }))
                        .failed("Rate limited"),
                ),
            );
            return Err(AuthzError::RateLimited { retry_after_secs });
        }

        let principal = match self.fresh_principal(requester_id).await {
            Ok(Some(principal)) => principal,
            Ok(None) => {
                self.audit.record(
                    client.stamp(
                        AuditEvent::new(AuditEventType::AuthDenied)
                            .with_user(requester_id)
                            .with_site(target.as_str())
                            .failed(DENY_UNKNOWN_USER),
                    ),
                );
                return Ok(Decision::Denied {
                    redirect_url: catalog::DEFAULT_LANDING.to_string(),
                    reason: DENY_UNKNOWN_USER.to_string(),
                });
            }
            Err(detail) => {
                tracing::error!(
                    user_id = %requester_id,
                    error = %detail,
                    "principal store unavailable during authorize"
                );
                self.audit.record(
                    client.stamp(
                        AuditEvent::new(AuditEventType::SystemError)
                            .with_user(requester_id)
                            .with_site(target.as_str())
                            .with_details(json!({ "error": detail }))
                            .failed(DENY_SYSTEM_ERROR),
                    ),
                );
                // Fail secure: generic reason, default landing, no token.
                return Ok(Decision::Denied {
                    redirect_url: catalog::DEFAULT_LANDING.to_string(),
                    reason: DENY_SYSTEM_ERROR.to_string(),
                });
            }
        };

        let effective = principal.effective_permissions();
        let authorized = principal.role == Role::SuperAdmin
            || effective.contains(target.as_str())
            || (effective.contains(catalog::ALL_SITES)
                && catalog::universal_covers(target.as_str()));

        let token = self.codec.mint(&principal.user_id, principal.role);

        if authorized {
            let destination = with_token(redirect, &token);
            self.audit.record(
                client.stamp(
                    AuditEvent::new(AuditEventType::AuthGranted)
                        .with_user(&principal.user_id)
                        .with_site(target.as_str()),
                ),
            );
            Ok(Decision::Granted {
                redirect_url: destination,
                role: principal.role,
            })
        } else {
            let reason = format!("Insufficient permissions for {}", target.as_str());
            let fallback = match Url::parse(catalog::landing_url(principal.role)) {
                Ok(url) => with_token(url, &token),
                Err(_) => catalog::landing_url(principal.role).to_string(),
            };
            self.audit.record(
                client.stamp(
                    AuditEvent::new(AuditEventType::AuthDenied)
                        .with_user(&principal.user_id)
                        .with_site(target.as_str())
                        .failed(reason.clone()),
                ),
            );
            Ok(Decision::Denied {
                redirect_url: fallback,
                reason,
            })
        }
    }

    async fn fresh_principal(&self, user_id: &str) -> Result<Option<Principal>, String> {
        fetch_fresh(self.store.as_ref(), self.principal_timeout, user_id).await
    }
}

/// Fresh store read bounded by a timeout. The error carries internal detail
/// for the audit trail and logs only, never for callers.
pub(crate) async fn fetch_fresh(
    store: &dyn PrincipalStore,
    timeout: Duration,
    user_id: &str,
) -> Result<Option<Principal>, String> {
    match tokio::time::timeout(timeout, store.fetch(user_id)).await {
        Ok(Ok(principal)) => Ok(principal),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("principal read timed out after {timeout:?}")),
    }
}

fn with_token(mut url: Url, token: &str) -> String {
    url.query_pairs_mut().append_pair(AUTH_TOKEN_PARAM, token);
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::audit::MemoryAuditSink;
    use crate::storage::principals::MemoryPrincipalStore;

    const REDIRECT: &str = "https://sso.example.com/callback";

    struct Harness {
        engine: AuthorizationEngine,
        store: Arc<MemoryPrincipalStore>,
        sink: Arc<MemoryAuditSink>,
    }

    fn harness() -> Harness {
        harness_with_limits(ClassLimits::new(100, Duration::from_secs(60)))
    }

    fn harness_with_limits(limits: ClassLimits) -> Harness {
        let store = Arc::new(MemoryPrincipalStore::new());
        let sink = Arc::new(MemoryAuditSink::new());
        let engine = AuthorizationEngine::new(
            store.clone(),
            Arc::new(TokenCodec::new("engine-test-secret")),
            Arc::new(RateLimiter::new()),
            sink.clone(),
            limits,
            Duration::from_millis(500),
        );
        Harness {
            engine,
            store,
            sink,
        }
    }

    async fn seed(store: &MemoryPrincipalStore, user_id: &str, role: Role, grants: &[&str]) {
        let permissions = grants
            .iter()
            .map(|g| SitePermission::parse(g).unwrap())
            .collect();
        let principal = Principal::new(user_id, format!("{user_id}@example.com"))
            .with_role(role)
            .with_permissions(permissions);
        store.upsert(&principal).await.unwrap();
    }

    #[tokio::test]
    async fn missing_parameters_fail_fast() {
        let h = harness();
        let meta = ClientMeta::default();

        for (user, target, redirect) in [
            ("", "standard_sites", REDIRECT),
            ("user-1", "  ", REDIRECT),
            ("user-1", "standard_sites", ""),
        ] {
            let err = h
                .engine
                .authorize(user, target, redirect, &meta)
                .await
                .unwrap_err();
            assert_eq!(err, AuthzError::MissingParameter);
        }
        // Nothing reached the audit trail.
        assert!(h.sink.recorded().is_empty());
    }

    #[tokio::test]
    async fn redirect_must_be_absolute_http_url() {
        let h = harness();
        let meta = ClientMeta::default();

        for redirect in ["/relative/path", "not a url", "ftp://files.example.com"] {
            let err = h
                .engine
                .authorize("user-1", "standard_sites", redirect, &meta)
                .await
                .unwrap_err();
            assert_eq!(err, AuthzError::InvalidRedirect);
        }
    }

    #[tokio::test]
    async fn script_targets_are_rejected() {
        let h = harness();
        let err = h
            .engine
            .authorize(
                "user-1",
                "javascript:alert(1)",
                REDIRECT,
                &ClientMeta::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::InvalidTarget(_)));
    }

    #[tokio::test]
    async fn standard_role_enters_standard_sites() {
        let h = harness();
        seed(&h.store, "user-1", Role::Standard, &[]).await;

        let decision = h
            .engine
            .authorize(
                "user-1",
                "standard_sites",
                "https://sso.example.com/callback?next=/home",
                &ClientMeta::default(),
            )
            .await
            .unwrap();

        match decision {
            Decision::Granted { redirect_url, role } => {
                assert_eq!(role, Role::Standard);
                assert!(redirect_url.starts_with("https://sso.example.com/callback?"));
                // Existing query parameters survive the token append.
                assert!(redirect_url.contains("next=/home"));
                assert!(redirect_url.contains("auth_token="));
            }
            other => panic!("expected grant, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn standard_role_cannot_enter_premium_sites() {
        let h = harness();
        seed(&h.store, "user-1", Role::Standard, &[]).await;

        let decision = h
            .engine
            .authorize("user-1", "premium_sites", REDIRECT, &ClientMeta::default())
            .await
            .unwrap();

        match decision {
            Decision::Denied {
                redirect_url,
                reason,
            } => {
                assert!(reason.contains("Insufficient permissions"));
                assert!(reason.contains("premium_sites"));
                // Fallback is the role's own landing page, token attached.
                assert!(redirect_url.starts_with("https://standard.nitroauth.app/"));
                assert!(redirect_url.contains("auth_token="));
            }
            other => panic!("expected denial, got {other:?}"),
        }

        let events = h.sink.recorded();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, AuditEventType::AuthDenied);
        assert!(!events[0].success);
    }

    #[tokio::test]
    async fn guest_with_explicit_url_grant() {
        let h = harness();
        seed(
            &h.store,
            "guest-1",
            Role::Guest,
            &["https://partner.example.com"],
        )
        .await;

        let granted = h
            .engine
            .authorize(
                "guest-1",
                "https://partner.example.com",
                REDIRECT,
                &ClientMeta::default(),
            )
            .await
            .unwrap();
        assert!(granted.is_granted());

        // The grant covers exactly that target, nothing else.
        let denied = h
            .engine
            .authorize("guest-1", "standard_sites", REDIRECT, &ClientMeta::default())
            .await
            .unwrap();
        assert!(!denied.is_granted());
    }

    #[tokio::test]
    async fn guest_without_grants_is_denied_everywhere() {
        let h = harness();
        seed(&h.store, "guest-1", Role::Guest, &[]).await;

        for target in ["standard_sites", "premium_sites", "admin_panel", "reports"] {
            let decision = h
                .engine
                .authorize("guest-1", target, REDIRECT, &ClientMeta::default())
                .await
                .unwrap();
            assert!(!decision.is_granted(), "guest should be denied {target}");
        }
    }

    #[tokio::test]
    async fn super_admin_covers_everything() {
        let h = harness();
        seed(&h.store, "root-1", Role::SuperAdmin, &[]).await;

        for target in [
            "standard_sites",
            "admin_panel",
            "https://anything.example.com",
            "some_internal_tool",
        ] {
            let decision = h
                .engine
                .authorize("root-1", target, REDIRECT, &ClientMeta::default())
                .await
                .unwrap();
            assert!(decision.is_granted(), "super admin denied {target}");
        }
    }

    #[tokio::test]
    async fn all_sites_marker_does_not_open_the_admin_panel() {
        let h = harness();
        seed(&h.store, "power-1", Role::Premium, &["all_sites"]).await;

        let site = h
            .engine
            .authorize(
                "power-1",
                "https://partner.example.com",
                REDIRECT,
                &ClientMeta::default(),
            )
            .await
            .unwrap();
        assert!(site.is_granted());

        let panel = h
            .engine
            .authorize("power-1", "admin_panel", REDIRECT, &ClientMeta::default())
            .await
            .unwrap();
        assert!(!panel.is_granted());
    }

    #[tokio::test]
    async fn unknown_user_lands_on_the_default_page_without_a_token() {
        let h = harness();

        let decision = h
            .engine
            .authorize("nobody", "standard_sites", REDIRECT, &ClientMeta::default())
            .await
            .unwrap();

        match decision {
            Decision::Denied {
                redirect_url,
                reason,
            } => {
                assert_eq!(reason, DENY_UNKNOWN_USER);
                assert_eq!(redirect_url, catalog::DEFAULT_LANDING);
                assert!(!redirect_url.contains("auth_token"));
            }
            other => panic!("expected denial, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn store_failure_is_fail_secure() {
        let h = harness();
        seed(&h.store, "user-1", Role::SuperAdmin, &[]).await;
        h.store.set_failing(true);

        let decision = h
            .engine
            .authorize("user-1", "standard_sites", REDIRECT, &ClientMeta::default())
            .await
            .unwrap();

        match decision {
            Decision::Denied {
                redirect_url,
                reason,
            } => {
                // Generic reason only; internals stay in the audit trail.
                assert_eq!(reason, DENY_SYSTEM_ERROR);
                assert_eq!(redirect_url, catalog::DEFAULT_LANDING);
                assert!(!redirect_url.contains("auth_token"));
            }
            other => panic!("expected fail-secure denial, got {other:?}"),
        }

        let events = h.sink.recorded();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, AuditEventType::SystemError);
        let details = events[0].details.as_ref().unwrap();
        assert!(details["error"].as_str().unwrap().contains("injected"));
    }

    #[tokio::test]
    async fn audit_failure_never_changes_the_answer() {
        let h = harness();
        seed(&h.store, "user-1", Role::Premium, &[]).await;
        h.sink.set_failing(true);

        let decision = h
            .engine
            .authorize("user-1", "premium_sites", REDIRECT, &ClientMeta::default())
            .await
            .unwrap();
        assert!(decision.is_granted());
    }

    #[tokio::test]
    async fn rate_limit_applies_per_requester() {
        let h = harness_with_limits(ClassLimits::new(1, Duration::from_secs(3600)));
        seed(&h.store, "user-1", Role::Standard, &[]).await;
        seed(&h.store, "user-2", Role::Standard, &[]).await;

        let first = h
            .engine
            .authorize("user-1", "standard_sites", REDIRECT, &ClientMeta::default())
            .await;
        assert!(first.is_ok());

        let second = h
            .engine
            .authorize("user-1", "standard_sites", REDIRECT, &ClientMeta::default())
            .await
            .unwrap_err();
        match second {
            AuthzError::RateLimited { retry_after_secs } => {
                assert!(retry_after_secs >= 1);
            }
            other => panic!("expected rate limit, got {other:?}"),
        }

        // A different requester has an independent window.
        assert!(h
            .engine
            .authorize("user-2", "standard_sites", REDIRECT, &ClientMeta::default())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn grant_is_audited_with_client_metadata() {
        let h = harness();
        seed(&h.store, "user-1", Role::Standard, &[]).await;
        let meta = ClientMeta {
            ip: Some("203.0.113.9".to_string()),
            user_agent: Some("sso-gateway/2.1".to_string()),
        };

        h.engine
            .authorize("user-1", "standard_sites", REDIRECT, &meta)
            .await
            .unwrap();

        let events = h.sink.recorded();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, AuditEventType::AuthGranted);
        assert_eq!(events[0].ip_address.as_deref(), Some("203.0.113.9"));
        assert_eq!(events[0].user_agent.as_deref(), Some("sso-gateway/2.1"));
        assert_eq!(events[0].site.as_deref(), Some("standard_sites"));
    }

    #[tokio::test]
    async fn minted_token_verifies_and_names_the_requester() {
        let h = harness();
        seed(&h.store, "user-1", Role::Premium, &[]).await;

        let decision = h
            .engine
            .authorize("user-1", "premium_sites", REDIRECT, &ClientMeta::default())
            .await
            .unwrap();

        let url = Url::parse(decision.redirect_url()).unwrap();
        let (_, token) = url
            .query_pairs()
            .find(|(k, _)| k == AUTH_TOKEN_PARAM)
            .expect("token parameter present");

        let codec = TokenCodec::new("engine-test-secret");
        let claims = codec.verify(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.role, Role::Premium);
    }
}
