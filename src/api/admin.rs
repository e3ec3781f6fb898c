// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-only API endpoints for principal and system management.
//!
//! These endpoints require the Admin role (bootstrap excepted) and provide:
//! - Role updates with demotion safety rails
//! - Wholesale permission grant replacement
//! - One-time super admin bootstrap
//! - Audit log queries

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::{AdminOnly, Auth, Role, SitePermission},
    error::ApiError,
    ratelimit::OperationClass,
    state::AppState,
    storage::{AuditEvent, AuditEventType, AuditSink, Principal, PrincipalStore},
};

use super::client_meta;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to change a principal's role.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateRoleRequest {
    /// The role to assign.
    pub role: Role,
}

/// Request to replace a principal's explicit permission grants.
///
/// The stored set is replaced wholesale; grants are state, not deltas.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdatePermissionsRequest {
    /// The complete new grant list.
    pub permissions: Vec<String>,
}

/// Admin view of a principal after a mutation.
#[derive(Debug, Serialize, ToSchema)]
pub struct AdminUserResponse {
    /// The principal's stable ID.
    pub user_id: String,
    /// The principal's email address.
    pub email: String,
    /// Current role.
    pub role: Role,
    /// Explicit grants (role defaults not included).
    pub permissions: Vec<String>,
    /// When the principal was last updated.
    pub updated_at: String,
}

impl From<Principal> for AdminUserResponse {
    fn from(principal: Principal) -> Self {
        let permissions = principal
            .permissions
            .iter()
            .map(|grant| grant.as_str().to_string())
            .collect();
        Self {
            user_id: principal.user_id,
            email: principal.email,
            role: principal.role,
            permissions,
            updated_at: principal.updated_at.to_rfc3339(),
        }
    }
}

/// Response for the one-time super admin bootstrap.
#[derive(Debug, Serialize, ToSchema)]
pub struct SetupSuperAdminResponse {
    /// The promoted principal.
    pub user_id: String,
    /// Always `super_admin` on success.
    pub role: Role,
    /// Human-readable confirmation.
    pub message: String,
}

/// Query parameters for audit log queries.
#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditQueryParams {
    /// Start date (YYYY-MM-DD format).
    pub start_date: Option<String>,
    /// End date (YYYY-MM-DD format).
    pub end_date: Option<String>,
    /// Filter by acting user ID.
    pub user_id: Option<String>,
    /// Filter by event type.
    pub event_type: Option<String>,
    /// Maximum number of results (default 100).
    pub limit: Option<usize>,
    /// Offset for pagination.
    pub offset: Option<usize>,
}

/// Response for audit log queries.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogResponse {
    /// Audit events matching the query, oldest first.
    pub events: Vec<AuditEvent>,
    /// Total count (before limit/offset).
    pub total: usize,
    /// Whether there are more results.
    pub has_more: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// Change a principal's role.
///
/// Safety rails, checked in order: admins cannot modify themselves, only a
/// super admin can mint another super admin, the last super admin cannot be
/// demoted, and a target above the actor's own role is untouchable.
#[utoipa::path(
    put,
    path = "/v1/admin/users/{user_id}/role",
    tag = "Admin",
    params(
        ("user_id" = String, Path, description = "Principal to modify")
    ),
    request_body = UpdateRoleRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Role updated", body = AdminUserResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized for this change"),
        (status = 404, description = "Target not found"),
        (status = 409, description = "Would remove the last super admin")
    )
)]
pub async fn update_role(
    AdminOnly(actor): AdminOnly,
    Path(user_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<UpdateRoleRequest>,
) -> Result<Json<AdminUserResponse>, ApiError> {
    if actor.user_id == user_id {
        return Err(ApiError::forbidden("Cannot change your own role"));
    }
    if request.role == Role::SuperAdmin && actor.role != Role::SuperAdmin {
        return Err(ApiError::forbidden(
            "Only a super admin can create another super admin",
        ));
    }

    let target = state
        .store
        .fetch(&user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if target.role == Role::SuperAdmin && request.role < Role::SuperAdmin {
        let super_admins = state.store.count_role(Role::SuperAdmin).await?;
        if super_admins <= 1 {
            return Err(ApiError::conflict("Cannot demote the last super admin"));
        }
    }
    if target.role > actor.role {
        return Err(ApiError::forbidden(
            "Cannot modify a user with a higher role",
        ));
    }

    let old_role = target.role;
    let updated = state.store.set_role(&user_id, request.role).await?;

    let client = client_meta(&headers);
    state.audit_log.record(
        client.stamp(
            AuditEvent::new(AuditEventType::RoleUpdated)
                .with_user(&actor.user_id)
                .with_target_user(&user_id)
                .with_details(json!({
                    "old_role": old_role,
                    "new_role": request.role,
                })),
        ),
    );

    Ok(Json(updated.into()))
}

/// Replace a principal's explicit permission grants.
///
/// Every entry must pass target validation; one bad entry rejects the whole
/// request, naming the offender.
#[utoipa::path(
    put,
    path = "/v1/admin/users/{user_id}/permissions",
    tag = "Admin",
    params(
        ("user_id" = String, Path, description = "Principal to modify")
    ),
    request_body = UpdatePermissionsRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Grants replaced", body = AdminUserResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)"),
        (status = 404, description = "Target not found"),
        (status = 422, description = "A grant entry failed validation")
    )
)]
pub async fn update_permissions(
    AdminOnly(actor): AdminOnly,
    Path(user_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<UpdatePermissionsRequest>,
) -> Result<Json<AdminUserResponse>, ApiError> {
    let mut grants = Vec::with_capacity(request.permissions.len());
    for entry in &request.permissions {
        let grant = SitePermission::parse(entry)
            .map_err(|e| ApiError::unprocessable(format!("Invalid permission {entry:?}: {e}")))?;
        grants.push(grant);
    }

    let updated = state.store.set_permissions(&user_id, &grants).await?;

    let client = client_meta(&headers);
    state.audit_log.record(
        client.stamp(
            AuditEvent::new(AuditEventType::PermissionsUpdated)
                .with_user(&actor.user_id)
                .with_target_user(&user_id)
                .with_details(json!({ "grant_count": grants.len() })),
        ),
    );

    Ok(Json(updated.into()))
}

/// One-time super admin bootstrap.
///
/// Promotes the *acting* principal the first time it is ever called;
/// permanently disabled once any super admin exists. Gated by the strictest
/// rate class, keyed by client IP, before any store read. Every outcome is
/// audited with full request metadata.
#[utoipa::path(
    post,
    path = "/v1/admin/setup-super-admin",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller promoted", body = SetupSuperAdminResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Bootstrap already completed"),
        (status = 429, description = "Rate limited")
    )
)]
pub async fn setup_super_admin(
    Auth(actor): Auth,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SetupSuperAdminResponse>, ApiError> {
    let client = client_meta(&headers);
    let rate_key = client.ip.clone().unwrap_or_else(|| "unknown".to_string());

    let decision = state.limiter.check(
        &rate_key,
        OperationClass::AdminSetup,
        state.config.setup_limits,
    );
    if !decision.is_allowed() {
        state.audit_log.record(
            client.stamp(
                AuditEvent::new(AuditEventType::SuperAdminSetup)
                    .with_user(&actor.user_id)
                    .with_details(json!({ "outcome": "rate_limited" }))
                    .failed("Rate limited"),
            ),
        );
        return Err(ApiError::too_many_requests(
            "Too many requests",
            decision.retry_after_secs(),
        ));
    }

    let super_admins = match state.store.count_role(Role::SuperAdmin).await {
        Ok(count) => count,
        Err(e) => {
            state.audit_log.record(
                client.stamp(
                    AuditEvent::new(AuditEventType::SuperAdminSetup)
                        .with_user(&actor.user_id)
                        .with_details(json!({ "outcome": "store_failure" }))
                        .failed(e.to_string()),
                ),
            );
            return Err(e.into());
        }
    };
    if super_admins > 0 {
        state.audit_log.record(
            client.stamp(
                AuditEvent::new(AuditEventType::SuperAdminSetup)
                    .with_user(&actor.user_id)
                    .with_details(json!({ "outcome": "disabled" }))
                    .failed("Super admin setup is disabled"),
            ),
        );
        return Err(ApiError::forbidden("Super admin setup is disabled"));
    }

    let updated = state.store.set_role(&actor.user_id, Role::SuperAdmin).await?;

    state.audit_log.record(
        client.stamp(
            AuditEvent::new(AuditEventType::SuperAdminSetup)
                .with_user(&actor.user_id)
                .with_details(json!({ "outcome": "promoted" })),
        ),
    );

    Ok(Json(SetupSuperAdminResponse {
        user_id: updated.user_id,
        role: updated.role,
        message: "Super admin created".to_string(),
    }))
}

/// Query audit logs.
///
/// Search and filter audit log entries. Supports date range, user ID, and
/// event type filtering with limit/offset pagination. Admin only.
#[utoipa::path(
    get,
    path = "/v1/admin/audit/events",
    tag = "Admin",
    params(AuditQueryParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Audit events", body = AuditLogResponse),
        (status = 400, description = "Invalid query parameters"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn query_audit_events(
    AdminOnly(_actor): AdminOnly,
    Query(params): Query<AuditQueryParams>,
    State(state): State<AppState>,
) -> Result<Json<AuditLogResponse>, ApiError> {
    // Default date range: today only
    let today = Utc::now().format("%Y-%m-%d").to_string();
    let start_date = params.start_date.as_deref().unwrap_or(&today);
    let end_date = params.end_date.as_deref().unwrap_or(&today);

    let start = NaiveDate::parse_from_str(start_date, "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request("Invalid start_date format. Use YYYY-MM-DD."))?;
    let end = NaiveDate::parse_from_str(end_date, "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request("Invalid end_date format. Use YYYY-MM-DD."))?;

    let start_at = Utc.from_utc_datetime(&start.and_time(NaiveTime::MIN));
    let end_at = end
        .succ_opt()
        .map(|next| {
            Utc.from_utc_datetime(&next.and_time(NaiveTime::MIN))
                - chrono::Duration::milliseconds(1)
        })
        .ok_or_else(|| ApiError::bad_request("end_date out of range"))?;

    let mut events = state.audit_log.read_range(Some(start_at), Some(end_at))?;

    if let Some(user_id) = &params.user_id {
        events.retain(|e| e.user_id.as_deref() == Some(user_id.as_str()));
    }

    if let Some(event_type) = &params.event_type {
        events.retain(|e| {
            let type_str = serde_json::to_string(&e.event_type)
                .unwrap_or_default()
                .trim_matches('"')
                .to_string();
            type_str == *event_type
        });
    }

    let total = events.len();
    let limit = params.limit.unwrap_or(100).min(1000); // Max 1000
    let offset = params.offset.unwrap_or(0);

    let has_more = offset + limit < total;
    let events: Vec<AuditEvent> = events.into_iter().skip(offset).take(limit).collect();

    Ok(Json(AuditLogResponse {
        events,
        total,
        has_more,
    }))
}

// ============================================================================
// Tests
// ============================================================================
