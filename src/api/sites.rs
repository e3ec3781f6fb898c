// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Site registry endpoints.
//!
//! The registry is the admin-facing catalog of known targets. It feeds the
//! grant picker; access decisions depend only on the principal's effective
//! permission set, so nothing here can widen a decision.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::{AdminOnly, SitePermission},
    error::ApiError,
    state::AppState,
    storage::{
        AuditEvent, AuditEventType, AuditSink, Site, SiteCategory, SiteChanges, SiteRepository,
    },
};

use super::client_meta;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to register a site.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateSiteRequest {
    /// Display name for the site.
    pub name: String,
    /// Canonical `https` URL; unique among active sites.
    pub url: String,
    /// Access tier the site belongs to.
    pub category: SiteCategory,
}

/// Request to update a registered site. Absent fields are left unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateSiteRequest {
    /// New display name.
    pub name: Option<String>,
    /// New canonical URL (same validation as creation).
    pub url: Option<String>,
    /// New access tier.
    pub category: Option<SiteCategory>,
}

/// Query parameters for listing sites.
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListSitesParams {
    /// Include soft-deleted sites (default false).
    pub include_inactive: Option<bool>,
}

const MAX_SITE_NAME_LEN: usize = 128;

/// Site names and URLs follow the same rules as permission targets, with
/// the extra requirement that the URL actually is one.
fn validate_site_fields(name: &str, url: &str) -> Result<(), ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("Site name is required"));
    }
    if name.len() > MAX_SITE_NAME_LEN {
        return Err(ApiError::unprocessable("Site name is too long"));
    }
    match SitePermission::parse(url) {
        Ok(target) if target.as_str().starts_with("https://") => Ok(()),
        Ok(_) => Err(ApiError::unprocessable("Site URL must be an https URL")),
        Err(e) => Err(ApiError::unprocessable(format!("Invalid site URL: {e}"))),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Register a new site.
#[utoipa::path(
    post,
    path = "/v1/admin/sites",
    tag = "Sites",
    request_body = CreateSiteRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Site registered", body = Site),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)"),
        (status = 409, description = "URL already registered"),
        (status = 422, description = "Name or URL failed validation")
    )
)]
pub async fn create_site(
    AdminOnly(actor): AdminOnly,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateSiteRequest>,
) -> Result<(StatusCode, Json<Site>), ApiError> {
    validate_site_fields(&request.name, &request.url)?;

    let repo = SiteRepository::new(&state.db);
    let site = repo.create(request.name.trim(), &request.url, request.category)?;

    let client = client_meta(&headers);
    state.audit_log.record(
        client.stamp(
            AuditEvent::new(AuditEventType::SiteCreated)
                .with_user(&actor.user_id)
                .with_site(&site.id)
                .with_details(json!({ "name": site.name, "url": site.url })),
        ),
    );

    Ok((StatusCode::CREATED, Json(site)))
}

/// List registered sites.
#[utoipa::path(
    get,
    path = "/v1/admin/sites",
    tag = "Sites",
    params(ListSitesParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Registered sites", body = [Site]),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn list_sites(
    AdminOnly(_actor): AdminOnly,
    Query(params): Query<ListSitesParams>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Site>>, ApiError> {
    let repo = SiteRepository::new(&state.db);
    Ok(Json(repo.list(params.include_inactive.unwrap_or(false))?))
}

/// Update a registered site.
#[utoipa::path(
    put,
    path = "/v1/admin/sites/{site_id}",
    tag = "Sites",
    params(
        ("site_id" = String, Path, description = "Site to update")
    ),
    request_body = UpdateSiteRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Site updated", body = Site),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)"),
        (status = 404, description = "Site not found"),
        (status = 409, description = "URL already registered"),
        (status = 422, description = "Name or URL failed validation")
    )
)]
pub async fn update_site(
    AdminOnly(actor): AdminOnly,
    Path(site_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<UpdateSiteRequest>,
) -> Result<Json<Site>, ApiError> {
    if let Some(name) = &request.name {
        if name.trim().is_empty() {
            return Err(ApiError::bad_request("Site name is required"));
        }
        if name.trim().len() > MAX_SITE_NAME_LEN {
            return Err(ApiError::unprocessable("Site name is too long"));
        }
    }
    if let Some(url) = &request.url {
        match SitePermission::parse(url) {
            Ok(target) if target.as_str().starts_with("https://") => {}
            Ok(_) => return Err(ApiError::unprocessable("Site URL must be an https URL")),
            Err(e) => {
                return Err(ApiError::unprocessable(format!("Invalid site URL: {e}")));
            }
        }
    }

    let repo = SiteRepository::new(&state.db);
    let site = repo.update(
        &site_id,
        SiteChanges {
            name: request.name.map(|n| n.trim().to_string()),
            url: request.url,
            category: request.category,
        },
    )?;

    let client = client_meta(&headers);
    state.audit_log.record(
        client.stamp(
            AuditEvent::new(AuditEventType::SiteUpdated)
                .with_user(&actor.user_id)
                .with_site(&site.id)
                .with_details(json!({ "name": site.name, "url": site.url })),
        ),
    );

    Ok(Json(site))
}

/// Soft-delete a registered site.
///
/// The site is marked inactive and its URL becomes available again; the
/// row survives for the audit trail.
#[utoipa::path(
    delete,
    path = "/v1/admin/sites/{site_id}",
    tag = "Sites",
    params(
        ("site_id" = String, Path, description = "Site to deactivate")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Site deactivated"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)"),
        (status = 404, description = "Site not found")
    )
)]
pub async fn delete_site(
    AdminOnly(actor): AdminOnly,
    Path(site_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let repo = SiteRepository::new(&state.db);
    let site = repo.deactivate(&site_id)?;

    let client = client_meta(&headers);
    state.audit_log.record(
        client.stamp(
            AuditEvent::new(AuditEventType::SiteDeleted)
                .with_user(&actor.user_id)
                .with_site(&site.id)
                .with_details(json!({ "name": site.name, "url": site.url })),
        ),
    );

    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Tests
// ============================================================================
