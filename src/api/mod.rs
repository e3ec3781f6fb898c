// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP surface: routing, middleware, and the OpenAPI document.

use axum::{
    http::{header, HeaderMap, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{ClientMeta, Role},
    config::Config,
    models::{
        AuthorizeRequest, AuthorizeResponse, QuickValidateResponse, ValidateRequest,
        ValidateResponse, ValidatedUserInfo,
    },
    state::AppState,
    storage::{AuditEvent, AuditEventType, Site, SiteCategory},
};

pub mod admin;
pub mod authorize;
pub mod health;
pub mod sites;
pub mod users;
pub mod validate;

/// Client metadata for rate limiting and the audit trail.
///
/// The broker runs behind a reverse proxy, so the client address comes from
/// `X-Forwarded-For` (first hop) rather than the socket peer.
pub(crate) fn client_meta(headers: &HeaderMap) -> ClientMeta {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|hop| hop.trim().to_string())
        .filter(|hop| !hop.is_empty());
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    ClientMeta { ip, user_agent }
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.cors_allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    let v1_routes = Router::new()
        .route("/authorize", post(authorize::authorize))
        .route("/validate", post(validate::validate))
        .route("/validate/quick", get(validate::validate_quick))
        .route("/users/me", get(users::get_current_user))
        .route("/admin/users/{user_id}/role", put(admin::update_role))
        .route(
            "/admin/users/{user_id}/permissions",
            put(admin::update_permissions),
        )
        .route("/admin/setup-super-admin", post(admin::setup_super_admin))
        .route("/admin/audit/events", get(admin::query_audit_events))
        .route(
            "/admin/sites",
            get(sites::list_sites).post(sites::create_site),
        )
        .route(
            "/admin/sites/{site_id}",
            put(sites::update_site).delete(sites::delete_site),
        )
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .nest("/v1", v1_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(cors)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        authorize::authorize,
        validate::validate,
        validate::validate_quick,
        users::get_current_user,
        admin::update_role,
        admin::update_permissions,
        admin::setup_super_admin,
        admin::query_audit_events,
        sites::create_site,
        sites::list_sites,
        sites::update_site,
        sites::delete_site,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            Role,
            AuthorizeRequest,
            AuthorizeResponse,
            ValidateRequest,
            ValidateResponse,
            ValidatedUserInfo,
            QuickValidateResponse,
            users::UserMeResponse,
            admin::UpdateRoleRequest,
            admin::UpdatePermissionsRequest,
            admin::AdminUserResponse,
            admin::SetupSuperAdminResponse,
            admin::AuditLogResponse,
            AuditEvent,
            AuditEventType,
            Site,
            SiteCategory,
            sites::CreateSiteRequest,
            sites::UpdateSiteRequest,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Decisions", description = "Authorization and token validation"),
        (name = "Users", description = "Current principal"),
        (name = "Admin", description = "Principal management, bootstrap, audit"),
        (name = "Sites", description = "Site registry management"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let dir = TempDir::new().expect("tempdir");
        let state = AppState::new(Config::for_tests(dir.path())).expect("state");
        let app = router(state);
        // Ensure the router can be converted into a service without panicking.
        let _ = app.into_make_service();
    }

    #[test]
    fn client_meta_takes_the_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        headers.insert(header::USER_AGENT, "sat-app/1.2".parse().unwrap());

        let meta = client_meta(&headers);
        assert_eq!(meta.ip.as_deref(), Some("203.0.113.7"));
        assert_eq!(meta.user_agent.as_deref(), Some("sat-app/1.2"));
    }

    #[test]
    fn client_meta_handles_missing_headers() {
        let meta = client_meta(&HeaderMap::new());
        assert_eq!(meta.ip, None);
        assert_eq!(meta.user_agent, None);
    }
}
