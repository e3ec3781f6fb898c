// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{AuthorizationEngine, TokenCodec, ValidationService};
use crate::config::Config;
use crate::ratelimit::RateLimiter;
use crate::storage::{
    AuditLog, AuditSink, BrokerDb, PrincipalStore, RedbPrincipalStore, StoreResult,
    ValidationCache,
};

/// Shared application state, cloned per request by Axum.
///
/// Everything lives behind an `Arc` so handlers, extractors, and background
/// tasks see the same limiter windows, cache, and database handles.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<BrokerDb>,
    pub store: Arc<dyn PrincipalStore>,
    pub codec: Arc<TokenCodec>,
    pub limiter: Arc<RateLimiter>,
    pub audit_log: Arc<AuditLog>,
    pub engine: Arc<AuthorizationEngine>,
    pub validator: Arc<ValidationService>,
}

impl AppState {
    /// Build the full service graph: open the database, then wire the
    /// principal store, token codec, rate limiter, audit log, and the two
    /// decision services on top of it.
    pub fn new(config: Config) -> StoreResult<Self> {
        let db = Arc::new(BrokerDb::open(&config.data_dir.join("broker.redb"))?);

        let store: Arc<dyn PrincipalStore> = Arc::new(RedbPrincipalStore::new(db.clone()));
        let codec = Arc::new(TokenCodec::new(config.token_secret.clone()));
        let limiter = Arc::new(RateLimiter::new());
        let audit_log = Arc::new(AuditLog::new(db.clone()));
        let audit: Arc<dyn AuditSink> = audit_log.clone();
        let cache = Arc::new(ValidationCache::new());

        let engine = Arc::new(AuthorizationEngine::new(
            store.clone(),
            codec.clone(),
            limiter.clone(),
            audit.clone(),
            config.authorize_limits,
            config.principal_timeout,
        ));
        let validator = Arc::new(ValidationService::new(
            store.clone(),
            codec.clone(),
            limiter.clone(),
            audit,
            cache,
            config.validate_limits,
            config.principal_timeout,
        ));

        Ok(Self {
            config: Arc::new(config),
            db,
            store,
            codec,
            limiter,
            audit_log,
            engine,
            validator,
        })
    }
}
