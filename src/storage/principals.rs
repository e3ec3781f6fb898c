// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Principal records and the permission store.
//!
//! A [`Principal`] is a user as the broker knows them: current role plus the
//! explicit site grants layered on top of the role defaults. The
//! [`PrincipalStore`] trait is the seam the authorization engine and
//! validation service are built against; the redb implementation is the
//! production default, the in-memory one backs tests and development and can
//! inject failures so the fail-secure paths stay testable.
//!
//! Every decision re-reads the principal through this interface. Token
//! claims are never the source of role or permission answers.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::db::{BrokerDb, StoreError, StoreResult, PRINCIPALS};
use crate::auth::{catalog, Role, SitePermission};

// =============================================================================
// Principal
// =============================================================================

/// A user's durable authorization state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Principal {
    /// Canonical user ID (assigned by the identity provider).
    pub user_id: String,
    /// Contact email, carried through to validation responses.
    pub email: String,
    /// Optional profile fields, display only.
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Current role.
    pub role: Role,
    /// Explicit grants beyond the role defaults.
    pub permissions: Vec<SitePermission>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Principal {
    /// Fresh principal with the least-privilege role and no grants.
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            email: email.into(),
            first_name: None,
            last_name: None,
            role: Role::Guest,
            permissions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_permissions(mut self, permissions: Vec<SitePermission>) -> Self {
        self.permissions = permissions;
        self
    }

    /// Union of the role's catalog defaults and the explicit grants.
    ///
    /// This set is what authorization decisions are made against. Duplicates
    /// between defaults and grants collapse.
    pub fn effective_permissions(&self) -> HashSet<String> {
        let mut set: HashSet<String> = catalog::default_permissions(self.role)
            .iter()
            .map(|p| p.to_string())
            .collect();
        set.extend(self.permissions.iter().map(|p| p.as_str().to_string()));
        set
    }
}

// =============================================================================
// PermissionStore trait
// =============================================================================

/// Durable per-user role and grant state.
///
/// Reads may hit arbitrary-latency backends, so callers wrap `fetch` in a
/// timeout and treat any `Err` as a fail-secure denial.
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    /// Fresh read of the principal's current state.
    async fn fetch(&self, user_id: &str) -> StoreResult<Option<Principal>>;

    /// Insert or replace a principal record.
    async fn upsert(&self, principal: &Principal) -> StoreResult<()>;

    /// Change a principal's role. Returns the updated record.
    async fn set_role(&self, user_id: &str, role: Role) -> StoreResult<Principal>;

    /// Replace a principal's explicit grants wholesale. Returns the updated
    /// record.
    async fn set_permissions(
        &self,
        user_id: &str,
        permissions: &[SitePermission],
    ) -> StoreResult<Principal>;

    /// Number of principals currently holding exactly `role`.
    async fn count_role(&self, role: Role) -> StoreResult<usize>;
}

// =============================================================================
// In-memory implementation (tests, development)
// =============================================================================

/// `RwLock<HashMap>`-backed store for tests and development mode.
pub struct MemoryPrincipalStore {
    principals: RwLock<HashMap<String, Principal>>,
    failing: AtomicBool,
}

impl MemoryPrincipalStore {
    pub fn new() -> Self {
        Self {
            principals: RwLock::new(HashMap::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// Make every subsequent call fail with `StoreError::Unavailable`.
    ///
    /// Lets tests drive the engine's upstream-failure paths.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }
}

impl Default for MemoryPrincipalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PrincipalStore for MemoryPrincipalStore {
    async fn fetch(&self, user_id: &str) -> StoreResult<Option<Principal>> {
        self.check_available()?;
        Ok(self.principals.read().await.get(user_id).cloned())
    }

    async fn upsert(&self, principal: &Principal) -> StoreResult<()> {
        self.check_available()?;
        self.principals
            .write()
            .await
            .insert(principal.user_id.clone(), principal.clone());
        Ok(())
    }

    async fn set_role(&self, user_id: &str, role: Role) -> StoreResult<Principal> {
        self.check_available()?;
        let mut principals = self.principals.write().await;
        let principal = principals
            .get_mut(user_id)
            .ok_or_else(|| StoreError::NotFound(format!("principal {user_id}")))?;
        principal.role = role;
        principal.updated_at = Utc::now();
        Ok(principal.clone())
    }

    async fn set_permissions(
        &self,
        user_id: &str,
        permissions: &[SitePermission],
    ) -> StoreResult<Principal> {
        self.check_available()?;
        let mut principals = self.principals.write().await;
        let principal = principals
            .get_mut(user_id)
            .ok_or_else(|| StoreError::NotFound(format!("principal {user_id}")))?;
        principal.permissions = permissions.to_vec();
        principal.updated_at = Utc::now();
        Ok(principal.clone())
    }

    async fn count_role(&self, role: Role) -> StoreResult<usize> {
        self.check_available()?;
        Ok(self
            .principals
            .read()
            .await
            .values()
            .filter(|p| p.role == role)
            .count())
    }
}

// =============================================================================
// redb implementation (production)
// =============================================================================

/// Durable store over the shared broker database.
pub struct RedbPrincipalStore {
    db: Arc<BrokerDb>,
}

impl RedbPrincipalStore {
    pub fn new(db: Arc<BrokerDb>) -> Self {
        Self { db }
    }

    fn read_principal(&self, user_id: &str) -> StoreResult<Option<Principal>> {
        let read_txn = self.db.db.begin_read()?;
        let table = read_txn.open_table(PRINCIPALS)?;
        match table.get(user_id)? {
            Some(value) => {
                let principal: Principal = serde_json::from_slice(value.value())?;
                Ok(Some(principal))
            }
            None => Ok(None),
        }
    }

    fn write_principal(&self, principal: &Principal) -> StoreResult<()> {
        let json = serde_json::to_vec(principal)?;
        let write_txn = self.db.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PRINCIPALS)?;
            table.insert(principal.user_id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Read-modify-write inside a single write transaction.
    fn mutate_principal<F>(&self, user_id: &str, apply: F) -> StoreResult<Principal>
    where
        F: FnOnce(&mut Principal),
    {
        let write_txn = self.db.db.begin_write()?;
        let updated = {
            let mut table = write_txn.open_table(PRINCIPALS)?;

            let existing_bytes = {
                let existing = table
                    .get(user_id)?
                    .ok_or_else(|| StoreError::NotFound(format!("principal {user_id}")))?;
                existing.value().to_vec()
            };

            let mut principal: Principal = serde_json::from_slice(&existing_bytes)?;
            apply(&mut principal);
            principal.updated_at = Utc::now();

            let json = serde_json::to_vec(&principal)?;
            table.insert(user_id, json.as_slice())?;
            principal
        };
        write_txn.commit()?;
        Ok(updated)
    }
}

#[async_trait]
impl PrincipalStore for RedbPrincipalStore {
    async fn fetch(&self, user_id: &str) -> StoreResult<Option<Principal>> {
        self.read_principal(user_id)
    }

    async fn upsert(&self, principal: &Principal) -> StoreResult<()> {
        self.write_principal(principal)
    }

    async fn set_role(&self, user_id: &str, role: Role) -> StoreResult<Principal> {
        self.mutate_principal(user_id, |principal| principal.role = role)
    }

    async fn set_permissions(
        &self,
        user_id: &str,
        permissions: &[SitePermission],
    ) -> StoreResult<Principal> {
        let permissions = permissions.to_vec();
        self.mutate_principal(user_id, move |principal| {
            principal.permissions = permissions;
        })
    }

    async fn count_role(&self, role: Role) -> StoreResult<usize> {
        let read_txn = self.db.db.begin_read()?;
        let table = read_txn.open_table(PRINCIPALS)?;
        let mut count = 0usize;
        for entry in table.iter()? {
            let (_, value) = entry?;
            let principal: Principal = serde_json::from_slice(value.value())?;
            if principal.role == role {
                count += 1;
            }
        }
        Ok(count)
    }
}
