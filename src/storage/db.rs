// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded broker database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `principals`: user_id → serialized Principal (JSON bytes)
//! - `sites`: site_id → serialized Site (JSON bytes)
//! - `site_urls`: normalized URL → site_id (uniqueness index, active sites only)
//! - `audit`: composite key (timestamp_be | event_id) → serialized AuditEvent

use std::path::Path;

use redb::{Database, TableDefinition};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: user_id → serialized Principal (JSON bytes).
pub(crate) const PRINCIPALS: TableDefinition<&str, &[u8]> = TableDefinition::new("principals");

/// Primary table: site_id → serialized Site (JSON bytes).
pub(crate) const SITES: TableDefinition<&str, &[u8]> = TableDefinition::new("sites");

/// Index: normalized site URL → site_id. Maintained for active sites only so
/// a soft-deleted site frees its URL.
pub(crate) const SITE_URLS: TableDefinition<&str, &str> = TableDefinition::new("site_urls");

/// Append-only audit log.
/// Key format: `timestamp_millis_be | event_id` for chronological range scans.
pub(crate) const AUDIT: TableDefinition<&[u8], &[u8]> = TableDefinition::new("audit");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// BrokerDb
// =============================================================================

/// Embedded ACID database shared by the principal, site, and audit stores.
pub struct BrokerDb {
    pub(crate) db: Database,
}

impl BrokerDb {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(PRINCIPALS)?;
            let _ = write_txn.open_table(SITES)?;
            let _ = write_txn.open_table(SITE_URLS)?;
            let _ = write_txn.open_table(AUDIT)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }
}
