// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Broker Storage Module
//!
//! Persistent state lives in a single embedded [redb](https://docs.rs/redb)
//! database under the data directory. Redb gives us ACID single-file
//! storage with typed tables and no external service to run, which suits a
//! broker that must answer authorization questions even when the rest of
//! the platform is degraded.
//!
//! ## Storage Layout
//!
//! ```text
//! {data_dir}/broker.redb
//!   principals  user_id        -> Principal JSON
//!   sites       site_id        -> Site JSON
//!   site_urls   url            -> site_id   (active sites only)
//!   audit       ts_be|event_id -> AuditEvent JSON
//! ```
//!
//! ## Important Notes
//!
//! - All mutations are read-modify-write inside one write transaction
//! - The audit table is append-only; nothing ever updates or deletes rows
//! - The validation cache is process-local and deliberately not persisted

pub mod audit;
pub mod cache;
pub mod db;
pub mod principals;
pub mod sites;

pub use audit::{AuditEvent, AuditEventType, AuditLog, AuditSink};
pub use cache::{CachedValidation, ValidationCache};
pub use db::{BrokerDb, StoreError, StoreResult};
pub use principals::{MemoryPrincipalStore, Principal, PrincipalStore, RedbPrincipalStore};
pub use sites::{Site, SiteCategory, SiteChanges, SiteRepository};
