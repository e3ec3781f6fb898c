// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Satellite site registry.
//!
//! Admins register the applications the broker brokers access to. The
//! registry feeds the grant picker in the console; the authorization
//! decision itself depends only on a principal's effective permission set,
//! so nothing here can widen an answer.
//!
//! Deletion is a soft-delete (`active = false`): history and audit
//! references stay intact, and the URL becomes available for registration
//! again. URL uniqueness is enforced among active sites via the `site_urls`
//! index table.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::db::{BrokerDb, StoreError, StoreResult, SITES, SITE_URLS};

/// Which tier a registered site belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SiteCategory {
    Standard,
    Premium,
    Admin,
}

/// A registered satellite application.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct Site {
    /// Unique identifier for this site.
    pub id: String,
    /// Human-readable name shown in the console.
    pub name: String,
    /// Entry URL (https, unique among active sites).
    pub url: String,
    /// Tier this site is bundled under.
    pub category: SiteCategory,
    /// False once soft-deleted.
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields an update may change.
#[derive(Debug, Default)]
pub struct SiteChanges {
    pub name: Option<String>,
    pub url: Option<String>,
    pub category: Option<SiteCategory>,
}

/// Repository for registered sites.
pub struct SiteRepository<'a> {
    db: &'a BrokerDb,
}

impl<'a> SiteRepository<'a> {
    pub fn new(db: &'a BrokerDb) -> Self {
        Self { db }
    }

    /// Register a new site. The URL must not be claimed by another active
    /// site.
    pub fn create(&self, name: &str, url: &str, category: SiteCategory) -> StoreResult<Site> {
        let now = Utc::now();
        let site = Site {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            url: url.to_string(),
            category,
            active: true,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_vec(&site)?;

        let write_txn = self.db.db.begin_write()?;
        {
            let mut url_index = write_txn.open_table(SITE_URLS)?;
            if url_index.get(url)?.is_some() {
                return Err(StoreError::AlreadyExists(format!("site URL {url}")));
            }
            url_index.insert(url, site.id.as_str())?;

            let mut sites = write_txn.open_table(SITES)?;
            sites.insert(site.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;

        Ok(site)
    }

    /// Look up a site by ID.
    pub fn get(&self, site_id: &str) -> StoreResult<Option<Site>> {
        let read_txn = self.db.db.begin_read()?;
        let table = read_txn.open_table(SITES)?;
        match table.get(site_id)? {
            Some(value) => {
                let site: Site = serde_json::from_slice(value.value())?;
                Ok(Some(site))
            }
            None => Ok(None),
        }
    }

    /// List sites, name-sorted. `include_inactive` adds soft-deleted ones.
    pub fn list(&self, include_inactive: bool) -> StoreResult<Vec<Site>> {
        let read_txn = self.db.db.begin_read()?;
        let table = read_txn.open_table(SITES)?;

        let mut sites = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let site: Site = serde_json::from_slice(value.value())?;
            if site.active || include_inactive {
                sites.push(site);
            }
        }
        sites.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(sites)
    }

    /// Apply changes to an existing site, keeping the URL index consistent.
    pub fn update(&self, site_id: &str, changes: SiteChanges) -> StoreResult<Site> {
        let write_txn = self.db.db.begin_write()?;
        let updated = {
            let mut sites = write_txn.open_table(SITES)?;

            let existing_bytes = {
                let existing = sites
                    .get(site_id)?
                    .ok_or_else(|| StoreError::NotFound(format!("site {site_id}")))?;
                existing.value().to_vec()
            };
            let mut site: Site = serde_json::from_slice(&existing_bytes)?;

            if let Some(new_url) = &changes.url {
                if *new_url != site.url {
                    let mut url_index = write_txn.open_table(SITE_URLS)?;
                    let claimed_by = url_index
                        .get(new_url.as_str())?
                        .map(|v| v.value().to_string());
                    if claimed_by.is_some_and(|id| id != site_id) {
                        return Err(StoreError::AlreadyExists(format!("site URL {new_url}")));
                    }
                    if site.active {
                        url_index.remove(site.url.as_str())?;
                        url_index.insert(new_url.as_str(), site_id)?;
                    }
                    site.url = new_url.clone();
                }
            }
            if let Some(name) = changes.name {
                site.name = name;
            }
            if let Some(category) = changes.category {
                site.category = category;
            }
            site.updated_at = Utc::now();

            let json = serde_json::to_vec(&site)?;
            sites.insert(site_id, json.as_slice())?;
            site
        };
        write_txn.commit()?;
        Ok(updated)
    }

    /// Soft-delete: mark inactive and release the URL for reuse.
    pub fn deactivate(&self, site_id: &str) -> StoreResult<Site> {
        let write_txn = self.db.db.begin_write()?;
        let updated = {
            let mut sites = write_txn.open_table(SITES)?;

            let existing_bytes = {
                let existing = sites
                    .get(site_id)?
                    .ok_or_else(|| StoreError::NotFound(format!("site {site_id}")))?;
                existing.value().to_vec()
            };
            let mut site: Site = serde_json::from_slice(&existing_bytes)?;

            if site.active {
                let mut url_index = write_txn.open_table(SITE_URLS)?;
                url_index.remove(site.url.as_str())?;
            }
            site.active = false;
            site.updated_at = Utc::now();

            let json = serde_json::to_vec(&site)?;
            sites.insert(site_id, json.as_slice())?;
            site
        };
        write_txn.commit()?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo_db() -> (BrokerDb, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = BrokerDb::open(&dir.path().join("broker.redb")).unwrap();
        (db, dir)
    }

    #[test]
    fn create_and_get_site() {
        let (db, _dir) = repo_db();
        let repo = SiteRepository::new(&db);

        let site = repo
            .create("Reports", "https://reports.example.com", SiteCategory::Standard)
            .unwrap();

        let fetched = repo.get(&site.id).unwrap().unwrap();
        assert_eq!(fetched, site);
        assert!(fetched.active);
    }

    #[test]
    fn duplicate_url_rejected_while_active() {
        let (db, _dir) = repo_db();
        let repo = SiteRepository::new(&db);

        repo.create("One", "https://app.example.com", SiteCategory::Standard)
            .unwrap();

        let err = repo
            .create("Two", "https://app.example.com", SiteCategory::Premium)
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[test]
    fn deactivate_frees_the_url() {
        let (db, _dir) = repo_db();
        let repo = SiteRepository::new(&db);

        let site = repo
            .create("One", "https://app.example.com", SiteCategory::Standard)
            .unwrap();
        let deleted = repo.deactivate(&site.id).unwrap();
        assert!(!deleted.active);

        // The URL can be registered again.
        assert!(repo
            .create("Two", "https://app.example.com", SiteCategory::Standard)
            .is_ok());
    }

    #[test]
    fn list_filters_inactive_by_default() {
        let (db, _dir) = repo_db();
        let repo = SiteRepository::new(&db);

        let a = repo
            .create("Alpha", "https://a.example.com", SiteCategory::Standard)
            .unwrap();
        repo.create("Beta", "https://b.example.com", SiteCategory::Premium)
            .unwrap();
        repo.deactivate(&a.id).unwrap();

        let active = repo.list(false).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Beta");

        let all = repo.list(true).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn update_changes_fields_and_keeps_uniqueness() {
        let (db, _dir) = repo_db();
        let repo = SiteRepository::new(&db);

        let a = repo
            .create("Alpha", "https://a.example.com", SiteCategory::Standard)
            .unwrap();
        repo.create("Beta", "https://b.example.com", SiteCategory::Standard)
            .unwrap();

        // Renaming and re-tiering works.
        let updated = repo
            .update(
                &a.id,
                SiteChanges {
                    name: Some("Alpha Prime".to_string()),
                    category: Some(SiteCategory::Premium),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.name, "Alpha Prime");
        assert_eq!(updated.category, SiteCategory::Premium);

        // Stealing another active site's URL does not.
        let err = repo
            .update(
                &a.id,
                SiteChanges {
                    url: Some("https://b.example.com".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));

        // Moving to a fresh URL releases the old one.
        repo.update(
            &a.id,
            SiteChanges {
                url: Some("https://alpha.example.com".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(repo
            .create("Gamma", "https://a.example.com", SiteCategory::Standard)
            .is_ok());
    }

    #[test]
    fn update_missing_site_is_not_found() {
        let (db, _dir) = repo_db();
        let repo = SiteRepository::new(&db);
        let err = repo.update("ghost", SiteChanges::default()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
