// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Short-lived cache for lightweight token checks.
//!
//! The quick validation endpoint trades freshness for latency: a token
//! that validated successfully is remembered for a short TTL so embedded
//! widgets can poll without hammering the principal store. Full validation
//! never consults this cache, so anything security-sensitive always sees
//! the live record. A role change can therefore take up to the TTL to be
//! reflected in quick checks.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::auth::roles::Role;

/// Maximum number of tokens remembered at once.
const CACHE_SIZE: usize = 1024;

/// How long a successful validation stays fresh.
const CACHE_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct CacheEntry {
    user_id: String,
    role: Role,
    cached_at: Instant,
}

/// A cached validation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedValidation {
    pub user_id: String,
    pub role: Role,
}

/// LRU cache of recently validated tokens.
///
/// Lock poisoning degrades to cache misses; the cache is an optimization
/// and must never take the service down with it.
pub struct ValidationCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
}

impl ValidationCache {
    pub fn new() -> Self {
        Self::with_capacity_and_ttl(CACHE_SIZE, CACHE_TTL)
    }

    fn with_capacity_and_ttl(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Look up a token, dropping the entry if it has gone stale.
    pub fn get(&self, token: &str) -> Option<CachedValidation> {
        let mut entries = self.entries.lock().ok()?;
        let entry = entries.get(token)?;
        if entry.cached_at.elapsed() > self.ttl {
            entries.pop(token);
            return None;
        }
        Some(CachedValidation {
            user_id: entry.user_id.clone(),
            role: entry.role,
        })
    }

    /// Remember a successful validation.
    pub fn insert(&self, token: String, user_id: String, role: Role) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(
                token,
                CacheEntry {
                    user_id,
                    role,
                    cached_at: Instant::now(),
                },
            );
        }
    }

    /// Number of live entries, stale or not.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ValidationCache {
    fn default() -> Self {
        Self::new()
    }
}
