// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fixed-window rate limiting.
//!
//! Counters are keyed by `(identity, operation class)` so one client's
//! authorize traffic cannot starve another's validations. Each class carries
//! its own budget, passed in by the caller; the limiter itself holds no
//! configuration.
//!
//! State lives in a single `Mutex<HashMap<..>>` with short critical
//! sections; the lock is never held across I/O. Expired windows are swept by
//! [`RateLimiter::purge_expired`], which a background task runs on an
//! interval so idle identities don't accumulate forever.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Operation classes with independently configured budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationClass {
    /// Interactive authorization decisions
    Authorize,
    /// Token validation calls from satellite applications
    Validate,
    /// One-time super-admin bootstrap (the strictest class)
    AdminSetup,
}

impl OperationClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationClass::Authorize => "authorize",
            OperationClass::Validate => "validate",
            OperationClass::AdminSetup => "admin_setup",
        }
    }
}

/// Budget for one operation class.
#[derive(Debug, Clone, Copy)]
pub struct ClassLimits {
    /// Calls allowed per window.
    pub limit: u32,
    /// Window length.
    pub window: Duration,
}

impl ClassLimits {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }
}

/// Outcome of a rate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Counted against the window; `remaining` is what's left after this call.
    Allowed { remaining: u32, reset_at: Instant },
    /// Budget exhausted until `reset_at`.
    Denied { reset_at: Instant },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }

    /// Seconds until the window rolls over, floored at 1 (for `Retry-After`).
    pub fn retry_after_secs(&self) -> u64 {
        let reset_at = match self {
            RateDecision::Allowed { reset_at, .. } => *reset_at,
            RateDecision::Denied { reset_at } => *reset_at,
        };
        reset_at
            .saturating_duration_since(Instant::now())
            .as_secs()
            .max(1)
    }
}

struct Window {
    count: u32,
    reset_at: Instant,
}

/// Fixed-window counters shared across request handlers.
pub struct RateLimiter {
    windows: Mutex<HashMap<(String, OperationClass), Window>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Count one call against `(identity, class)` under the given budget.
    ///
    /// A fresh identity gets a new window starting now. When the current
    /// window has elapsed the counter resets before the call is counted.
    pub fn check(
        &self,
        identity: &str,
        class: OperationClass,
        limits: ClassLimits,
    ) -> RateDecision {
        let now = Instant::now();
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(_) => {
                // Fail open: availability over strictness, but make noise.
                tracing::error!(class = class.as_str(), "rate limiter lock poisoned");
                return RateDecision::Allowed {
                    remaining: 0,
                    reset_at: now,
                };
            }
        };

        let window = windows
            .entry((identity.to_string(), class))
            .or_insert_with(|| Window {
                count: 0,
                reset_at: now + limits.window,
            });

        if now >= window.reset_at {
            window.count = 0;
            window.reset_at = now + limits.window;
        }

        if window.count >= limits.limit {
            return RateDecision::Denied {
                reset_at: window.reset_at,
            };
        }

        window.count += 1;
        RateDecision::Allowed {
            remaining: limits.limit - window.count,
            reset_at: window.reset_at,
        }
    }

    /// Drop windows whose reset instant has passed. Returns how many were
    /// removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        match self.windows.lock() {
            Ok(mut windows) => {
                let before = windows.len();
                windows.retain(|_, window| window.reset_at > now);
                before - windows.len()
            }
            Err(_) => {
                tracing::error!("rate limiter lock poisoned during purge");
                0
            }
        }
    }

    /// Number of live windows (for the sweeper's log line).
    pub fn tracked_windows(&self) -> usize {
        self.windows.lock().map(|w| w.len()).unwrap_or(0)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
