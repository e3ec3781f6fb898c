// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role/permission catalog.
//!
//! Pure data: which permissions each role carries by default, the canonical
//! destination for each catalog permission, and the landing page a role falls
//! back to when a request is denied. No I/O; everything here is `const`.

use super::roles::Role;

// =============================================================================
// Catalog permission names
// =============================================================================

/// Standard-tier site bundle.
pub const STANDARD_SITES: &str = "standard_sites";

/// Premium-tier site bundle.
pub const PREMIUM_SITES: &str = "premium_sites";

/// The administration console.
pub const ADMIN_PANEL: &str = "admin_panel";

/// Universal marker: matches every site-class target.
///
/// `all_sites` is an independent set member; holding it does not rewrite
/// the effective set into the other catalog names. It matches any site
/// target (catalog bundles, bare app names, URL grants) but deliberately
/// never `admin_panel`: the console is gated by role, not by breadth of
/// site access.
pub const ALL_SITES: &str = "all_sites";

// =============================================================================
// Destinations
// =============================================================================

/// Landing page for principals with nothing better to offer.
pub const DEFAULT_LANDING: &str = "https://account.nitroauth.app/welcome";

const STANDARD_PORTAL: &str = "https://standard.nitroauth.app/";
const PREMIUM_PORTAL: &str = "https://premium.nitroauth.app/";
const ADMIN_CONSOLE: &str = "https://admin.nitroauth.app/";

/// Default permission set for a role.
pub fn default_permissions(role: Role) -> &'static [&'static str] {
    match role {
        Role::Guest => &[],
        Role::Standard => &[STANDARD_SITES],
        Role::Premium => &[STANDARD_SITES, PREMIUM_SITES],
        Role::Admin => &[STANDARD_SITES, PREMIUM_SITES, ADMIN_PANEL],
        Role::SuperAdmin => &[ALL_SITES, ADMIN_PANEL],
    }
}

/// Canonical destination URL for a catalog permission.
///
/// Returns `None` for `all_sites` (a marker, not a place) and for custom
/// grants, which carry their own destination.
pub fn canonical_url(permission: &str) -> Option<&'static str> {
    match permission {
        STANDARD_SITES => Some(STANDARD_PORTAL),
        PREMIUM_SITES => Some(PREMIUM_PORTAL),
        ADMIN_PANEL => Some(ADMIN_CONSOLE),
        _ => None,
    }
}

/// Fallback landing page for a role.
///
/// Denials redirect here instead of dead-ending; every role has one.
pub fn landing_url(role: Role) -> &'static str {
    match role {
        Role::Guest => DEFAULT_LANDING,
        Role::Standard => STANDARD_PORTAL,
        Role::Premium => PREMIUM_PORTAL,
        Role::Admin | Role::SuperAdmin => ADMIN_CONSOLE,
    }
}

/// Whether the universal marker applies to this target.
pub fn universal_covers(target: &str) -> bool {
    target != ADMIN_PANEL
}
