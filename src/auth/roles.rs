// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User roles for authorization.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// User roles, ordered from least to most privileged.
///
/// ## Role Hierarchy
///
/// - `Guest` - Authenticated but not yet provisioned; no default site access
/// - `Standard` - Normal user, standard site tier
/// - `Premium` - Standard tier plus premium sites
/// - `Admin` - Site and user administration
/// - `SuperAdmin` - Unrestricted; can appoint other admins
///
/// The declaration order is the privilege order, so `Ord` comparisons are
/// privilege comparisons: `Role::Admin >= Role::Standard` holds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Authenticated, nothing granted yet
    Guest,
    /// Normal user (standard sites)
    Standard,
    /// Paying user (standard + premium sites)
    Premium,
    /// Administrator (site/user management)
    Admin,
    /// Unrestricted administrator
    SuperAdmin,
}

impl Role {
    /// Check if this role has at least the privileges of the required role.
    pub fn has_privilege(&self, required: Role) -> bool {
        *self >= required
    }

    /// Check if this role may use the admin surface.
    pub fn is_admin(&self) -> bool {
        *self >= Role::Admin
    }

    /// Parse a role from string (case-insensitive).
    ///
    /// Unrecognized or empty input normalizes to `Guest`; stored role
    /// strings from older deployments must never escalate privilege.
    pub fn parse(s: &str) -> Role {
        match s.trim().to_lowercase().as_str() {
            "standard" => Role::Standard,
            "premium" => Role::Premium,
            "admin" => Role::Admin,
            "super_admin" | "superadmin" => Role::SuperAdmin,
            _ => Role::Guest,
        }
    }
}

impl Default for Role {
    /// Default role is Guest (least privilege for authenticated users).
    fn default() -> Self {
        Role::Guest
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Guest => write!(f, "guest"),
            Role::Standard => write!(f, "standard"),
            Role::Premium => write!(f, "premium"),
            Role::Admin => write!(f, "admin"),
            Role::SuperAdmin => write!(f, "super_admin"),
        }
    }
}
