// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authorization Module
//!
//! Everything that decides things lives here: the role model, permission
//! grammar and catalog, the token codec, the authorization engine, token
//! validation, and the axum extractors the HTTP layer authenticates with.
//!
//! ## Decision Flow
//!
//! 1. The identity provider authenticates a user and calls `/v1/authorize`
//! 2. The engine rate-checks, re-reads the principal, and decides against
//!    the effective permission set (role defaults plus explicit grants)
//! 3. Every answer is a redirect: granted requests carry a one-hour
//!    HMAC-signed token in the `auth_token` query parameter, denials land
//!    on the role's fallback page
//! 4. Satellite applications hand tokens back to `/v1/validate` (or the
//!    cached `/v1/validate/quick`) and receive the *current* stored state
//!
//! ## Security
//!
//! - Tokens prove identity, never privilege: role and permissions are
//!   re-read from the store on every decision
//! - Upstream failures deny with a generic reason and no token
//! - Unknown role strings normalize down to `Guest`, never up

pub mod catalog;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod permissions;
pub mod roles;
pub mod token;
pub mod validation;

pub use engine::{AuthorizationEngine, AuthzError, ClientMeta, Decision};
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth, AuthenticatedUser};
pub use permissions::{PermissionError, SitePermission};
pub use roles::Role;
pub use token::{TokenClaims, TokenCodec, TokenError};
pub use validation::{QuickOutcome, ValidatedUser, ValidationOutcome, ValidationService};
