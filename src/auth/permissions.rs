// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Site permission identifiers.
//!
//! A [`SitePermission`] names a destination a principal may be granted:
//! a catalog permission (`standard_sites`), a bare application name
//! (`partner_dashboard`), or a full `https://` URL. The string is opaque to
//! the authorization decision (grants are matched by exact comparison) but
//! it is validated on the way in so nothing unprintable or script-shaped
//! ever lands in the store or in a redirect.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Longest accepted bare permission name.
const MAX_NAME_LEN: usize = 64;

/// Longest accepted URL-form permission.
const MAX_URL_LEN: usize = 2048;

/// Validation failure for a permission entry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PermissionError {
    #[error("permission entry is empty")]
    Empty,

    #[error("permission entry exceeds {0} characters")]
    TooLong(usize),

    #[error("permission entry contains forbidden characters")]
    ForbiddenCharacters,

    #[error("permission URLs must use https")]
    InsecureScheme,

    #[error("permission entry is not a valid URL: {0}")]
    MalformedUrl(String),

    #[error("permission entry is not a name or https URL")]
    InvalidFormat,
}

/// Validated permission identifier.
///
/// Construct via [`SitePermission::parse`]; values read back from the store
/// were validated when written.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
pub struct SitePermission(String);

impl SitePermission {
    /// Validate and wrap a permission entry.
    ///
    /// Accepted forms:
    /// - bare names: alphanumeric plus `_`/`-`, at most 64 chars
    ///   (covers every catalog permission);
    /// - full URLs: `https` only, at most 2048 chars, parseable.
    pub fn parse(input: &str) -> Result<SitePermission, PermissionError> {
        let value = input.trim();
        if value.is_empty() {
            return Err(PermissionError::Empty);
        }
        if value.len() > MAX_URL_LEN {
            return Err(PermissionError::TooLong(MAX_URL_LEN));
        }
        if value
            .chars()
            .any(|c| c.is_control() || matches!(c, '<' | '>' | '"' | '\'' | '`' | ' '))
        {
            return Err(PermissionError::ForbiddenCharacters);
        }

        if value.contains(':') {
            // URL form
            let parsed = url::Url::parse(value)
                .map_err(|e| PermissionError::MalformedUrl(e.to_string()))?;
            if parsed.scheme() != "https" {
                return Err(PermissionError::InsecureScheme);
            }
            return Ok(SitePermission(value.to_string()));
        }

        // Bare-name form
        if value.len() > MAX_NAME_LEN {
            return Err(PermissionError::TooLong(MAX_NAME_LEN));
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(PermissionError::InvalidFormat);
        }

        Ok(SitePermission(value.to_string()))
    }

    /// The permission string for comparisons and storage.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SitePermission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<SitePermission> for String {
    fn from(value: SitePermission) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_catalog_names() {
        for name in ["standard_sites", "premium_sites", "admin_panel", "all_sites"] {
            assert!(SitePermission::parse(name).is_ok(), "{name} should parse");
        }
    }

    #[test]
    fn accepts_bare_app_names() {
        assert!(SitePermission::parse("partner-dashboard").is_ok());
        assert!(SitePermission::parse("Reports2").is_ok());
    }

    #[test]
    fn accepts_https_urls() {
        let perm = SitePermission::parse("https://partner.example.com/app").unwrap();
        assert_eq!(perm.as_str(), "https://partner.example.com/app");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let perm = SitePermission::parse("  premium_sites  ").unwrap();
        assert_eq!(perm.as_str(), "premium_sites");
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(SitePermission::parse(""), Err(PermissionError::Empty));
        assert_eq!(SitePermission::parse("   "), Err(PermissionError::Empty));
    }

    #[test]
    fn rejects_plain_http() {
        assert_eq!(
            SitePermission::parse("http://partner.example.com"),
            Err(PermissionError::InsecureScheme)
        );
    }

    #[test]
    fn rejects_script_schemes() {
        assert_eq!(
            SitePermission::parse("javascript:alert(1)"),
            Err(PermissionError::InsecureScheme)
        );
        assert_eq!(
            SitePermission::parse("data:text/html;base64,xyz"),
            Err(PermissionError::InsecureScheme)
        );
    }

    #[test]
    fn rejects_markup_characters() {
        assert_eq!(
            SitePermission::parse("<script>bad</script>"),
            Err(PermissionError::ForbiddenCharacters)
        );
        assert_eq!(
            SitePermission::parse("https://example.com/\"onload"),
            Err(PermissionError::ForbiddenCharacters)
        );
    }

    #[test]
    fn rejects_oversize_entries() {
        let long_name = "a".repeat(MAX_NAME_LEN + 1);
        assert_eq!(
            SitePermission::parse(&long_name),
            Err(PermissionError::TooLong(MAX_NAME_LEN))
        );

        let long_url = format!("https://example.com/{}", "a".repeat(MAX_URL_LEN));
        assert_eq!(
            SitePermission::parse(&long_url),
            Err(PermissionError::TooLong(MAX_URL_LEN))
        );
    }

    #[test]
    fn rejects_odd_punctuation_in_names() {
        assert!(SitePermission::parse("partner.example.com").is_err());
        assert!(SitePermission::parse("name with space").is_err());
    }

    #[test]
    fn serializes_transparently() {
        let perm = SitePermission::parse("premium_sites").unwrap();
        let json = serde_json::to_string(&perm).unwrap();
        assert_eq!(json, r#""premium_sites""#);

        let back: SitePermission = serde_json::from_str(&json).unwrap();
        assert_eq!(back, perm);
    }
}
