// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Broker token codec.
//!
//! Tokens are a shared-secret scheme, deliberately not a federation
//! protocol: `base64url(claims JSON) . base64url(HMAC-SHA256(secret, first
//! part))`, URL-safe alphabet, no padding, so the whole thing survives being
//! a query parameter.
//!
//! Claims carry the subject, the role *at mint time*, and the issue/expiry
//! instants in epoch milliseconds. Lifetime is fixed at one hour. The role
//! claim is a snapshot for display only; every authorization-relevant path
//! re-reads the principal instead of trusting it.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::roles::Role;

type HmacSha256 = Hmac<Sha256>;

/// Fixed token lifetime: one hour.
pub const TOKEN_TTL_MS: i64 = 3_600_000;

/// Tolerated clock skew for future-dated `iat` (60 seconds).
const CLOCK_SKEW_LEEWAY_MS: i64 = 60_000;

/// Claims embedded in a broker token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Role snapshot at mint time
    pub role: Role,
    /// Issued at (epoch millis)
    pub iat: i64,
    /// Expires at (epoch millis)
    pub exp: i64,
}

/// Token verification failure.
///
/// `Expired` is deliberately distinct from the other variants: callers
/// surface "come back and sign in again" differently from "this token was
/// never ours".
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,
}

/// Current time in epoch milliseconds.
fn now_epoch_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Mints and verifies broker tokens with a shared secret.
pub struct TokenCodec {
    secret: Vec<u8>,
}

impl TokenCodec {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Mint a token for `subject_id` carrying the given role snapshot.
    pub fn mint(&self, subject_id: &str, role: Role) -> String {
        self.mint_at(subject_id, role, now_epoch_millis())
    }

    /// Mint with an explicit issue instant. Expiry is always `iat + 1h`.
    pub(crate) fn mint_at(&self, subject_id: &str, role: Role, iat: i64) -> String {
        let claims = TokenClaims {
            sub: subject_id.to_string(),
            role,
            iat,
            exp: iat + TOKEN_TTL_MS,
        };
        // TokenClaims has no non-serializable fields, so this cannot fail.
        let json = serde_json::to_vec(&claims).unwrap_or_default();
        let payload = Base64UrlUnpadded::encode_string(&json);
        let sig = self.sign(payload.as_bytes());
        format!("{payload}.{sig}")
    }

    fn sign(&self, payload: &[u8]) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length");
        mac.update(payload);
        Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes())
    }

    /// Verify a token: structure, then signature, then expiry.
    ///
    /// Expiry is checked against both the `exp` claim and `iat + 1h`, so a
    /// token never outlives an hour even if its `exp` was minted wrong.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let (payload, sig) = token.split_once('.').ok_or(TokenError::Malformed)?;
        if payload.is_empty() || sig.is_empty() || sig.contains('.') {
            return Err(TokenError::Malformed);
        }

        let sig_bytes =
            Base64UrlUnpadded::decode_vec(sig).map_err(|_| TokenError::Malformed)?;

        // Constant-time comparison via hmac's verify_slice.
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length");
        mac.update(payload.as_bytes());
        mac.verify_slice(&sig_bytes)
            .map_err(|_| TokenError::InvalidSignature)?;

        let claims = decode_claims(payload).ok_or(TokenError::Malformed)?;

        let now = now_epoch_millis();
        if claims.iat > now + CLOCK_SKEW_LEEWAY_MS {
            return Err(TokenError::Malformed);
        }
        if now >= claims.exp || now - claims.iat >= TOKEN_TTL_MS {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

fn decode_claims(payload: &str) -> Option<TokenClaims> {
    let json = Base64UrlUnpadded::decode_vec(payload).ok()?;
    serde_json::from_slice(&json).ok()
}

/// Cheap expiry pre-check without signature verification.
///
/// Anything undecodable counts as expired; callers use this to short-cut
/// the common "stale token" case before paying for verification, and an
/// unreadable token must never pass a gate a stale one would fail.
pub fn is_expired(token: &str) -> bool {
    let Some((payload, _sig)) = token.split_once('.') else {
        return true;
    };
    let Some(claims) = decode_claims(payload) else {
        return true;
    };
    let now = now_epoch_millis();
    now >= claims.exp || now - claims.iat >= TOKEN_TTL_MS
}
