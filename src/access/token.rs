//! Session token minting and structural classification.
//!
//! Tokens look like `dg.<tag>.<issued_at_ms>.<secret>`:
//! - `rot` tokens come from redeemed rotating codes and must exist in the store.
//! - `demo` tokens are static/local sessions for environments without a store.
//! - `test` tokens come from bypass codes.
//!
//! The kind is derived from the parsed tag, never from a substring match, and
//! anything that does not parse completely is rejected.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{fmt, str::FromStr};
use thiserror::Error;
use utoipa::ToSchema;

const TOKEN_PREFIX: &str = "dg";
const SECRET_LEN: usize = 32;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Issued after redeeming a rotating access code.
    Rotating,
    /// Local demo session that never touches the store.
    StaticDemo,
    /// Issued for a bypass code in non-production deployments.
    Test,
}

impl TokenKind {
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Rotating => "rot",
            Self::StaticDemo => "demo",
            Self::Test => "test",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "rot" => Some(Self::Rotating),
            "demo" => Some(Self::StaticDemo),
            "test" => Some(Self::Test),
            _ => None,
        }
    }

    /// Whether tokens of this kind are honored without a store lookup.
    #[must_use]
    pub const fn is_local(self) -> bool {
        matches!(self, Self::StaticDemo | Self::Test)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for TokenKind {
    type Err = TokenError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_tag(value).ok_or(TokenError::UnknownKind)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed session token")]
    Malformed,

    #[error("unknown session token kind")]
    UnknownKind,

    #[error("failed to generate session token")]
    Entropy,
}

#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    kind: TokenKind,
    issued_at_ms: i64,
    secret: [u8; SECRET_LEN],
}

impl SessionToken {
    /// Mint a fresh token of `kind` stamped with `now`.
    ///
    /// # Errors
    /// Returns [`TokenError::Entropy`] if the OS random source fails.
    pub fn mint(kind: TokenKind, now: DateTime<Utc>) -> Result<Self, TokenError> {
        let mut secret = [0u8; SECRET_LEN];
        OsRng
            .try_fill_bytes(&mut secret)
            .map_err(|_| TokenError::Entropy)?;
        Ok(Self {
            kind,
            issued_at_ms: now.timestamp_millis(),
            secret,
        })
    }

    /// Parse a presented token string.
    ///
    /// # Errors
    /// Returns an error unless the value has exactly the four expected parts.
    pub fn parse(value: &str) -> Result<Self, TokenError> {
        let mut parts = value.trim().split('.');
        let (Some(prefix), Some(tag), Some(issued), Some(secret), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return Err(TokenError::Malformed);
        };

        if prefix != TOKEN_PREFIX {
            return Err(TokenError::Malformed);
        }
        let kind = tag.parse::<TokenKind>()?;
        if issued.is_empty() || !issued.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TokenError::Malformed);
        }
        let issued_at_ms = issued.parse::<i64>().map_err(|_| TokenError::Malformed)?;

        let decoded = Base64UrlUnpadded::decode_vec(secret).map_err(|_| TokenError::Malformed)?;
        let secret: [u8; SECRET_LEN] = decoded.try_into().map_err(|_| TokenError::Malformed)?;

        Ok(Self {
            kind,
            issued_at_ms,
            secret,
        })
    }

    #[must_use]
    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    #[must_use]
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.issued_at_ms)
    }

    /// SHA-256 fingerprint used as the storage key; raw tokens never reach the store.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.to_string())
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{TOKEN_PREFIX}.{}.{}.{}",
            self.kind.tag(),
            self.issued_at_ms,
            Base64UrlUnpadded::encode_string(&self.secret)
        )
    }
}

// Keep the secret out of debug output and logs.
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("kind", &self.kind)
            .field("issued_at_ms", &self.issued_at_ms)
            .finish_non_exhaustive()
    }
}

/// Hash an arbitrary secret into the url-safe fingerprint format.
#[must_use]
pub fn fingerprint(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    Base64UrlUnpadded::encode_string(&hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn minted_tokens_parse_back_with_their_kind() -> Result<()> {
        let now = Utc::now();
        for kind in [TokenKind::Rotating, TokenKind::StaticDemo, TokenKind::Test] {
            let token = SessionToken::mint(kind, now)?;
            let parsed = SessionToken::parse(&token.to_string())?;
            assert_eq!(parsed.kind(), kind);
            assert_eq!(parsed, token);
            assert_eq!(
                parsed.issued_at().map(|at| at.timestamp_millis()),
                Some(now.timestamp_millis())
            );
        }
        Ok(())
    }

    #[test]
    fn tokens_are_unique() -> Result<()> {
        let now = Utc::now();
        let first = SessionToken::mint(TokenKind::Rotating, now)?;
        let second = SessionToken::mint(TokenKind::Rotating, now)?;
        assert_ne!(first.to_string(), second.to_string());
        assert_ne!(first.fingerprint(), second.fingerprint());
        Ok(())
    }

    #[test]
    fn substring_prefixes_are_not_tokens() {
        for value in [
            "",
            "TEST_1700000000_abc",
            "ROTATING_1700000000_abc",
            "dg.test",
            "dg.test.123",
            "dg.other.123.AAAA",
            "xx.test.123.AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
            "dg.test.-5.AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
            "dg.test.123.short",
            "dg.test.123.AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA.extra",
        ] {
            assert!(SessionToken::parse(value).is_err(), "accepted {value:?}");
        }
        assert_eq!(
            SessionToken::parse("dg.admin.1.AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"),
            Err(TokenError::UnknownKind)
        );
    }

    #[test]
    fn debug_output_hides_secret() -> Result<()> {
        let token = SessionToken::mint(TokenKind::Test, Utc::now())?;
        let rendered = token.to_string();
        let secret = rendered.rsplit('.').next().unwrap_or_default();
        assert!(!format!("{token:?}").contains(secret));
        Ok(())
    }

    #[test]
    fn fingerprint_is_stable() {
        assert_eq!(fingerprint("token"), fingerprint("token"));
        assert_ne!(fingerprint("token"), fingerprint("other"));
        assert_eq!(fingerprint("token").len(), 43);
    }
}
