use std::fmt;

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The one prefix every canonical session id carries.
pub const PREFIX: &str = "win_";

const TOKEN_LEN: usize = 10;
const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Identifier of one tab's task record, always in canonical `win_<token>` form.
///
/// The only ways to obtain one are [`SessionId::parse`],
/// [`SessionId::canonicalize`] and [`SessionId::generate`], so every storage
/// key and URL value derived from a `SessionId` carries exactly one prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// Canonical form of `raw`, or `None` when it holds no token at all
    /// (empty, whitespace, or nothing but prefixes).
    ///
    /// Already-canonical input comes back unchanged. Input with the prefix
    /// applied more than once is folded to a single prefix and reported.
    pub fn parse(raw: &str) -> Option<SessionId> {
        let raw = raw.trim();
        let mut token = raw;
        let mut prefixes = 0;
        while let Some(rest) = token.strip_prefix(PREFIX) {
            token = rest.trim_start();
            prefixes += 1;
        }

        if prefixes > 1 {
            tracing::warn!(
                input = raw,
                "session id carries a repeated prefix, folding to a single prefix"
            );
        }

        if token.is_empty() {
            return None;
        }
        Some(SessionId(format!("{PREFIX}{token}")))
    }

    /// Canonical id for `raw`, minting a fresh one when `raw` is absent or empty.
    pub fn canonicalize(raw: Option<&str>) -> SessionId {
        raw.and_then(SessionId::parse)
            .unwrap_or_else(SessionId::generate)
    }

    /// Fresh random id. Collisions are not checked for.
    pub fn generate() -> SessionId {
        let mut rng = rand::rng();
        let token: String = (0..TOKEN_LEN)
            .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
            .collect();
        SessionId(format!("{PREFIX}{token}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id without its prefix.
    pub fn token(&self) -> &str {
        strip(&self.0)
    }
}

/// Remove exactly one leading prefix, if present.
///
/// The result is a bare token for display or diagnostics; turn it back into
/// an id with [`SessionId::parse`], never by concatenating the prefix by hand.
pub fn strip(raw: &str) -> &str {
    raw.strip_prefix(PREFIX).unwrap_or(raw)
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for SessionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        SessionId::parse(&raw).ok_or_else(|| serde::de::Error::custom("empty session id"))
    }
}
