//! Credentials and backend identifiers

use std::fmt;

use serde::{Deserialize, Serialize};

/// One API access token with its priority rank.
///
/// The rank is the position in the configured list (0 = tried first).
/// The secret is never printed by `Debug` or `Display`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    secret: String,
    rank: usize,
}

impl Credential {
    pub fn new(secret: impl Into<String>, rank: usize) -> Self {
        Self {
            secret: secret.into(),
            rank,
        }
    }

    /// Rank an ordered list of secrets, highest priority first.
    ///
    /// Blank entries are dropped; ranks stay dense.
    pub fn ranked<I, S>(secrets: I) -> Vec<Credential>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        secrets
            .into_iter()
            .map(Into::into)
            .filter(|s: &String| !s.trim().is_empty())
            .enumerate()
            .map(|(rank, secret)| Credential::new(secret.trim(), rank))
            .collect()
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn rank(&self) -> usize {
        self.rank
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("rank", &self.rank)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "credential #{}", self.rank)
    }
}

/// Identifier of a hosted model, e.g. `gemini-2.5-flash`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendId(String);

impl BackendId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BackendId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for BackendId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One (credential, backend) candidate pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendTarget {
    pub credential: Credential,
    pub backend: BackendId,
}

impl BackendTarget {
    pub fn new(credential: Credential, backend: impl Into<BackendId>) -> Self {
        Self {
            credential,
            backend: backend.into(),
        }
    }
}

impl fmt::Display for BackendTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} via {}", self.backend, self.credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_shows_secret() {
        let cred = Credential::new("AIza-very-secret", 0);
        let printed = format!("{cred:?} {cred}");
        assert!(!printed.contains("very-secret"));
        assert!(printed.contains("redacted"));
    }

    #[test]
    fn ranked_keeps_order_and_skips_blanks() {
        let creds = Credential::ranked(["first", "  ", "second "]);
        assert_eq!(creds.len(), 2);
        assert_eq!(creds[0].secret(), "first");
        assert_eq!(creds[0].rank(), 0);
        assert_eq!(creds[1].secret(), "second");
        assert_eq!(creds[1].rank(), 1);
    }

    #[test]
    fn target_display_names_model_and_rank() {
        let target = BackendTarget::new(Credential::new("k", 2), "gemini-2.5-flash");
        assert_eq!(target.to_string(), "gemini-2.5-flash via credential #2");
    }
}
