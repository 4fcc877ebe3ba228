//! Shared primitive types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Hex-encoded object identifier: a git-style blob hash, a content hash, or a
/// remote ref value (commit sha). Remote heads are opaque, so this stays a string.
pub type Hash = String;

/// Hosting platform a replica is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteType {
    Github,
    Gitlab,
}

impl RemoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteType::Github => "github",
            RemoteType::Gitlab => "gitlab",
        }
    }

    pub fn default_host(&self) -> &'static str {
        match self {
            RemoteType::Github => "github.com",
            RemoteType::Gitlab => "gitlab.com",
        }
    }
}

impl fmt::Display for RemoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
