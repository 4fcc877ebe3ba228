//! Remote URL helpers for [`AdapterMeta`]
//!
//! GitHub: `https://{host}/{owner}/{repo}`, options `host`, `owner`, `repo`.
//! GitLab: `https://{host}/{namespace…}/{project}`, options `host`, `project`.

use crate::error::SyncError;
use crate::index::AdapterMeta;
use crate::types::RemoteType;
use std::collections::BTreeMap;
use url::Url;

/// Build the canonical URL for a remote from its options
pub fn build_url(remote_type: RemoteType, opts: &BTreeMap<String, String>) -> Result<String, SyncError> {
    let host = opts
        .get("host")
        .map(String::as_str)
        .unwrap_or(remote_type.default_host());
    let path = match remote_type {
        RemoteType::Github => {
            let owner = required(opts, "owner")?;
            let repo = required(opts, "repo")?;
            format!("{}/{}", owner, repo)
        }
        RemoteType::Gitlab => required(opts, "project")?.trim_matches('/').to_string(),
    };
    Ok(format!("https://{}/{}", host, path))
}

fn required<'a>(opts: &'a BTreeMap<String, String>, key: &str) -> Result<&'a str, SyncError> {
    opts.get(key)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| SyncError::InvalidInput(format!("Missing remote option '{}'", key)))
}

impl AdapterMeta {
    pub fn github(owner: &str, repo: &str, branch: &str) -> Self {
        let mut opts = BTreeMap::new();
        opts.insert("owner".to_string(), owner.to_string());
        opts.insert("repo".to_string(), repo.to_string());
        let url = format!("https://github.com/{}/{}", owner, repo);
        Self {
            remote_type: RemoteType::Github,
            url,
            branch: branch.to_string(),
            token: None,
            opts,
        }
    }

    pub fn gitlab(project: &str, branch: &str) -> Self {
        let project = project.trim_matches('/');
        let mut opts = BTreeMap::new();
        opts.insert("project".to_string(), project.to_string());
        let url = format!("https://gitlab.com/{}", project);
        Self {
            remote_type: RemoteType::Gitlab,
            url,
            branch: branch.to_string(),
            token: None,
            opts,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Canonical display URL built from the options
    pub fn canonical_url(&self) -> Result<String, SyncError> {
        build_url(self.remote_type, &self.opts)
    }

    /// Parse a repository URL into adapter options
    ///
    /// The platform is inferred from the host name. `.git` suffixes and trailing browse paths
    /// (`/tree/...` on GitHub, `/-/...` on GitLab) are ignored.
    pub fn from_url(raw: &str, branch: &str) -> Result<Self, SyncError> {
        let parsed = Url::parse(raw)
            .map_err(|e| SyncError::InvalidInput(format!("Malformed remote URL '{}': {}", raw, e)))?;
        if parsed.scheme() != "https" && parsed.scheme() != "http" {
            return Err(SyncError::InvalidInput(format!(
                "Unsupported URL scheme '{}'",
                parsed.scheme()
            )));
        }
        let host = parsed
            .host_str()
            .ok_or_else(|| SyncError::InvalidInput(format!("Remote URL has no host: {}", raw)))?
            .to_string();

        let remote_type = if host.contains("github") {
            RemoteType::Github
        } else if host.contains("gitlab") {
            RemoteType::Gitlab
        } else {
            return Err(SyncError::InvalidInput(format!(
                "Cannot infer remote type from host '{}'",
                host
            )));
        };

        let segments: Vec<String> = parsed
            .path_segments()
            .map(|s| {
                s.filter(|seg| !seg.is_empty())
                    .take_while(|seg| *seg != "-")
                    .map(|seg| seg.trim_end_matches(".git").to_string())
                    .collect()
            })
            .unwrap_or_default();
        if segments.len() < 2 {
            return Err(SyncError::InvalidInput(format!(
                "Remote URL must name a repository: {}",
                raw
            )));
        }

        let mut opts = BTreeMap::new();
        if host != remote_type.default_host() {
            opts.insert("host".to_string(), host);
        }
        match remote_type {
            RemoteType::Github => {
                opts.insert("owner".to_string(), segments[0].clone());
                opts.insert("repo".to_string(), segments[1].clone());
            }
            RemoteType::Gitlab => {
                opts.insert("project".to_string(), segments.join("/"));
            }
        }

        let url = build_url(remote_type, &opts)?;
        Ok(Self {
            remote_type,
            url,
            branch: branch.to_string(),
            token: None,
            opts,
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.branch.trim().is_empty() {
            return Err("Branch cannot be empty".to_string());
        }
        self.canonical_url().map(|_| ()).map_err(|e| e.to_string())
    }
}
