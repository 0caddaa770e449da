//! Repository identity and the per-session editing context.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::manifest::DakMetadata;

/// Branch used when a repository is opened without an explicit branch.
pub const DEFAULT_BRANCH: &str = "main";

/// A guideline repository and the branch under edit.
///
/// Immutable for an editing session; switching branch produces a new
/// [`RepoContext`] and therefore a different staging area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DakRepository {
    pub owner: String,
    pub repo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dak_metadata: Option<DakMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_valid_dak: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_validated: Option<DateTime<Utc>>,
}

impl DakRepository {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            branch: None,
            dak_metadata: None,
            is_valid_dak: None,
            last_validated: None,
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// The `(owner, repo, branch)` triple this repository is edited under.
    pub fn context(&self) -> RepoContext {
        RepoContext::new(
            &self.owner,
            &self.repo,
            self.branch.as_deref().unwrap_or(DEFAULT_BRANCH),
        )
    }
}

/// Explicit `(owner, repo, branch)` context passed to resolver and staging calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoContext {
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

impl RepoContext {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            branch: branch.into(),
        }
    }

    /// `owner/repo`, the key shared by every branch of the repository.
    pub fn repo_key(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Same repository, different branch.
    pub fn on_branch(&self, branch: impl Into<String>) -> Self {
        Self {
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            branch: branch.into(),
        }
    }
}

impl fmt::Display for RepoContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repo, self.branch)
    }
}
