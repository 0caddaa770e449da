//! Remote repository read/write API consumed by the resolver and the commit path.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use smartdak_core::RepoContext;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum RepoError {
    #[error("{path} not found in {repo}")]
    NotFound { repo: String, path: String },
    #[error("invalid repository path `{0}`")]
    InvalidPath(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not decode {path}: {reason}")]
    Decode { path: String, reason: String },
}

impl RepoError {
    pub fn not_found(ctx: &RepoContext, path: &str) -> Self {
        Self::NotFound {
            repo: ctx.to_string(),
            path: path.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result of a create-or-update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub path: String,
    pub message: String,
    /// Commit or blob id reported by the backend, when it has one.
    pub sha: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    /// Full repository path.
    pub path: String,
    pub kind: EntryKind,
}

#[async_trait]
pub trait RepositoryApi: Send + Sync {
    /// Text of the file at `path` on `ctx.branch`.
    async fn get_file_content(&self, ctx: &RepoContext, path: &str) -> Result<String, RepoError>;

    /// Create or update the file at `path` on `ctx.branch` in one commit.
    async fn put_file(
        &self,
        ctx: &RepoContext,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<CommitInfo, RepoError>;

    /// Immediate children of directory `path` (`""` for the root).
    async fn list_directory(&self, ctx: &RepoContext, path: &str)
    -> Result<Vec<DirEntry>, RepoError>;
}

/// Every file below `root`, sorted. A missing root yields an empty list.
pub async fn list_files_recursive(
    api: &dyn RepositoryApi,
    ctx: &RepoContext,
    root: &str,
) -> Result<Vec<String>, RepoError> {
    let mut files = Vec::new();
    let mut pending = vec![root.trim_end_matches('/').to_string()];
    while let Some(dir) = pending.pop() {
        let entries = match api.list_directory(ctx, &dir).await {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() && dir == root.trim_end_matches('/') => {
                debug!(root, "directory not present");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        for entry in entries {
            match entry.kind {
                EntryKind::File => files.push(entry.path),
                EntryKind::Dir => pending.push(entry.path),
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Repository-relative path without `..`, leading `/`, or backslashes.
pub(crate) fn check_repo_path(path: &str) -> Result<&str, RepoError> {
    let path = path.trim_matches('/');
    let bad = path.contains('\\') || path.split('/').any(|s| s == "..");
    if bad {
        return Err(RepoError::InvalidPath(path.to_string()));
    }
    Ok(path)
}

pub(crate) fn content_sha(content: &str) -> String {
    hex::encode(ring::digest::digest(
        &ring::digest::SHA256,
        content.as_bytes(),
    ))
}
