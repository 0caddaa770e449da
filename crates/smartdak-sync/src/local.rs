//! Repository API over a local checkout. Owner, repo and branch are ignored;
//! the directory is whatever is checked out.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use smartdak_core::RepoContext;
use tracing::{debug, info};

use crate::repo::{
    CommitInfo, DirEntry, EntryKind, RepoError, RepositoryApi, check_repo_path, content_sha,
};

#[derive(Debug, Clone)]
pub struct LocalRepository {
    root: PathBuf,
}

impl LocalRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, RepoError> {
        let path = check_repo_path(path)?;
        Ok(if path.is_empty() {
            self.root.clone()
        } else {
            self.root.join(path)
        })
    }
}

fn not_found_as(ctx: &RepoContext, path: &str, e: std::io::Error) -> RepoError {
    if e.kind() == std::io::ErrorKind::NotFound {
        RepoError::not_found(ctx, path)
    } else {
        RepoError::Io(e)
    }
}

#[async_trait]
impl RepositoryApi for LocalRepository {
    async fn get_file_content(&self, ctx: &RepoContext, path: &str) -> Result<String, RepoError> {
        let full = self.resolve(path)?;
        debug!(path = %full.display(), "reading local file");
        tokio::fs::read_to_string(&full)
            .await
            .map_err(|e| not_found_as(ctx, path, e))
    }

    async fn put_file(
        &self,
        _ctx: &RepoContext,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<CommitInfo, RepoError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, content).await?;
        info!(path = %full.display(), bytes = content.len(), "wrote local file");
        Ok(CommitInfo {
            path: path.trim_matches('/').to_string(),
            message: message.to_string(),
            sha: Some(content_sha(content)),
        })
    }

    async fn list_directory(
        &self,
        ctx: &RepoContext,
        path: &str,
    ) -> Result<Vec<DirEntry>, RepoError> {
        let dir = check_repo_path(path)?.to_string();
        let full = self.resolve(&dir)?;
        let mut read = tokio::fs::read_dir(&full)
            .await
            .map_err(|e| not_found_as(ctx, &dir, e))?;
        let mut entries = Vec::new();
        while let Some(entry) = read.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let kind = if entry.file_type().await?.is_dir() {
                EntryKind::Dir
            } else {
                EntryKind::File
            };
            let path = if dir.is_empty() {
                name.clone()
            } else {
                format!("{dir}/{name}")
            };
            entries.push(DirEntry { name, path, kind });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }
}
