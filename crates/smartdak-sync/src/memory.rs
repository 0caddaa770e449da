//! In-memory repository, for tests and offline sessions.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use smartdak_core::RepoContext;
use tokio::sync::RwLock;

use crate::repo::{
    CommitInfo, DirEntry, EntryKind, RepoError, RepositoryApi, check_repo_path, content_sha,
};

/// Files per `(owner, repo, branch)`, plus counters for asserting on traffic.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    files: RwLock<HashMap<RepoContext, BTreeMap<String, String>>>,
    commits: RwLock<Vec<CommitInfo>>,
    failing_puts: HashSet<String>,
    reads: AtomicUsize,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, ctx: &RepoContext, path: &str, content: &str) -> Self {
        self.files
            .get_mut()
            .entry(ctx.clone())
            .or_default()
            .insert(path.to_string(), content.to_string());
        self
    }

    /// Make every `put_file` to `path` fail with a server error.
    pub fn with_failing_put(mut self, path: &str) -> Self {
        self.failing_puts.insert(path.to_string());
        self
    }

    /// Number of `get_file_content` calls served.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub async fn commits(&self) -> Vec<CommitInfo> {
        self.commits.read().await.clone()
    }

    pub async fn file(&self, ctx: &RepoContext, path: &str) -> Option<String> {
        self.files
            .read()
            .await
            .get(ctx)
            .and_then(|files| files.get(path).cloned())
    }
}

#[async_trait]
impl RepositoryApi for MemoryRepository {
    async fn get_file_content(&self, ctx: &RepoContext, path: &str) -> Result<String, RepoError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let path = check_repo_path(path)?;
        self.file(ctx, path)
            .await
            .ok_or_else(|| RepoError::not_found(ctx, path))
    }

    async fn put_file(
        &self,
        ctx: &RepoContext,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<CommitInfo, RepoError> {
        let path = check_repo_path(path)?;
        if self.failing_puts.contains(path) {
            return Err(RepoError::Server {
                status: 409,
                body: format!("{path} rejected"),
            });
        }
        self.files
            .write()
            .await
            .entry(ctx.clone())
            .or_default()
            .insert(path.to_string(), content.to_string());
        let info = CommitInfo {
            path: path.to_string(),
            message: message.to_string(),
            sha: Some(content_sha(content)),
        };
        self.commits.write().await.push(info.clone());
        Ok(info)
    }

    async fn list_directory(
        &self,
        ctx: &RepoContext,
        path: &str,
    ) -> Result<Vec<DirEntry>, RepoError> {
        let dir = check_repo_path(path)?;
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{dir}/")
        };
        let files = self.files.read().await;
        let mut dirs = BTreeSet::new();
        let mut entries = Vec::new();
        for file in files.get(ctx).into_iter().flat_map(|f| f.keys()) {
            let Some(rest) = file.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((child, _)) => {
                    dirs.insert(child.to_string());
                }
                None => entries.push(DirEntry {
                    name: rest.to_string(),
                    path: file.clone(),
                    kind: EntryKind::File,
                }),
            }
        }
        if entries.is_empty() && dirs.is_empty() {
            return Err(RepoError::not_found(ctx, dir));
        }
        entries.extend(dirs.into_iter().map(|name| DirEntry {
            path: format!("{prefix}{name}"),
            name,
            kind: EntryKind::Dir,
        }));
        Ok(entries)
    }
}
