//! Staging ground: uncommitted file edits for one `(owner, repo, branch)`.
//!
//! The adapter keeps the staged files in memory and mirrors them to a
//! [`StorageBackend`] under [`staging_key`] after every mutation. Writes are
//! last-write-wins per path. A persist failure (quota) is returned to the caller
//! but the in-memory edit stays, so nothing the user typed is dropped.
//!
//! Two adapters opened on the same storage key do not coordinate; whichever
//! persists last wins for the whole area.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smartdak_core::{ComponentKind, DAK_JSON_PATH, DakManifest, RepoContext};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::{StorageBackend, StoreError};

/// Storage key of the staging area for `ctx`.
pub fn staging_key(ctx: &RepoContext) -> String {
    format!("smartdak-staging:{}:{}", ctx.repo_key(), ctx.branch)
}

/// Caller-supplied annotations for a staged write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageMetadata {
    pub message: Option<String>,
    pub component: Option<ComponentKind>,
    /// Free-form origin tag, e.g. `editor` or `import`.
    pub source: Option<String>,
}

impl StageMetadata {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn for_component(kind: ComponentKind) -> Self {
        Self {
            component: Some(kind),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedFileMetadata {
    pub staged_at: DateTime<Utc>,
    pub size: usize,
    /// Hex SHA-256 of the content.
    pub digest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<ComponentKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedFile {
    pub path: String,
    pub content: String,
    pub metadata: StagedFileMetadata,
}

/// Persisted form of one staging area.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagingGround {
    #[serde(default)]
    pub files: BTreeMap<String, StagedFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StagingStatus {
    pub repo_key: String,
    pub branch: String,
    pub changed_files: usize,
    pub total_bytes: usize,
    pub last_modified: Option<DateTime<Utc>>,
    pub has_changes: bool,
    /// False while the in-memory area is ahead of durable storage.
    pub persisted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContributionResult {
    pub path: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContributionReport {
    pub success: bool,
    pub results: Vec<ContributionResult>,
}

/// Notified after every staged write or removal, before the change is
/// persisted. The source resolver uses this to drop cache entries.
#[async_trait]
pub trait StagingObserver: Send + Sync {
    async fn staged_path_changed(&self, ctx: &RepoContext, path: &str);
}

pub struct StagingGroundAdapter {
    ctx: RepoContext,
    key: String,
    storage: Arc<dyn StorageBackend>,
    ground: RwLock<StagingGround>,
    observers: RwLock<Vec<Arc<dyn StagingObserver>>>,
    /// Whether the last persist succeeded.
    persisted: AtomicBool,
}

impl StagingGroundAdapter {
    /// Load the staging area for `ctx`, or start an empty one. An unreadable
    /// stored area is logged and replaced on the next write.
    pub async fn open(
        storage: Arc<dyn StorageBackend>,
        ctx: RepoContext,
    ) -> Result<Self, StoreError> {
        let key = staging_key(&ctx);
        let ground = match storage.get(&key).await? {
            Some(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                warn!(key = %key, error = %e, "discarding unreadable staging area");
                StagingGround::default()
            }),
            None => StagingGround::default(),
        };
        info!(ctx = %ctx, files = ground.files.len(), "opened staging area");
        Ok(Self {
            ctx,
            key,
            storage,
            ground: RwLock::new(ground),
            observers: RwLock::default(),
            persisted: AtomicBool::new(true),
        })
    }

    pub fn context(&self) -> &RepoContext {
        &self.ctx
    }

    pub async fn add_observer(&self, observer: Arc<dyn StagingObserver>) {
        self.observers.write().await.push(observer);
    }

    // ── Writes ──

    /// Stage `content` at `path`. Returns `false` when identical content was
    /// already staged there. An unchanged write still retries the persist
    /// while an earlier one has failed.
    pub async fn update_file(
        &self,
        path: &str,
        content: &str,
        metadata: Option<StageMetadata>,
    ) -> Result<bool, StoreError> {
        let path = check_path(path)?;
        let digest = sha256_hex(content);
        {
            let mut ground = self.ground.write().await;
            if ground
                .files
                .get(&path)
                .is_some_and(|f| f.metadata.digest == digest)
            {
                drop(ground);
                debug!(path = %path, "staged content unchanged");
                if !self.is_persisted() {
                    self.persist().await?;
                }
                return Ok(false);
            }
            let meta = metadata.unwrap_or_default();
            let now = Utc::now();
            ground.files.insert(
                path.clone(),
                StagedFile {
                    path: path.clone(),
                    content: content.to_string(),
                    metadata: StagedFileMetadata {
                        staged_at: now,
                        size: content.len(),
                        digest,
                        message: meta.message,
                        component: meta.component,
                        source: meta.source,
                    },
                },
            );
            ground.last_modified = Some(now);
        }
        info!(path = %path, bytes = content.len(), "staged file");
        self.notify(&path).await;
        self.persist().await?;
        Ok(true)
    }

    /// Drop a staged file. Returns whether anything was staged at `path`.
    pub async fn remove_file(&self, path: &str) -> Result<bool, StoreError> {
        let path = check_path(path)?;
        {
            let mut ground = self.ground.write().await;
            if ground.files.remove(&path).is_none() {
                return Ok(false);
            }
            ground.last_modified = Some(Utc::now());
        }
        info!(path = %path, "unstaged file");
        self.notify(&path).await;
        self.persist().await?;
        Ok(true)
    }

    /// Stage several files. Each file succeeds or fails on its own; the report
    /// is successful only when every file was staged and persisted.
    pub async fn contribute_files(
        &self,
        files: &[(String, String)],
        metadata: Option<StageMetadata>,
    ) -> ContributionReport {
        let mut results = Vec::with_capacity(files.len());
        for (path, content) in files {
            let outcome = self.update_file(path, content, metadata.clone()).await;
            results.push(ContributionResult {
                path: path.clone(),
                success: outcome.is_ok(),
                error: outcome.err().map(|e| e.to_string()),
            });
        }
        let success = results.iter().all(|r| r.success);
        info!(
            count = results.len(),
            failed = results.iter().filter(|r| !r.success).count(),
            "contributed files"
        );
        ContributionReport { success, results }
    }

    pub async fn save_dak_json(&self, manifest: &DakManifest) -> Result<bool, StoreError> {
        let json = manifest.to_json_pretty()?;
        self.update_file(
            DAK_JSON_PATH,
            &json,
            Some(StageMetadata {
                message: Some("Update dak.json".into()),
                component: None,
                source: Some("manifest".into()),
            }),
        )
        .await
    }

    /// Discard every staged file. Returns how many were dropped.
    pub async fn clear(&self) -> Result<usize, StoreError> {
        let paths: Vec<String> = self.ground.read().await.files.keys().cloned().collect();
        self.clear_paths(&paths).await
    }

    /// Discard the given staged paths, leaving the rest. Used after a partial
    /// commit. Returns how many were dropped.
    pub async fn clear_paths(&self, paths: &[String]) -> Result<usize, StoreError> {
        let removed: Vec<String> = {
            let mut ground = self.ground.write().await;
            let removed: Vec<String> = paths
                .iter()
                .filter(|p| ground.files.remove(p.as_str()).is_some())
                .cloned()
                .collect();
            if !removed.is_empty() {
                ground.last_modified = Some(Utc::now());
            }
            removed
        };
        if removed.is_empty() {
            return Ok(0);
        }
        for path in &removed {
            self.notify(path).await;
        }
        info!(ctx = %self.ctx, count = removed.len(), "cleared staged files");
        self.persist().await?;
        Ok(removed.len())
    }

    // ── Reads ──

    /// False after a failed persist, until a later one succeeds.
    pub fn is_persisted(&self) -> bool {
        self.persisted.load(Ordering::Acquire)
    }

    pub async fn has_changes(&self) -> bool {
        !self.ground.read().await.files.is_empty()
    }

    pub async fn get_changed_files_count(&self) -> usize {
        self.ground.read().await.files.len()
    }

    pub async fn get_file(&self, path: &str) -> Option<StagedFile> {
        self.ground.read().await.files.get(path).cloned()
    }

    /// Every staged file, ordered by path.
    pub async fn files(&self) -> Vec<StagedFile> {
        self.ground.read().await.files.values().cloned().collect()
    }

    pub async fn status(&self) -> StagingStatus {
        let ground = self.ground.read().await;
        StagingStatus {
            repo_key: self.ctx.repo_key(),
            branch: self.ctx.branch.clone(),
            changed_files: ground.files.len(),
            total_bytes: ground.files.values().map(|f| f.metadata.size).sum(),
            last_modified: ground.last_modified,
            has_changes: !ground.files.is_empty(),
            persisted: self.is_persisted(),
        }
    }

    /// The staged `dak.json`, if one is staged.
    pub async fn load_dak_json(&self) -> Result<Option<DakManifest>, StoreError> {
        match self.get_file(DAK_JSON_PATH).await {
            Some(file) => Ok(Some(DakManifest::from_json(&file.content)?)),
            None => Ok(None),
        }
    }

    // ── Internals ──

    async fn notify(&self, path: &str) {
        let observers = self.observers.read().await.clone();
        for observer in observers {
            observer.staged_path_changed(&self.ctx, path).await;
        }
    }

    async fn persist(&self) -> Result<(), StoreError> {
        let result = self.write_snapshot().await;
        self.persisted.store(result.is_ok(), Ordering::Release);
        if let Err(e) = &result {
            warn!(key = %self.key, error = %e, "staging area not persisted; edits kept in memory");
        }
        result
    }

    async fn write_snapshot(&self) -> Result<(), StoreError> {
        let snapshot = self.ground.read().await.clone();
        if snapshot.files.is_empty() {
            self.storage.remove(&self.key).await?;
            debug!(key = %self.key, "removed empty staging area");
            return Ok(());
        }
        let json = serde_json::to_string(&snapshot)?;
        self.storage.set(&self.key, &json).await?;
        debug!(key = %self.key, bytes = json.len(), "persisted staging area");
        Ok(())
    }
}

/// Repository-relative path without `..`, leading `/`, or backslashes.
fn check_path(path: &str) -> Result<String, StoreError> {
    let trimmed = path.trim();
    let invalid = trimmed.is_empty()
        || trimmed.starts_with('/')
        || trimmed.contains('\\')
        || trimmed.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if invalid {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(trimmed.to_string())
}

fn sha256_hex(content: &str) -> String {
    hex::encode(ring::digest::digest(&ring::digest::SHA256, content.as_bytes()))
}
