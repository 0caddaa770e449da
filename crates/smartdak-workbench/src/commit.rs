//! Validate-then-push commit of the staging area.
//!
//! The committed tree (`input/` plus the root config files) is overlaid by
//! the staged files and validated as one set. Any error-level violation
//! blocks the commit. Otherwise each staged file is pushed on its own; a
//! failed push is reported and stays staged while the others go through.
//! Committed files that no content rule looks at (images, binaries) are
//! listed but never fetched.

use std::collections::{BTreeMap, BTreeSet};

use futures::future::join_all;
use serde::Serialize;
use smartdak_core::{DAK_JSON_PATH, PERMITTED_ROOT};
use smartdak_sync::{CommitInfo, list_files_recursive};
use smartdak_validate::{DakFile, DakValidationSummary, FileOrigin, ValidationEngine};
use tracing::{info, warn};

use crate::Result;
use crate::dak::DakObject;
use crate::factory::DakFactory;

/// Repository-root files validated alongside `input/`.
pub const SYNC_ROOT_FILES: [&str; 2] = [DAK_JSON_PATH, "sushi-config.yaml"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushFailure {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitReport {
    pub pushed: Vec<CommitInfo>,
    pub failed: Vec<PushFailure>,
    pub summary: DakValidationSummary,
    /// Problems after the pushes: clearing the staging area or reloading
    /// `dak.json`. The pushes themselves stand.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cleanup_errors: Vec<String>,
}

impl CommitReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.cleanup_errors.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum CommitOutcome {
    NothingToCommit,
    /// Validation found errors; nothing was pushed.
    Blocked { summary: DakValidationSummary },
    Committed(CommitReport),
}

pub struct CommitPipeline {
    factory: DakFactory,
    dak: DakObject,
    engine: ValidationEngine,
}

impl CommitPipeline {
    pub fn new(factory: DakFactory, dak: DakObject) -> Self {
        Self::with_engine(factory, dak, ValidationEngine::with_default_rules())
    }

    pub fn with_engine(factory: DakFactory, dak: DakObject, engine: ValidationEngine) -> Self {
        Self {
            factory,
            dak,
            engine,
        }
    }

    /// The current DAK; replaced after a commit that pushed `dak.json`.
    pub fn dak(&self) -> &DakObject {
        &self.dak
    }

    pub fn engine(&self) -> &ValidationEngine {
        &self.engine
    }

    /// Committed files overlaid by staged files, ordered by path.
    pub async fn gather_files(&self) -> Result<Vec<DakFile>> {
        let ctx = self.dak.context();
        let repository = self.factory.repository();
        let staged = self.dak.staging().files().await;
        let staged_paths: BTreeSet<&str> = staged.iter().map(|f| f.path.as_str()).collect();

        let input_root = PERMITTED_ROOT.trim_end_matches('/');
        let mut committed = list_files_recursive(repository.as_ref(), ctx, input_root).await?;
        committed.extend(SYNC_ROOT_FILES.iter().map(|p| p.to_string()));
        committed.retain(|path| !staged_paths.contains(path.as_str()));
        let (committed, listed): (Vec<String>, Vec<String>) = committed
            .into_iter()
            .partition(|path| self.engine.reads_content(path));

        let reads = committed.iter().map(|path| async move {
            (path, repository.get_file_content(ctx, path).await)
        });

        let mut files: BTreeMap<String, DakFile> = listed
            .into_iter()
            .filter(|path| !SYNC_ROOT_FILES.contains(&path.as_str()))
            .map(|path| (path.clone(), DakFile::listed(path, FileOrigin::Committed)))
            .collect();
        for (path, result) in join_all(reads).await {
            let file = match result {
                Ok(content) => DakFile::committed(path.clone(), content),
                Err(e) if e.is_not_found() && SYNC_ROOT_FILES.contains(&path.as_str()) => continue,
                Err(e) => {
                    warn!(path = %path, error = %e, "could not read committed file");
                    DakFile::unreadable(path.clone(), FileOrigin::Committed, e.to_string())
                }
            };
            files.insert(path.clone(), file);
        }
        for file in &staged {
            files.insert(file.path.clone(), DakFile::staged(file.path.clone(), file.content.clone()));
        }
        Ok(files.into_values().collect())
    }

    pub async fn validate(&self) -> Result<DakValidationSummary> {
        let files = self.gather_files().await?;
        Ok(self.engine.validate_files(&files))
    }

    pub async fn run(&mut self, message: &str) -> Result<CommitOutcome> {
        let staged = self.dak.staging().files().await;
        if staged.is_empty() {
            info!(repo = %self.dak.context(), "nothing staged");
            return Ok(CommitOutcome::NothingToCommit);
        }

        let summary = self.validate().await?;
        if !summary.can_commit() {
            warn!(
                errors = summary.error_count,
                warnings = summary.warning_count,
                "commit blocked by validation errors"
            );
            return Ok(CommitOutcome::Blocked { summary });
        }

        let ctx = self.dak.context().clone();
        let repository = self.factory.repository().clone();
        let mut pushed = Vec::new();
        let mut failed = Vec::new();
        for file in &staged {
            match repository.put_file(&ctx, &file.path, &file.content, message).await {
                Ok(commit) => {
                    info!(path = %file.path, sha = ?commit.sha, "pushed file");
                    pushed.push(commit);
                }
                Err(e) => {
                    warn!(path = %file.path, error = %e, "push failed");
                    failed.push(PushFailure {
                        path: file.path.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let pushed_paths: Vec<String> = pushed.iter().map(|c| c.path.clone()).collect();
        for path in &pushed_paths {
            self.factory.resolver().invalidate_path(&ctx, path).await;
        }

        // Past this point the pushes are done; failures go into the report.
        let mut cleanup_errors = Vec::new();
        if let Err(e) = self.dak.staging().clear_paths(&pushed_paths).await {
            warn!(error = %e, "pushed files unstaged in memory only");
            cleanup_errors.push(format!("clearing pushed files from staging: {e}"));
        }

        let pushed_manifest = staged
            .iter()
            .find(|f| f.path == DAK_JSON_PATH && pushed_paths.contains(&f.path));
        if let Some(manifest) = pushed_manifest {
            let staging = self.dak.staging().clone();
            match self.factory.create_on_staging(staging, &manifest.content) {
                Ok(dak) => self.dak = dak,
                Err(e) => {
                    warn!(error = %e, "could not reload pushed dak.json");
                    cleanup_errors.push(format!("reloading dak.json: {e}"));
                }
            }
        }

        info!(
            repo = %ctx,
            pushed = pushed.len(),
            failed = failed.len(),
            "commit finished"
        );
        Ok(CommitOutcome::Committed(CommitReport {
            pushed,
            failed,
            summary,
            cleanup_errors,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use smartdak_core::{ComponentKind, RepoContext};
    use smartdak_store::{MemoryStorage, StorageQuota};
    use smartdak_sync::{LocalRepository, MemoryRepository};
    use std::sync::Arc;

    const SUSHI: &str = "id: smart.who.int.anc\ndependencies:\n  smart.who.int.base: current\n";

    const BPMN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<bpmn:definitions xmlns:bpmn="http://www.omg.org/spec/BPMN/20100524/MODEL" id="defs">
  <bpmn:process id="anc-contact" name="ANC contact">
    <bpmn:businessRuleTask id="anc-danger-signs" name="Check danger signs"/>
  </bpmn:process>
</bpmn:definitions>
"#;

    const BPMN_NO_TASK_ID: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<bpmn:definitions xmlns:bpmn="http://www.omg.org/spec/BPMN/20100524/MODEL" id="defs">
  <bpmn:process id="referral" name="Referral">
    <bpmn:businessRuleTask name="Decide referral"/>
  </bpmn:process>
</bpmn:definitions>
"#;

    const SCENARIO_V1: &str = "# First visit\n\n## Actors\n- Client\n\n## Steps\n1. Register\n";
    const SCENARIO_V2: &str = "# First contact\n\n## Actors\n- Client\n\n## Steps\n1. Register\n";

    fn ctx() -> RepoContext {
        RepoContext::new("who", "smart-anc", "main")
    }

    fn manifest() -> String {
        json!({
            "resourceType": "DAK",
            "id": "smart.who.int.anc",
            "name": "ANC",
            "businessProcesses": [{"url": "input/process/anc-contact.bpmn"}],
            "userScenarios": [{"url": "input/scenarios/first-visit.md"}]
        })
        .to_string()
    }

    fn repository() -> MemoryRepository {
        MemoryRepository::new()
            .with_file(&ctx(), DAK_JSON_PATH, &manifest())
            .with_file(&ctx(), "sushi-config.yaml", SUSHI)
            .with_file(&ctx(), "input/process/anc-contact.bpmn", BPMN)
            .with_file(&ctx(), "input/scenarios/first-visit.md", SCENARIO_V1)
    }

    async fn pipeline(repo: Arc<MemoryRepository>) -> CommitPipeline {
        let factory = DakFactory::new(repo, Arc::new(MemoryStorage::new()));
        let dak = factory.create_from_repository(ctx()).await.unwrap();
        CommitPipeline::new(factory, dak)
    }

    #[tokio::test]
    async fn nothing_staged_is_a_no_op() {
        let mut pipeline = pipeline(Arc::new(repository())).await;
        assert!(matches!(
            pipeline.run("noop").await.unwrap(),
            CommitOutcome::NothingToCommit
        ));
    }

    #[tokio::test]
    async fn staged_files_overlay_committed_ones() {
        let pipeline = pipeline(Arc::new(repository())).await;
        pipeline
            .dak()
            .staging()
            .update_file("input/scenarios/first-visit.md", SCENARIO_V2, None)
            .await
            .unwrap();
        let files = pipeline.gather_files().await.unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "dak.json",
                "input/process/anc-contact.bpmn",
                "input/scenarios/first-visit.md",
                "sushi-config.yaml",
            ]
        );
        assert_eq!(files[2].origin, FileOrigin::Staged);
        assert_eq!(files[2].content, SCENARIO_V2);
        assert_eq!(files[0].origin, FileOrigin::Committed);
    }

    #[tokio::test]
    async fn clean_commit_pushes_clears_and_rehydrates() {
        let repo = Arc::new(repository());
        let mut pipeline = pipeline(repo.clone()).await;
        let saved = pipeline
            .dak()
            .save_component(
                ComponentKind::DecisionLogic,
                json!({"id": "anc-danger-signs", "name": "Danger signs"}),
            )
            .await
            .unwrap();

        let CommitOutcome::Committed(report) = pipeline.run("Add danger signs").await.unwrap() else {
            panic!("expected a commit");
        };
        assert!(report.is_complete());
        assert_eq!(report.pushed.len(), 2);
        assert!(report.summary.can_commit());
        assert!(repo.file(&ctx(), &saved.path).await.is_some());
        assert!(repo.commits().await.iter().all(|c| c.message == "Add danger signs"));

        assert!(!pipeline.dak().staging().has_changes().await);
        let manifest = pipeline.dak().manifest().await;
        assert_eq!(manifest.sources(ComponentKind::DecisionLogic).len(), 1);
    }

    #[tokio::test]
    async fn missing_task_id_blocks_commit() {
        let repo = Arc::new(repository());
        let mut pipeline = pipeline(repo.clone()).await;
        pipeline
            .dak()
            .staging()
            .update_file("input/process/referral.bpmn", BPMN_NO_TASK_ID, None)
            .await
            .unwrap();

        let CommitOutcome::Blocked { summary } = pipeline.run("Add referral").await.unwrap() else {
            panic!("expected the commit to be blocked");
        };
        assert!(summary.errors().any(|v| v.code == "BPMN_TASK_MISSING_ID"));
        assert!(repo.commits().await.is_empty());
        assert!(pipeline.dak().staging().has_changes().await);
    }

    #[tokio::test]
    async fn failed_push_stays_staged() {
        let repo = Arc::new(repository().with_failing_put("input/scenarios/locked.md"));
        let mut pipeline = pipeline(repo.clone()).await;
        let staging = pipeline.dak().staging().clone();
        staging
            .update_file("input/scenarios/locked.md", SCENARIO_V1, None)
            .await
            .unwrap();
        staging
            .update_file("input/scenarios/first-visit.md", SCENARIO_V2, None)
            .await
            .unwrap();

        let CommitOutcome::Committed(report) = pipeline.run("Edit scenarios").await.unwrap() else {
            panic!("expected a commit");
        };
        assert_eq!(report.pushed.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].path, "input/scenarios/locked.md");

        let remaining: Vec<_> = pipeline
            .dak()
            .staging()
            .files()
            .await
            .into_iter()
            .map(|f| f.path)
            .collect();
        assert_eq!(remaining, vec!["input/scenarios/locked.md"]);
    }

    #[tokio::test]
    async fn no_stale_cache_after_commit() {
        let repo = Arc::new(repository());
        let mut pipeline = pipeline(repo.clone()).await;

        let before = pipeline
            .dak()
            .get_by_id(ComponentKind::UserScenarios, "first-visit")
            .await
            .unwrap();
        assert_eq!(before.data().unwrap()["title"], "First visit");
        assert_eq!(pipeline.dak().resolver().cache_stats().await.total_entries, 1);

        pipeline
            .dak()
            .staging()
            .update_file("input/scenarios/first-visit.md", SCENARIO_V2, None)
            .await
            .unwrap();
        assert!(matches!(
            pipeline.run("Rename").await.unwrap(),
            CommitOutcome::Committed(_)
        ));

        let after = pipeline
            .dak()
            .get_by_id(ComponentKind::UserScenarios, "first-visit")
            .await
            .unwrap();
        assert_eq!(after.data().unwrap()["title"], "First contact");
    }

    #[tokio::test]
    async fn binary_assets_do_not_block_commit() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path().join("checkout");
        for (path, content) in [
            (DAK_JSON_PATH, manifest()),
            ("sushi-config.yaml", SUSHI.to_string()),
            ("input/process/anc-contact.bpmn", BPMN.to_string()),
            ("input/scenarios/first-visit.md", SCENARIO_V1.to_string()),
        ] {
            let full = root.join(path);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(full, content).unwrap();
        }
        std::fs::create_dir_all(root.join("input/images")).unwrap();
        let png = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0xff, 0x00];
        std::fs::write(root.join("input/images/logo.png"), png).unwrap();
        std::fs::write(root.join("input/images/Cover Art.png"), png).unwrap();

        let factory = DakFactory::new(
            Arc::new(LocalRepository::new(&root)),
            Arc::new(MemoryStorage::new()),
        );
        let dak = factory.create_from_repository(ctx()).await.unwrap();
        let mut pipeline = CommitPipeline::new(factory, dak);
        pipeline
            .dak()
            .staging()
            .update_file("input/scenarios/first-visit.md", SCENARIO_V2, None)
            .await
            .unwrap();

        let files = pipeline.gather_files().await.unwrap();
        let logo = files.iter().find(|f| f.path == "input/images/logo.png").unwrap();
        assert!(logo.path_only);
        assert!(logo.read_error.is_none());

        let summary = pipeline.validate().await.unwrap();
        assert!(summary.violations.iter().all(|v| v.code != "READ_ERROR"));
        // names of unread files are still checked
        assert!(
            summary
                .violations_for("input/images/Cover Art.png")
                .any(|v| v.code == "FILENAME_HAS_SPACES")
        );
        std::fs::remove_file(root.join("input/images/Cover Art.png")).unwrap();

        let CommitOutcome::Committed(report) = pipeline.run("Rename visit").await.unwrap() else {
            panic!("expected a commit");
        };
        assert!(report.is_complete());
        assert_eq!(
            std::fs::read_to_string(root.join("input/scenarios/first-visit.md")).unwrap(),
            SCENARIO_V2
        );
    }

    #[tokio::test]
    async fn cleanup_failure_keeps_report_and_memory_only_edits() {
        let repo = Arc::new(repository().with_failing_put("input/scenarios/locked.md"));
        let storage = Arc::new(MemoryStorage::with_quota(StorageQuota::bytes(4096)));
        let factory = DakFactory::new(repo.clone(), storage);
        let dak = factory.create_from_repository(ctx()).await.unwrap();
        let mut pipeline = CommitPipeline::new(factory, dak);
        let staging = pipeline.dak().staging().clone();

        // too big to persist: these edits live only in memory
        let locked = format!("{SCENARIO_V1}\n{}\n", "Long notes. ".repeat(500));
        staging
            .update_file("input/scenarios/locked.md", &locked, None)
            .await
            .unwrap_err();
        staging
            .update_file("input/scenarios/first-visit.md", SCENARIO_V2, None)
            .await
            .unwrap_err();
        let renamed = manifest().replace("\"ANC\"", "\"ANC v2\"");
        staging
            .update_file(DAK_JSON_PATH, &renamed, None)
            .await
            .unwrap_err();

        let CommitOutcome::Committed(report) = pipeline.run("Edit scenarios").await.unwrap() else {
            panic!("expected a commit");
        };
        assert_eq!(report.pushed.len(), 2);
        assert_eq!(report.failed[0].path, "input/scenarios/locked.md");
        assert_eq!(report.cleanup_errors.len(), 1);
        assert!(!report.is_complete());

        // reloaded on the same staging area, so the unpersisted edit survives
        assert!(Arc::ptr_eq(pipeline.dak().staging(), &staging));
        assert_eq!(pipeline.dak().manifest().await.metadata.name, "ANC v2");
        assert_eq!(
            staging.get_file("input/scenarios/locked.md").await.unwrap().content,
            locked
        );
        assert_eq!(staging.get_changed_files_count().await, 1);
    }
}
