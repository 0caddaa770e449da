//! One function per subcommand. Each prints its result and returns the
//! process exit code.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use smartdak_core::ComponentKind;
use smartdak_store::StageMetadata;
use smartdak_validate::{DakFile, ValidationEngine};
use smartdak_workbench::{CommitOutcome, CommitPipeline, DakObject};

use crate::Session;
use crate::display;

impl Session {
    async fn dak(&self) -> anyhow::Result<DakObject> {
        self.factory
            .create_from_repository(self.ctx.clone())
            .await
            .with_context(|| format!("loading dak.json from {}", self.ctx))
    }

    async fn pipeline(&self) -> anyhow::Result<CommitPipeline> {
        Ok(CommitPipeline::new(self.factory.clone(), self.dak().await?))
    }
}

fn exit_code(ok: bool) -> ExitCode {
    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

pub async fn validate(session: &Session, json: bool) -> anyhow::Result<ExitCode> {
    let summary = session.pipeline().await?.validate().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", summary.render_text());
    }
    Ok(exit_code(summary.can_commit()))
}

pub async fn status(session: &Session) -> anyhow::Result<ExitCode> {
    let staging = session.factory.open_staging(&session.ctx).await?;
    let status = staging.status().await;
    let files = staging.files().await;
    print!("{}", display::status(&status, &files));
    Ok(ExitCode::SUCCESS)
}

pub async fn stage(session: &Session, path: &str, from: Option<PathBuf>) -> anyhow::Result<ExitCode> {
    let source = from.unwrap_or_else(|| session.dir.join(path));
    let content = tokio::fs::read_to_string(&source)
        .await
        .with_context(|| format!("reading {}", source.display()))?;

    let staging = session.factory.open_staging(&session.ctx).await?;
    let metadata = StageMetadata {
        message: None,
        component: ComponentKind::from_path(path),
        source: Some("cli".into()),
    };
    let changed = staging.update_file(path, &content, Some(metadata)).await?;
    println!("{} {path}", if changed { "staged" } else { "unchanged" });

    // Single-file checks only; cross-file rules run at validate and commit.
    let violations = ValidationEngine::with_default_rules().validate_file(&DakFile::staged(path, content));
    for violation in &violations {
        println!("  {violation}");
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn unstage(session: &Session, path: &str) -> anyhow::Result<ExitCode> {
    let staging = session.factory.open_staging(&session.ctx).await?;
    let removed = staging.remove_file(path).await?;
    println!("{} {path}", if removed { "unstaged" } else { "not staged:" });
    Ok(exit_code(removed))
}

pub async fn discard(session: &Session) -> anyhow::Result<ExitCode> {
    let staging = session.factory.open_staging(&session.ctx).await?;
    let count = staging.clear().await?;
    println!("discarded {count} staged file(s)");
    Ok(ExitCode::SUCCESS)
}

pub async fn commit(session: &Session, message: &str) -> anyhow::Result<ExitCode> {
    let mut pipeline = session.pipeline().await?;
    let outcome = pipeline.run(message).await?;
    print!("{}", display::commit(&outcome));
    Ok(match outcome {
        CommitOutcome::NothingToCommit => ExitCode::SUCCESS,
        CommitOutcome::Blocked { .. } => ExitCode::FAILURE,
        CommitOutcome::Committed(report) => exit_code(report.is_complete()),
    })
}

pub async fn resolve(session: &Session, kind: ComponentKind, id: Option<&str>) -> anyhow::Result<ExitCode> {
    let dak = session.dak().await?;
    let entries: Vec<_> = match id {
        Some(id) => dak.get_by_id(kind, id).await.into_iter().collect(),
        None => dak.list(kind).await,
    };
    let found = !entries.is_empty();
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(exit_code(found || id.is_none()))
}

pub fn rules() {
    print!("{}", display::rules(&ValidationEngine::with_default_rules().rules()));
}
