//! Plain-text rendering for staging status, commit outcomes and the rule list.

use std::fmt::Write;

use smartdak_store::{StagedFile, StagingStatus};
use smartdak_validate::RuleDescriptor;
use smartdak_workbench::CommitOutcome;

fn human_bytes(bytes: usize) -> String {
    match bytes {
        b if b < 1024 => format!("{b} B"),
        b if b < 1024 * 1024 => format!("{:.1} KiB", b as f64 / 1024.0),
        b => format!("{:.1} MiB", b as f64 / (1024.0 * 1024.0)),
    }
}

pub fn status(status: &StagingStatus, files: &[StagedFile]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} on {}", status.repo_key, status.branch);
    if !status.has_changes {
        let _ = writeln!(out, "nothing staged");
        return out;
    }
    for file in files {
        let kind = file
            .metadata
            .component
            .map(|k| k.manifest_key().to_string())
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "  {:<48} {:>10}  {:<18} {}",
            file.path,
            human_bytes(file.metadata.size),
            kind,
            file.metadata.staged_at.format("%Y-%m-%d %H:%M")
        );
    }
    let _ = writeln!(
        out,
        "{} file(s), {} staged",
        status.changed_files,
        human_bytes(status.total_bytes)
    );
    if !status.persisted {
        let _ = writeln!(out, "warning: staged edits are not saved to disk (storage quota?)");
    }
    out
}

pub fn commit(outcome: &CommitOutcome) -> String {
    let mut out = String::new();
    match outcome {
        CommitOutcome::NothingToCommit => {
            let _ = writeln!(out, "nothing to commit");
        }
        CommitOutcome::Blocked { summary } => {
            out.push_str(&summary.render_text());
            let _ = writeln!(out, "commit blocked: fix the errors above");
        }
        CommitOutcome::Committed(report) => {
            for warning in report.summary.warnings() {
                let _ = writeln!(out, "  {warning}");
            }
            for commit in &report.pushed {
                let sha = commit.sha.as_deref().map(|s| &s[..s.len().min(10)]).unwrap_or("-");
                let _ = writeln!(out, "pushed  {} ({sha})", commit.path);
            }
            for failure in &report.failed {
                let _ = writeln!(out, "failed  {}: {}", failure.path, failure.error);
            }
            for error in &report.cleanup_errors {
                let _ = writeln!(out, "warning: {error}");
            }
            let _ = writeln!(
                out,
                "{} pushed, {} failed",
                report.pushed.len(),
                report.failed.len()
            );
        }
    }
    out
}

pub fn rules(rules: &[RuleDescriptor]) -> String {
    let mut out = String::new();
    for rule in rules {
        let types: Vec<_> = rule.file_types.iter().map(|t| t.as_str()).collect();
        let _ = writeln!(
            out,
            "{:<28} {:<8} {:<20} {}",
            rule.id,
            rule.level.as_str(),
            types.join(","),
            rule.description
        );
    }
    out
}
