//! Whole-DAK validation summary: counts by level plus per-file drill-down.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;
use smartdak_core::ValidationLevel;

use crate::file::{DakFile, FileOrigin};
use crate::rule::Violation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub path: String,
    pub origin: FileOrigin,
    pub error_count: usize,
    pub warning_count: usize,
    pub info_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DakValidationSummary {
    /// No error-level violations.
    pub is_valid: bool,
    pub files_checked: usize,
    pub error_count: usize,
    pub warning_count: usize,
    pub info_count: usize,
    pub files: Vec<FileReport>,
    pub violations: Vec<Violation>,
    pub timestamp: DateTime<Utc>,
}

fn count(violations: &[Violation], path: Option<&str>, level: ValidationLevel) -> usize {
    violations
        .iter()
        .filter(|v| v.level == level && path.is_none_or(|p| v.file_path == p))
        .count()
}

impl DakValidationSummary {
    pub fn new(files: &[DakFile], violations: Vec<Violation>) -> Self {
        let reports = files
            .iter()
            .map(|file| {
                let path = Some(file.path.as_str());
                FileReport {
                    path: file.path.clone(),
                    origin: file.origin,
                    error_count: count(&violations, path, ValidationLevel::Error),
                    warning_count: count(&violations, path, ValidationLevel::Warning),
                    info_count: count(&violations, path, ValidationLevel::Info),
                }
            })
            .collect();
        let error_count = count(&violations, None, ValidationLevel::Error);
        Self {
            is_valid: error_count == 0,
            files_checked: files.len(),
            error_count,
            warning_count: count(&violations, None, ValidationLevel::Warning),
            info_count: count(&violations, None, ValidationLevel::Info),
            files: reports,
            violations,
            timestamp: Utc::now(),
        }
    }

    /// Errors block a commit; warnings and info do not.
    pub fn can_commit(&self) -> bool {
        self.is_valid
    }

    pub fn errors(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Violation> {
        self.violations
            .iter()
            .filter(|v| v.level == ValidationLevel::Warning)
    }

    pub fn violations_for<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a Violation> {
        self.violations.iter().filter(move |v| v.file_path == path)
    }

    /// Plain-text report: one block per file with findings, then totals.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for file in &self.files {
            let mut findings = self.violations_for(&file.path).peekable();
            if findings.peek().is_none() {
                continue;
            }
            let _ = writeln!(out, "{} ({})", file.path, origin_label(file.origin));
            for v in findings {
                let position = match (v.line, v.column) {
                    (Some(line), Some(column)) => format!("{line}:{column}"),
                    (Some(line), None) => line.to_string(),
                    _ => "-".to_string(),
                };
                let _ = writeln!(
                    out,
                    "  {:<7} {:>7}  {}  {} [{}]",
                    v.level.as_str(),
                    position,
                    v.message,
                    v.rule_id,
                    v.code
                );
                if let Some(suggestion) = &v.suggestion {
                    let _ = writeln!(out, "                   hint: {suggestion}");
                }
            }
        }
        let verdict = if self.can_commit() { "ok" } else { "blocked" };
        let _ = writeln!(
            out,
            "{} files checked: {} errors, {} warnings, {} info ({verdict})",
            self.files_checked, self.error_count, self.warning_count, self.info_count
        );
        out
    }
}

fn origin_label(origin: FileOrigin) -> &'static str {
    match origin {
        FileOrigin::Staged => "staged",
        FileOrigin::Committed => "committed",
    }
}
