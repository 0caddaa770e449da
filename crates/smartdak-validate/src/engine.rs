//! Rule registry and the validation pass.
//!
//! Output order is fixed: files in the order given, and within a file the
//! rules in registration order. Two passes over the same file set produce the
//! same violations in the same order.

use smartdak_core::ValidationLevel;
use tracing::{debug, info};

use crate::file::DakFile;
use crate::rule::{FileType, RuleDescriptor, ValidationContext, ValidationRule, Violation};
use crate::rules::{self, process::business_rule_task_ids};
use crate::summary::DakValidationSummary;

const READ_RULE_ID: &str = "file-readable";

#[derive(Default)]
pub struct ValidationEngine {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl ValidationEngine {
    /// An engine with no rules.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_rules() -> Self {
        let mut engine = Self::new();
        for rule in rules::default_rules() {
            engine.register(rule);
        }
        engine
    }

    /// Append a rule. A rule whose id is already registered replaces the
    /// earlier one in place.
    pub fn register(&mut self, rule: Box<dyn ValidationRule>) {
        match self.rules.iter().position(|r| r.id() == rule.id()) {
            Some(index) => self.rules[index] = rule,
            None => self.rules.push(rule),
        }
    }

    pub fn rules(&self) -> Vec<RuleDescriptor> {
        self.rules
            .iter()
            .map(|rule| RuleDescriptor::of(rule.as_ref()))
            .collect()
    }

    /// Whether any registered rule needs the content of `path`. Paths for
    /// which this is false can be validated as [`DakFile::listed`].
    pub fn reads_content(&self, path: &str) -> bool {
        self.rules
            .iter()
            .any(|rule| rule.reads_content() && rule.applies_to(path))
    }

    /// One file on its own; cross-file rules report nothing.
    pub fn validate_file(&self, file: &DakFile) -> Vec<Violation> {
        self.run(file, &ValidationContext::single_file())
    }

    /// The whole file set, with cross-file context.
    pub fn validate_files(&self, files: &[DakFile]) -> DakValidationSummary {
        let ctx = build_context(files);
        let violations: Vec<Violation> =
            files.iter().flat_map(|file| self.run(file, &ctx)).collect();
        let summary = DakValidationSummary::new(files, violations);
        info!(
            files = summary.files_checked,
            errors = summary.error_count,
            warnings = summary.warning_count,
            "validation pass complete"
        );
        summary
    }

    fn run(&self, file: &DakFile, ctx: &ValidationContext) -> Vec<Violation> {
        if let Some(reason) = &file.read_error {
            return vec![Violation {
                rule_id: READ_RULE_ID.into(),
                component: "repository".into(),
                level: ValidationLevel::Error,
                file_path: file.path.clone(),
                code: "READ_ERROR".into(),
                message: format!("could not read file: {reason}"),
                line: None,
                column: None,
                suggestion: None,
            }];
        }

        let mut violations = Vec::new();
        let applicable = self
            .rules
            .iter()
            .filter(|r| r.applies_to(&file.path) && !(file.path_only && r.reads_content()));
        for rule in applicable {
            let findings = rule.validate(file, ctx);
            debug!(rule = rule.id(), path = %file.path, count = findings.len(), "rule ran");
            violations.extend(
                findings
                    .into_iter()
                    .map(|finding| Violation::from_finding(rule.as_ref(), &file.path, finding)),
            );
        }
        violations
    }
}

fn build_context(files: &[DakFile]) -> ValidationContext {
    let mut ctx = ValidationContext {
        cross_file: true,
        ..Default::default()
    };
    for file in files {
        if file.read_error.is_none() && !file.path_only && FileType::of(&file.path) == Some(FileType::Bpmn) {
            ctx.business_rule_task_ids
                .extend(business_rule_task_ids(&file.content));
        }
    }
    ctx
}
