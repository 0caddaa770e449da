//! Structure of `dak.json`: known keys and well-formed source entries.

use serde_json::Value;
use smartdak_core::manifest::{METADATA_KEYS, RESERVED_KEYS};
use smartdak_core::{
    ComponentKind, DAK_JSON_PATH, DakComponentSource, DakManifest, ValidationLevel,
    validate_source,
};

use crate::file::DakFile;
use crate::rule::{FileType, Finding, ValidationContext, ValidationRule, line_of};

pub struct DakJsonStructure;

fn key_line(content: &str, key: &str) -> Option<usize> {
    line_of(content, &format!("\"{key}\""))
}

impl ValidationRule for DakJsonStructure {
    fn id(&self) -> &'static str {
        "dak-json-structure"
    }

    fn component(&self) -> &'static str {
        "dak-json"
    }

    fn level(&self) -> ValidationLevel {
        ValidationLevel::Error
    }

    fn file_types(&self) -> &'static [FileType] {
        &[FileType::Json]
    }

    fn description(&self) -> &'static str {
        "dak.json must parse as a manifest whose component sources are well formed"
    }

    fn applies_to(&self, path: &str) -> bool {
        path == DAK_JSON_PATH
    }

    fn validate(&self, file: &DakFile, _ctx: &ValidationContext) -> Vec<Finding> {
        let content = &file.content;
        // Unparseable JSON is json-valid's finding.
        let Ok(root) = serde_json::from_str::<Value>(content) else {
            return Vec::new();
        };
        let Value::Object(root) = root else {
            return vec![Finding::new("DAK_JSON_NOT_OBJECT", "dak.json must be a JSON object")];
        };

        let mut findings = Vec::new();
        for (key, value) in &root {
            if let Some(kind) = ComponentKind::from_manifest_key(key) {
                check_collection(content, kind, value, &mut findings);
            } else if !METADATA_KEYS.contains(&key.as_str()) && !RESERVED_KEYS.contains(&key.as_str())
            {
                findings.push(
                    Finding::new("DAK_JSON_UNKNOWN_KEY", format!("unknown top-level key `{key}`"))
                        .with_level(ValidationLevel::Warning)
                        .maybe_line(key_line(content, key)),
                );
            }
        }

        // Remaining shape problems (e.g. a metadata field of the wrong type).
        if findings.iter().all(|f| f.level == Some(ValidationLevel::Warning))
            && let Err(e) = DakManifest::from_json(content)
        {
            findings.push(Finding::new("DAK_JSON_INVALID", e.to_string()));
        }
        findings
    }
}

fn check_collection(content: &str, kind: ComponentKind, value: &Value, findings: &mut Vec<Finding>) {
    let key = kind.manifest_key();
    let line = key_line(content, key);
    let Value::Array(entries) = value else {
        findings.push(
            Finding::new(
                "DAK_JSON_INVALID_COLLECTION",
                format!("`{key}` must be an array of sources"),
            )
            .maybe_line(line),
        );
        return;
    };

    for (index, entry) in entries.iter().enumerate() {
        let source = match serde_json::from_value::<DakComponentSource>(entry.clone()) {
            Ok(source) => source,
            Err(e) => {
                findings.push(
                    Finding::new("DAK_JSON_INVALID_SOURCE", format!("{key}[{index}]: {e}"))
                        .maybe_line(line),
                );
                continue;
            }
        };
        let report = validate_source(&source);
        for error in report.errors {
            findings.push(
                Finding::new("DAK_JSON_INVALID_SOURCE", format!("{key}[{index}]: {error}"))
                    .maybe_line(line),
            );
        }
        for warning in report.warnings {
            findings.push(
                Finding::new("DAK_JSON_SOURCE_WARNING", format!("{key}[{index}]: {warning}"))
                    .with_level(ValidationLevel::Warning)
                    .maybe_line(line),
            );
        }
    }
}
