//! Lowercase-hyphenated file names.

use smartdak_core::ValidationLevel;

use crate::file::DakFile;
use crate::rule::{FileType, Finding, ValidationContext, ValidationRule};

pub struct FileNaming;

fn is_permitted(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

impl ValidationRule for FileNaming {
    fn id(&self) -> &'static str {
        "file-naming"
    }

    fn component(&self) -> &'static str {
        "repository"
    }

    fn level(&self) -> ValidationLevel {
        ValidationLevel::Warning
    }

    fn file_types(&self) -> &'static [FileType] {
        &[FileType::Any]
    }

    fn reads_content(&self) -> bool {
        false
    }

    fn description(&self) -> &'static str {
        "file names should be lowercase and hyphenated; spaces and other characters are errors"
    }

    fn validate(&self, file: &DakFile, _ctx: &ValidationContext) -> Vec<Finding> {
        let name = file.file_name();
        let mut findings = Vec::new();

        if name.contains(char::is_whitespace) {
            findings.push(
                Finding::new("FILENAME_HAS_SPACES", format!("`{name}` contains whitespace"))
                    .with_level(ValidationLevel::Error)
                    .suggest(name.split_whitespace().collect::<Vec<_>>().join("-")),
            );
        }
        let mut invalid: Vec<char> = name
            .chars()
            .filter(|c| !c.is_whitespace() && !is_permitted(*c))
            .collect();
        invalid.dedup();
        if !invalid.is_empty() {
            let chars: String = invalid.into_iter().collect();
            findings.push(
                Finding::new(
                    "FILENAME_INVALID_CHARACTERS",
                    format!("`{name}` contains characters outside [a-z0-9._-]: {chars:?}"),
                )
                .with_level(ValidationLevel::Error),
            );
        }
        if name.chars().any(|c| c.is_ascii_uppercase()) {
            findings.push(
                Finding::new("FILENAME_UPPERCASE", format!("`{name}` contains uppercase letters"))
                    .suggest(name.to_ascii_lowercase()),
            );
        }
        if name.contains('_') {
            findings.push(
                Finding::new("FILENAME_UNDERSCORE", format!("`{name}` contains underscores"))
                    .suggest(name.replace('_', "-")),
            );
        }
        findings
    }
}
