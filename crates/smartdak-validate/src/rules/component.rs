//! Files under a component directory must parse through their component
//! object. Findings stay below error level: hard failures belong to the
//! syntax and structure rules.

use smartdak_core::{ComponentKind, ValidationLevel, component_for};

use crate::file::DakFile;
use crate::rule::{FileType, Finding, ValidationContext, ValidationRule};

pub struct ComponentInstance;

impl ValidationRule for ComponentInstance {
    fn id(&self) -> &'static str {
        "component-instance"
    }

    fn component(&self) -> &'static str {
        "components"
    }

    fn level(&self) -> ValidationLevel {
        ValidationLevel::Warning
    }

    fn file_types(&self) -> &'static [FileType] {
        &[FileType::Any]
    }

    fn description(&self) -> &'static str {
        "component files parse and pass their component's checks"
    }

    fn applies_to(&self, path: &str) -> bool {
        ComponentKind::from_path(path).is_some()
    }

    fn validate(&self, file: &DakFile, _ctx: &ValidationContext) -> Vec<Finding> {
        let Some(kind) = ComponentKind::from_path(&file.path) else {
            return Vec::new();
        };
        let component = component_for(kind);
        let data = match component.parse(Some(&file.path), &file.content) {
            Ok(data) => data,
            Err(e) => {
                return vec![Finding::new(
                    "COMPONENT_PARSE_FAILED",
                    format!("{}: {e}", kind.display_name()),
                )];
            }
        };
        let result = component.validate_value(&data);
        let errors = result.errors.into_iter().map(|issue| (issue, ValidationLevel::Warning));
        let warnings = result.warnings.into_iter().map(|issue| (issue, ValidationLevel::Info));
        errors
            .chain(warnings)
            .map(|(issue, level)| {
                Finding::new(issue.code, format!("{}: {}", kind.display_name(), issue.message))
                    .with_level(level)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_component_paths_apply() {
        assert!(ComponentInstance.applies_to("input/process/anc.bpmn"));
        assert!(ComponentInstance.applies_to("input/testing/first-visit.feature"));
        assert!(!ComponentInstance.applies_to("input/images/logo.png"));
        assert!(!ComponentInstance.applies_to("dak.json"));
    }

    #[test]
    fn component_errors_downgrade() {
        let file = DakFile::staged("input/testing/visit.feature", "just prose, no feature line\n");
        let findings = ComponentInstance.validate(&file, &ValidationContext::single_file());
        assert!(!findings.is_empty());
        assert!(
            findings
                .iter()
                .all(|f| f.level != Some(ValidationLevel::Error))
        );
    }

    #[test]
    fn healthy_component_is_quiet_at_warning_level() {
        let feature = "@id:first-visit\nFeature: First visit\n  Scenario: Register\n    Given a client\n    When registered\n    Then an id is issued\n";
        let file = DakFile::staged("input/testing/first-visit.feature", feature);
        let findings = ComponentInstance.validate(&file, &ValidationContext::single_file());
        assert!(
            findings
                .iter()
                .all(|f| f.level == Some(ValidationLevel::Info)),
            "{findings:?}"
        );
    }
}
