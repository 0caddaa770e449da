//! Test scenarios, persisted as Gherkin feature files.
//!
//! The component id travels as an `@id:<id>` tag on the line above `Feature:`.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{
    ComponentData, ComponentKind, DakComponent, SerializationError, check_identity, non_blank,
};
use crate::validation::{ValidationIssue, ValidationResult};

static FEATURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*Feature:[ \t]*(.*)$").unwrap());

const STEP_KEYWORDS: &[&str] = &["Given ", "When ", "Then ", "And ", "But ", "* "];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioCase {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestScenario {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scenarios: Vec<ScenarioCase>,
    /// Verbatim Gherkin source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,
}

impl ComponentData for TestScenario {
    fn id(&self) -> Option<&str> {
        non_blank(&self.id)
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn label(&self) -> Option<&str> {
        non_blank(&self.name)
    }
}

pub struct TestScenarioComponent;

impl DakComponent for TestScenarioComponent {
    type Data = TestScenario;

    const KIND: ComponentKind = ComponentKind::TestScenarios;

    fn serialize_to_file(&self, data: &TestScenario) -> Result<String, SerializationError> {
        if let Some(feature) = data.feature.as_ref().filter(|f| !f.trim().is_empty()) {
            if !FEATURE.is_match(feature) {
                return Err(SerializationError::Malformed {
                    kind: Self::KIND,
                    reason: "Gherkin source has no `Feature:` line".into(),
                });
            }
            return Ok(feature.clone());
        }

        let mut out = String::new();
        if let Some(id) = data.id() {
            out.push_str(&format!("@id:{id}\n"));
        }
        out.push_str(&format!("Feature: {}\n", data.label().unwrap_or("Untitled feature")));
        if let Some(description) = non_blank(&data.description) {
            for line in description.lines() {
                out.push_str(&format!("  {}\n", line.trim()));
            }
        }
        for case in &data.scenarios {
            out.push_str(&format!("\n  Scenario: {}\n", case.name));
            for step in &case.steps {
                out.push_str(&format!("    {step}\n"));
            }
        }
        Ok(out)
    }

    fn parse_from_file(&self, content: &str) -> Result<TestScenario, SerializationError> {
        let id = content
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with('@'))
            .flat_map(str::split_whitespace)
            .find_map(|tag| tag.strip_prefix("@id:"))
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        let mut name = None;
        let mut description = Vec::new();
        let mut scenarios: Vec<ScenarioCase> = Vec::new();
        let mut in_feature = false;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('@') {
                continue;
            }
            if let Some(rest) = line.strip_prefix("Feature:") {
                name = Some(rest.trim().to_string()).filter(|n| !n.is_empty());
                in_feature = true;
            } else if let Some(rest) = line
                .strip_prefix("Scenario Outline:")
                .or_else(|| line.strip_prefix("Scenario:"))
                .or_else(|| line.strip_prefix("Example:"))
            {
                scenarios.push(ScenarioCase {
                    name: rest.trim().to_string(),
                    steps: Vec::new(),
                });
                in_feature = false;
            } else if line.starts_with("Background:") || line.starts_with("Examples:") {
                in_feature = false;
            } else if STEP_KEYWORDS.iter().any(|k| line.starts_with(k)) {
                if let Some(case) = scenarios.last_mut() {
                    case.steps.push(line.to_string());
                }
            } else if in_feature {
                description.push(line);
            }
        }

        Ok(TestScenario {
            id,
            name,
            description: Some(description.join("\n")).filter(|d| !d.is_empty()),
            scenarios,
            feature: Some(content.to_string()),
        })
    }

    fn validate(&self, data: &TestScenario) -> ValidationResult {
        let mut result = ValidationResult::new();
        check_identity(&mut result, &data.id, &data.name, "name");
        if let Some(feature) = non_blank(&data.feature)
            && !FEATURE.is_match(feature)
        {
            result.error(ValidationIssue::new(
                "MALFORMED_FEATURE",
                "Gherkin source has no `Feature:` line",
            ));
        }
        if data.scenarios.is_empty() {
            result.warning(
                ValidationIssue::new("NO_SCENARIOS", "feature declares no scenarios")
                    .on_field("scenarios"),
            );
        }
        for case in data.scenarios.iter().filter(|c| c.steps.is_empty()) {
            result.warning(
                ValidationIssue::new(
                    "EMPTY_SCENARIO",
                    format!("scenario `{}` has no steps", case.name),
                )
                .on_field("scenarios"),
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEATURE_FILE: &str = "@anc @id:anc-danger-signs\nFeature: Danger sign screening\n  Checks referral on danger signs\n\n  Background:\n    Given a registered client\n\n  Scenario: Vaginal bleeding\n    Given the client reports vaginal bleeding\n    When the health worker records it\n    Then the client is referred\n\n  Scenario: No danger signs\n";

    #[test]
    fn parses_tags_feature_and_scenarios() {
        let parsed = TestScenarioComponent.parse_from_file(FEATURE_FILE).unwrap();
        assert_eq!(parsed.id.as_deref(), Some("anc-danger-signs"));
        assert_eq!(parsed.name.as_deref(), Some("Danger sign screening"));
        assert_eq!(parsed.description.as_deref(), Some("Checks referral on danger signs"));
        assert_eq!(parsed.scenarios.len(), 2);
        assert_eq!(parsed.scenarios[0].steps.len(), 3);

        let result = TestScenarioComponent.validate(&parsed);
        assert!(result.is_valid);
        assert!(result.has_warning("EMPTY_SCENARIO"));
        assert_eq!(TestScenarioComponent.serialize_to_file(&parsed).unwrap(), FEATURE_FILE);
    }

    #[test]
    fn generated_feature_roundtrips() {
        let data = TestScenario {
            id: Some("anc-reg".into()),
            name: Some("Registration".into()),
            description: None,
            scenarios: vec![ScenarioCase {
                name: "New client".into(),
                steps: vec!["Given a new client".into(), "Then a record exists".into()],
            }],
            feature: None,
        };
        let text = TestScenarioComponent.serialize_to_file(&data).unwrap();
        assert!(text.starts_with("@id:anc-reg\nFeature: Registration\n"));
        let parsed = TestScenarioComponent.parse_from_file(&text).unwrap();
        assert_eq!(parsed.scenarios, data.scenarios);
        assert_eq!(parsed.id, data.id);
        assert_eq!(
            TestScenarioComponent.determine_file_path(&parsed),
            "input/testing/anc-reg.feature"
        );
    }

    #[test]
    fn feature_without_header_is_malformed() {
        let data = TestScenario {
            name: Some("x".into()),
            feature: Some("Scenario: orphan".into()),
            ..Default::default()
        };
        assert!(TestScenarioComponent.serialize_to_file(&data).is_err());
        let result = TestScenarioComponent.validate(&data);
        assert!(result.has_error("MALFORMED_FEATURE"));
        assert!(result.has_warning("NO_SCENARIOS"));
    }
}
