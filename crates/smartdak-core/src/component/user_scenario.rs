//! User scenarios, persisted as Markdown narratives.

use serde::{Deserialize, Serialize};

use super::markdown::{self, MarkdownDoc};
use super::{
    ComponentData, ComponentKind, DakComponent, SerializationError, check_identity, non_blank,
};
use crate::validation::{ValidationIssue, ValidationResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserScenario {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<String>,
    /// Verbatim Markdown source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
}

impl ComponentData for UserScenario {
    fn id(&self) -> Option<&str> {
        non_blank(&self.id)
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn label(&self) -> Option<&str> {
        non_blank(&self.title)
    }
}

pub struct UserScenarioComponent;

impl DakComponent for UserScenarioComponent {
    type Data = UserScenario;

    const KIND: ComponentKind = ComponentKind::UserScenarios;

    fn serialize_to_file(&self, data: &UserScenario) -> Result<String, SerializationError> {
        if let Some(md) = data.markdown.as_ref().filter(|m| !m.trim().is_empty()) {
            return Ok(md.clone());
        }
        let mut out = markdown::front_matter(data.id());
        out.push_str(&format!("# {}\n\n", data.label().unwrap_or("Untitled scenario")));
        if let Some(description) = non_blank(&data.description) {
            out.push_str(description);
            out.push_str("\n\n");
        }
        markdown::write_section(&mut out, "Actors", &markdown::bullet_list(&data.actors));
        markdown::write_section(&mut out, "Steps", &markdown::numbered_list(&data.steps));
        Ok(out.trim_end().to_string() + "\n")
    }

    fn parse_from_file(&self, content: &str) -> Result<UserScenario, SerializationError> {
        let doc = MarkdownDoc::parse(content);
        Ok(UserScenario {
            actors: doc.items(&["Actors", "Personas"]),
            steps: doc.items(&["Steps", "Workflow", "Flow"]),
            id: doc.id,
            title: doc.title,
            description: Some(doc.preamble).filter(|p| !p.is_empty()),
            markdown: Some(content.to_string()),
        })
    }

    fn validate(&self, data: &UserScenario) -> ValidationResult {
        let mut result = ValidationResult::new();
        check_identity(&mut result, &data.id, &data.title, "title");
        if data.actors.is_empty() {
            result.warning(
                ValidationIssue::new("NO_ACTORS", "scenario names no actors").on_field("actors"),
            );
        }
        if data.steps.is_empty() {
            result.warning(
                ValidationIssue::new("NO_STEPS", "scenario lists no steps").on_field("steps"),
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visit() -> UserScenario {
        UserScenario {
            id: Some("anc-first-visit".into()),
            title: Some("First ANC visit".into()),
            description: Some("A woman attends her first contact.".into()),
            actors: vec!["Client".into(), "Midwife".into()],
            steps: vec!["Register client".into(), "Take history".into()],
            markdown: None,
        }
    }

    #[test]
    fn serialize_then_parse() {
        let md = UserScenarioComponent.serialize_to_file(&visit()).unwrap();
        assert!(md.starts_with("---\nid: anc-first-visit\n---\n\n# First ANC visit\n"));
        let parsed = UserScenarioComponent.parse_from_file(&md).unwrap();
        assert_eq!(parsed.id, visit().id);
        assert_eq!(parsed.title, visit().title);
        assert_eq!(parsed.description, visit().description);
        assert_eq!(parsed.actors, visit().actors);
        assert_eq!(parsed.steps, visit().steps);
        assert_eq!(UserScenarioComponent.serialize_to_file(&parsed).unwrap(), md);
    }

    #[test]
    fn warns_about_empty_lists() {
        let scenario = UserScenario {
            actors: vec![],
            steps: vec![],
            ..visit()
        };
        let result = UserScenarioComponent.validate(&scenario);
        assert!(result.is_valid);
        assert!(result.has_warning("NO_ACTORS"));
        assert!(result.has_warning("NO_STEPS"));
        assert!(
            UserScenarioComponent
                .validate(&UserScenario::default())
                .has_error("MISSING_TITLE")
        );
    }
}
