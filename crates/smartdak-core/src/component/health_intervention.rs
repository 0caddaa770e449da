//! Health interventions and recommendations, persisted as Markdown.

use serde::{Deserialize, Serialize};

use super::markdown::{self, MarkdownDoc};
use super::{
    ComponentData, ComponentKind, DakComponent, SerializationError, check_identity, non_blank,
};
use crate::validation::{ValidationIssue, ValidationResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthInterventions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
    /// Guideline citations, usually URLs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
}

impl ComponentData for HealthInterventions {
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

pub struct HealthInterventionComponent;

impl DakComponent for HealthInterventionComponent {
    type Data = HealthInterventions;

    const KIND: ComponentKind = ComponentKind::HealthInterventions;

    fn serialize_to_file(&self, data: &HealthInterventions) -> Result<String, SerializationError> {
        if let Some(md) = data.markdown.as_ref().filter(|m| !m.trim().is_empty()) {
            return Ok(md.clone());
        }
        let mut out = markdown::front_matter(data.id());
        out.push_str(&format!("# {}\n\n", data.label().unwrap_or("Untitled intervention")));
        if let Some(description) = non_blank(&data.description) {
            out.push_str(description);
            out.push_str("\n\n");
        }
        markdown::write_section(
            &mut out,
            "Recommendations",
            &markdown::bullet_list(&data.recommendations),
        );
        if !data.references.is_empty() {
            markdown::write_section(&mut out, "References", &markdown::bullet_list(&data.references));
        }
        Ok(out.trim_end().to_string() + "\n")
    }

    fn parse_from_file(&self, content: &str) -> Result<HealthInterventions, SerializationError> {
        let doc = MarkdownDoc::parse(content);
        Ok(HealthInterventions {
            recommendations: doc.items(&["Recommendations", "Interventions"]),
            references: doc.items(&["References", "Sources"]),
            id: doc.id,
            title: doc.title,
            description: Some(doc.preamble).filter(|p| !p.is_empty()),
            markdown: Some(content.to_string()),
        })
    }

    fn validate(&self, data: &HealthInterventions) -> ValidationResult {
        let mut result = ValidationResult::new();
        check_identity(&mut result, &data.id, &data.title, "title");
        if data.recommendations.is_empty() {
            result.warning(
                ValidationIssue::new("NO_RECOMMENDATIONS", "no recommendations are listed")
                    .on_field("recommendations"),
            );
        }
        result
    }
}
