//! Functional and non-functional requirements, persisted as Markdown.

use serde::{Deserialize, Serialize};

use super::markdown::{self, MarkdownDoc};
use super::{
    ComponentData, ComponentKind, DakComponent, SerializationError, check_identity, non_blank,
};
use crate::validation::{ValidationIssue, ValidationResult};

const FUNCTIONAL: &str = "Functional Requirements";
const NON_FUNCTIONAL: &str = "Non-Functional Requirements";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functional: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub non_functional: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
}

impl ComponentData for Requirements {
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

pub struct RequirementsComponent;

impl DakComponent for RequirementsComponent {
    type Data = Requirements;

    const KIND: ComponentKind = ComponentKind::Requirements;

    fn serialize_to_file(&self, data: &Requirements) -> Result<String, SerializationError> {
        if let Some(md) = data.markdown.as_ref().filter(|m| !m.trim().is_empty()) {
            return Ok(md.clone());
        }
        let mut out = markdown::front_matter(data.id());
        out.push_str(&format!("# {}\n\n", data.label().unwrap_or("Requirements")));
        if let Some(description) = non_blank(&data.description) {
            out.push_str(description);
            out.push_str("\n\n");
        }
        markdown::write_section(&mut out, FUNCTIONAL, &markdown::bullet_list(&data.functional));
        markdown::write_section(
            &mut out,
            NON_FUNCTIONAL,
            &markdown::bullet_list(&data.non_functional),
        );
        Ok(out.trim_end().to_string() + "\n")
    }

    fn parse_from_file(&self, content: &str) -> Result<Requirements, SerializationError> {
        let doc = MarkdownDoc::parse(content);
        Ok(Requirements {
            functional: doc.items(&[FUNCTIONAL, "Functional"]),
            non_functional: doc.items(&[NON_FUNCTIONAL, "Non-functional", "Nonfunctional Requirements"]),
            id: doc.id,
            title: doc.title,
            description: Some(doc.preamble).filter(|p| !p.is_empty()),
            markdown: Some(content.to_string()),
        })
    }

    fn validate(&self, data: &Requirements) -> ValidationResult {
        let mut result = ValidationResult::new();
        check_identity(&mut result, &data.id, &data.title, "title");
        if data.functional.is_empty() && data.non_functional.is_empty() {
            result.warning(ValidationIssue::new(
                "NO_REQUIREMENTS",
                "neither functional nor non-functional requirements are listed",
            ));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_functional_and_non_functional() {
        let data = Requirements {
            id: Some("anc-reqs".into()),
            title: Some("ANC requirements".into()),
            description: None,
            functional: vec!["FXREQ.001 Register a client".into()],
            non_functional: vec!["NFXREQ.001 Works offline".into()],
            markdown: None,
        };
        let md = RequirementsComponent.serialize_to_file(&data).unwrap();
        let parsed = RequirementsComponent.parse_from_file(&md).unwrap();
        assert_eq!(parsed.functional, data.functional);
        assert_eq!(parsed.non_functional, data.non_functional);
        assert_eq!(parsed.id, data.id);
    }

    #[test]
    fn empty_requirements_warn() {
        let data = Requirements {
            title: Some("Draft".into()),
            ..Default::default()
        };
        let result = RequirementsComponent.validate(&data);
        assert!(result.is_valid);
        assert!(result.has_warning("NO_REQUIREMENTS"));
        assert!(result.has_warning("MISSING_ID"));
    }
}
