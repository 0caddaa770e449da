//! Core data elements, persisted as JSON documents.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{
    ComponentData, ComponentKind, DakComponent, SerializationError, check_identity, non_blank,
};
use crate::validation::{ValidationIssue, ValidationResult};

/// Terminology binding for a data element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coding {
    pub system: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreDataElement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_set: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub codes: Vec<Coding>,
    /// Fields this model does not know about, preserved on rewrite.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ComponentData for CoreDataElement {
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

/// Data types accepted without a warning.
const KNOWN_TYPES: &[&str] = &[
    "boolean", "code", "Coding", "CodeableConcept", "date", "dateTime", "decimal", "integer",
    "string", "Quantity", "Reference",
];

pub struct DataElementComponent;

impl DakComponent for DataElementComponent {
    type Data = CoreDataElement;

    const KIND: ComponentKind = ComponentKind::DataElements;

    fn serialize_to_file(&self, data: &CoreDataElement) -> Result<String, SerializationError> {
        let mut json = serde_json::to_string_pretty(data)?;
        json.push('\n');
        Ok(json)
    }

    fn parse_from_file(&self, content: &str) -> Result<CoreDataElement, SerializationError> {
        Ok(serde_json::from_str(content)?)
    }

    fn validate(&self, data: &CoreDataElement) -> ValidationResult {
        let mut result = ValidationResult::new();
        check_identity(&mut result, &data.id, &data.name, "name");
        match non_blank(&data.data_type) {
            None => result.warning(
                ValidationIssue::new("MISSING_DATA_TYPE", "data type is not set").on_field("type"),
            ),
            Some(t) if !KNOWN_TYPES.contains(&t) => result.warning(
                ValidationIssue::new("UNKNOWN_DATA_TYPE", format!("data type `{t}` is not a recognised FHIR type"))
                    .on_field("type"),
            ),
            Some(_) => {}
        }
        for coding in &data.codes {
            if coding.system.trim().is_empty() || coding.code.trim().is_empty() {
                result.error(
                    ValidationIssue::new("INCOMPLETE_CODING", "every coding needs a system and a code")
                        .on_field("codes"),
                );
                break;
            }
        }
        result
    }
}
