//! Program indicators, persisted as JSON documents.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{
    ComponentData, ComponentKind, DakComponent, SerializationError, check_identity, non_blank,
};
use crate::validation::{ValidationIssue, ValidationResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramIndicator {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numerator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denominator: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disaggregation: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ComponentData for ProgramIndicator {
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

pub struct IndicatorComponent;

impl DakComponent for IndicatorComponent {
    type Data = ProgramIndicator;

    const KIND: ComponentKind = ComponentKind::Indicators;

    fn serialize_to_file(&self, data: &ProgramIndicator) -> Result<String, SerializationError> {
        let mut json = serde_json::to_string_pretty(data)?;
        json.push('\n');
        Ok(json)
    }

    fn parse_from_file(&self, content: &str) -> Result<ProgramIndicator, SerializationError> {
        Ok(serde_json::from_str(content)?)
    }

    fn validate(&self, data: &ProgramIndicator) -> ValidationResult {
        let mut result = ValidationResult::new();
        check_identity(&mut result, &data.id, &data.name, "name");
        if non_blank(&data.numerator).is_none() {
            result.warning(
                ValidationIssue::new("MISSING_NUMERATOR", "indicator has no numerator")
                    .on_field("numerator"),
            );
        }
        if non_blank(&data.denominator).is_none() {
            result.warning(
                ValidationIssue::new("MISSING_DENOMINATOR", "indicator has no denominator")
                    .on_field("denominator"),
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let indicator = ProgramIndicator {
            id: Some("ANC.IND.1".into()),
            name: Some("ANC coverage".into()),
            numerator: Some("Women with 1+ contacts".into()),
            denominator: Some("Expected pregnancies".into()),
            disaggregation: vec!["age".into()],
            ..Default::default()
        };
        let json = IndicatorComponent.serialize_to_file(&indicator).unwrap();
        let parsed = IndicatorComponent.parse_from_file(&json).unwrap();
        assert_eq!(parsed, indicator);
        assert!(IndicatorComponent.validate(&parsed).warnings.is_empty());
    }

    #[test]
    fn warns_without_numerator_or_denominator() {
        let indicator = ProgramIndicator {
            id: Some("i".into()),
            name: Some("Coverage".into()),
            ..Default::default()
        };
        let result = IndicatorComponent.validate(&indicator);
        assert!(result.is_valid);
        assert!(result.has_warning("MISSING_NUMERATOR"));
        assert!(result.has_warning("MISSING_DENOMINATOR"));
    }
}
