//! Decision-support logic, persisted as DMN 1.3 decision tables.

use serde::{Deserialize, Serialize};

use super::xml;
use super::{ComponentData, ComponentKind, DakComponent, SerializationError, non_blank};
use crate::validation::{ValidationIssue, ValidationResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionSupportLogic {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Ids of every `<decision>` in the document; filled by parsing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decision_ids: Vec<String>,
    /// Verbatim DMN document.
    #[serde(default, rename = "dmnXML", skip_serializing_if = "Option::is_none")]
    pub dmn_xml: Option<String>,
}

impl ComponentData for DecisionSupportLogic {
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

pub struct DecisionLogicComponent;

impl DakComponent for DecisionLogicComponent {
    type Data = DecisionSupportLogic;

    const KIND: ComponentKind = ComponentKind::DecisionLogic;

    fn serialize_to_file(&self, data: &DecisionSupportLogic) -> Result<String, SerializationError> {
        if let Some(dmn) = data.dmn_xml.as_ref().filter(|x| !x.trim().is_empty()) {
            if !xml::has_wrapper(dmn, "definitions") {
                return Err(SerializationError::Malformed {
                    kind: Self::KIND,
                    reason: "DMN payload lacks a <definitions> wrapper".into(),
                });
            }
            return Ok(dmn.clone());
        }

        let id = xml::escape(data.id().unwrap_or(Self::KIND.placeholder_id()));
        let name = xml::escape(data.label().unwrap_or_default());
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str(&format!(
            "<definitions xmlns=\"https://www.omg.org/spec/DMN/20191111/MODEL/\" \
             id=\"Definitions_{id}\" name=\"{name}\" namespace=\"http://smart.who.int/dak\">\n"
        ));
        out.push_str(&format!(
            "  <decision id=\"{id}\" name=\"{name}\" label=\"{name}\">\n"
        ));
        if let Some(description) = non_blank(&data.description) {
            out.push_str(&format!(
                "    <description>{}</description>\n",
                xml::escape(description)
            ));
        }
        out.push_str(&format!(
            "    <decisionTable id=\"DecisionTable_{id}\" hitPolicy=\"UNIQUE\">\n"
        ));
        out.push_str("      <input id=\"Input_1\" label=\"Input\">\n");
        out.push_str("        <inputExpression id=\"InputExpression_1\" typeRef=\"string\">\n");
        out.push_str("          <text></text>\n");
        out.push_str("        </inputExpression>\n");
        out.push_str("      </input>\n");
        out.push_str("      <output id=\"Output_1\" label=\"Output\" name=\"output\" typeRef=\"string\" />\n");
        out.push_str("    </decisionTable>\n");
        out.push_str("  </decision>\n");
        out.push_str("</definitions>\n");
        Ok(out)
    }

    fn parse_from_file(&self, content: &str) -> Result<DecisionSupportLogic, SerializationError> {
        let decisions = xml::find_elements(content, "decision");
        let definitions = xml::find_elements(content, "definitions").into_iter().next();
        let first = decisions.first();

        let id = first
            .and_then(|d| d.non_empty_attr("id"))
            .map(str::to_string);
        let name = first
            .and_then(|d| d.non_empty_attr("label").or_else(|| d.non_empty_attr("name")))
            .or_else(|| definitions.as_ref().and_then(|d| d.non_empty_attr("name")))
            .map(str::to_string);
        let decision_ids = decisions
            .iter()
            .filter_map(|d| d.non_empty_attr("id"))
            .map(str::to_string)
            .collect();

        Ok(DecisionSupportLogic {
            id,
            name,
            description: xml::element_text(content, "description"),
            decision_ids,
            dmn_xml: Some(content.to_string()),
        })
    }

    fn validate(&self, data: &DecisionSupportLogic) -> ValidationResult {
        let mut result = ValidationResult::new();
        if data.id().is_none() {
            result.warning(
                ValidationIssue::new("MISSING_ID", "id is not set; one is assigned on save")
                    .on_field("id"),
            );
        }

        match non_blank(&data.dmn_xml) {
            Some(dmn) if !xml::has_wrapper(dmn, "definitions") => {
                result.error(
                    ValidationIssue::new(
                        "INVALID_DMN",
                        "DMN content must open and close a <definitions> element",
                    )
                    .on_field("dmnXML"),
                );
            }
            Some(dmn) => {
                if xml::find_elements(dmn, "decision").is_empty() {
                    result.warning(ValidationIssue::new(
                        "NO_DECISIONS",
                        "DMN content declares no <decision> element",
                    ));
                }
            }
            None if data.label().is_none() => {
                result.error(
                    ValidationIssue::new("MISSING_NAME", "a name or DMN content is required")
                        .on_field("name"),
                );
            }
            None => {}
        }
        result
    }
}
