//! Generic business processes and workflows, persisted as BPMN 2.0 XML.

use serde::{Deserialize, Serialize};

use super::xml;
use super::{ComponentData, ComponentKind, DakComponent, SerializationError, non_blank};
use crate::validation::{ValidationIssue, ValidationResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessProcessWorkflow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Verbatim BPMN document.
    #[serde(default, rename = "bpmnXML", skip_serializing_if = "Option::is_none")]
    pub bpmn_xml: Option<String>,
}

impl ComponentData for BusinessProcessWorkflow {
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

pub struct BusinessProcessComponent;

impl DakComponent for BusinessProcessComponent {
    type Data = BusinessProcessWorkflow;

    const KIND: ComponentKind = ComponentKind::BusinessProcesses;

    fn serialize_to_file(&self, data: &BusinessProcessWorkflow) -> Result<String, SerializationError> {
        if let Some(bpmn) = data.bpmn_xml.as_ref().filter(|x| !x.trim().is_empty()) {
            if !xml::has_wrapper(bpmn, "definitions") {
                return Err(SerializationError::Malformed {
                    kind: Self::KIND,
                    reason: "BPMN payload lacks a <definitions> wrapper".into(),
                });
            }
            return Ok(bpmn.clone());
        }

        let id = xml::escape(data.id().unwrap_or(Self::KIND.placeholder_id()));
        let name = xml::escape(data.label().unwrap_or_default());
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str(&format!(
            "<bpmn:definitions xmlns:bpmn=\"http://www.omg.org/spec/BPMN/20100524/MODEL\" \
             xmlns:bpmndi=\"http://www.omg.org/spec/BPMN/20100524/DI\" \
             id=\"Definitions_{id}\" targetNamespace=\"http://bpmn.io/schema/bpmn\">\n"
        ));
        out.push_str(&format!(
            "  <bpmn:process id=\"{id}\" name=\"{name}\" isExecutable=\"false\">\n"
        ));
        if let Some(description) = non_blank(&data.description) {
            out.push_str(&format!(
                "    <bpmn:documentation>{}</bpmn:documentation>\n",
                xml::escape(description)
            ));
        }
        out.push_str("    <bpmn:startEvent id=\"StartEvent_1\" />\n");
        out.push_str("  </bpmn:process>\n");
        out.push_str("</bpmn:definitions>\n");
        Ok(out)
    }

    fn parse_from_file(&self, content: &str) -> Result<BusinessProcessWorkflow, SerializationError> {
        let process = xml::find_elements(content, "process").into_iter().next();
        let id = process
            .as_ref()
            .and_then(|p| p.non_empty_attr("id"))
            .map(str::to_string);
        let name = process
            .as_ref()
            .and_then(|p| p.non_empty_attr("name"))
            .map(str::to_string);
        Ok(BusinessProcessWorkflow {
            id,
            name,
            description: xml::element_text(content, "documentation"),
            bpmn_xml: Some(content.to_string()),
        })
    }

    fn validate(&self, data: &BusinessProcessWorkflow) -> ValidationResult {
        let mut result = ValidationResult::new();
        if data.id().is_none() {
            result.warning(
                ValidationIssue::new("MISSING_ID", "id is not set; one is assigned on save")
                    .on_field("id"),
            );
        }

        match non_blank(&data.bpmn_xml) {
            Some(bpmn) if !xml::has_wrapper(bpmn, "definitions") => {
                result.error(
                    ValidationIssue::new(
                        "INVALID_BPMN",
                        "BPMN content must open and close a <definitions> element",
                    )
                    .on_field("bpmnXML"),
                );
            }
            Some(_) => {}
            None if data.label().is_none() => {
                result.error(
                    ValidationIssue::new("MISSING_NAME", "a name or BPMN content is required")
                        .on_field("name"),
                );
            }
            None => {}
        }

        if let Some(bpmn) = non_blank(&data.bpmn_xml)
            && xml::find_elements(bpmn, "process").is_empty()
        {
            result.warning(ValidationIssue::new(
                "NO_PROCESS",
                "BPMN content declares no <process> element",
            ));
        }
        result
    }
}
