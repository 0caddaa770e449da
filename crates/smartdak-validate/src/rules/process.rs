//! BPMN and DMN identity rules, and the decision-to-task cross reference.

use smartdak_core::ValidationLevel;
use smartdak_core::component::xml::{ElementMatch, find_elements};

use crate::file::DakFile;
use crate::rule::{FileType, Finding, ValidationContext, ValidationRule};

pub(crate) const BUSINESS_RULE_TASK: &str = "businessRuleTask";
const DECISION: &str = "decision";

/// Non-empty `businessRuleTask/@id` values of one BPMN document.
pub(crate) fn business_rule_task_ids(content: &str) -> impl Iterator<Item = String> + '_ {
    find_elements(content, BUSINESS_RULE_TASK)
        .into_iter()
        .filter_map(|task| task.non_empty_attr("id").map(str::to_string))
}

pub struct BpmnBusinessRuleTaskId;

impl ValidationRule for BpmnBusinessRuleTaskId {
    fn id(&self) -> &'static str {
        "bpmn-business-rule-task-id"
    }

    fn component(&self) -> &'static str {
        "business-processes"
    }

    fn level(&self) -> ValidationLevel {
        ValidationLevel::Error
    }

    fn file_types(&self) -> &'static [FileType] {
        &[FileType::Bpmn]
    }

    fn description(&self) -> &'static str {
        "every businessRuleTask must carry a non-empty id"
    }

    fn validate(&self, file: &DakFile, _ctx: &ValidationContext) -> Vec<Finding> {
        find_elements(&file.content, BUSINESS_RULE_TASK)
            .into_iter()
            .filter(|task| task.non_empty_attr("id").is_none())
            .map(|task| {
                Finding::new(
                    "BPMN_TASK_MISSING_ID",
                    format!("<{}> has no id attribute", task.name),
                )
                .at_line(task.line)
                .suggest("set the id to the id of the DMN decision the task invokes")
            })
            .collect()
    }
}

pub struct DmnDecisionAttributes;

impl ValidationRule for DmnDecisionAttributes {
    fn id(&self) -> &'static str {
        "dmn-decision-id-label"
    }

    fn component(&self) -> &'static str {
        "decision-logic"
    }

    fn level(&self) -> ValidationLevel {
        ValidationLevel::Error
    }

    fn file_types(&self) -> &'static [FileType] {
        &[FileType::Dmn]
    }

    fn description(&self) -> &'static str {
        "every DMN decision must carry both id and label"
    }

    fn validate(&self, file: &DakFile, _ctx: &ValidationContext) -> Vec<Finding> {
        find_elements(&file.content, DECISION)
            .into_iter()
            .filter_map(|decision| {
                let missing = missing_attributes(&decision, &["id", "label"]);
                if missing.is_empty() {
                    return None;
                }
                let subject = match decision.non_empty_attr("id") {
                    Some(id) => format!("decision `{id}`"),
                    None => format!("<{}>", decision.name),
                };
                Some(
                    Finding::new(
                        "DMN_DECISION_MISSING_ATTRIBUTES",
                        format!("{subject} is missing {}", missing.join(" and ")),
                    )
                    .at_line(decision.line),
                )
            })
            .collect()
    }
}

fn missing_attributes<'a>(element: &ElementMatch, names: &[&'a str]) -> Vec<&'a str> {
    names
        .iter()
        .copied()
        .filter(|name| element.non_empty_attr(name).is_none())
        .collect()
}

/// Each DMN decision should be invoked by a BPMN businessRuleTask of the
/// same id somewhere in the DAK.
pub struct DmnBpmnCrossReference;

impl ValidationRule for DmnBpmnCrossReference {
    fn id(&self) -> &'static str {
        "dmn-bpmn-cross-reference"
    }

    fn component(&self) -> &'static str {
        "decision-logic"
    }

    fn level(&self) -> ValidationLevel {
        ValidationLevel::Warning
    }

    fn file_types(&self) -> &'static [FileType] {
        &[FileType::Dmn]
    }

    fn description(&self) -> &'static str {
        "every DMN decision id should match a BPMN businessRuleTask id"
    }

    fn validate(&self, file: &DakFile, ctx: &ValidationContext) -> Vec<Finding> {
        if !ctx.cross_file {
            return Vec::new();
        }
        let known = if ctx.business_rule_task_ids.is_empty() {
            "none".to_string()
        } else {
            ctx.business_rule_task_ids
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        };
        find_elements(&file.content, DECISION)
            .into_iter()
            .filter_map(|decision| {
                let id = decision.non_empty_attr("id")?;
                if ctx.business_rule_task_ids.contains(id) {
                    return None;
                }
                Some(
                    Finding::new(
                        "DMN_DECISION_UNREFERENCED",
                        format!(
                            "decision `{id}` is not invoked by any businessRuleTask \
                             (known businessRuleTask ids: {known})"
                        ),
                    )
                    .at_line(decision.line)
                    .suggest(format!(
                        "add a businessRuleTask with id=\"{id}\" to the process that uses it"
                    )),
                )
            })
            .collect()
    }
}
