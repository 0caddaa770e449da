//! Built-in rules, in registration order.

mod component;
mod manifest;
mod naming;
pub(crate) mod process;
mod sushi;
mod syntax;

pub use component::ComponentInstance;
pub use manifest::DakJsonStructure;
pub use naming::FileNaming;
pub use process::{BpmnBusinessRuleTaskId, DmnBpmnCrossReference, DmnDecisionAttributes};
pub use sushi::SushiConfigDependency;
pub use syntax::{JsonValid, XmlWellFormed};

use crate::rule::ValidationRule;

/// Every built-in rule. Syntax checks come first so their findings lead each
/// file's list.
pub fn default_rules() -> Vec<Box<dyn ValidationRule>> {
    vec![
        Box::new(XmlWellFormed),
        Box::new(JsonValid),
        Box::new(BpmnBusinessRuleTaskId),
        Box::new(DmnDecisionAttributes),
        Box::new(DmnBpmnCrossReference),
        Box::new(SushiConfigDependency),
        Box::new(DakJsonStructure),
        Box::new(FileNaming),
        Box::new(ComponentInstance),
    ]
}
