//! DAK validation: a registry of independent rules run over the union of
//! staged and committed files before a commit is allowed.

pub mod engine;
pub mod file;
pub mod rule;
pub mod rules;
pub mod summary;

pub use engine::ValidationEngine;
pub use file::{DakFile, FileOrigin};
pub use rule::{FileType, Finding, RuleDescriptor, ValidationContext, ValidationRule, Violation};
pub use summary::{DakValidationSummary, FileReport};
