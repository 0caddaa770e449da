//! Core types for DAK authoring: repository context, component sources,
//! the `dak.json` manifest, validation results and per-kind component objects.

pub mod component;
pub mod manifest;
pub mod repository;
pub mod source;
pub mod validation;

pub use component::{
    ComponentData, ComponentKind, DakComponent, DynComponent, SerializationError, all_components,
    component_for,
};
pub use manifest::{DAK_JSON_PATH, DakManifest, DakMetadata, ManifestError, Publisher};
pub use repository::{DEFAULT_BRANCH, DakRepository, RepoContext};
pub use source::{
    DakComponentSource, PERMITTED_ROOT, PathViolation, ResolvedSource, SourceError,
    SourceLocation, SourceMetadata, SourceType, SourceValidationReport, determine_source_type,
    normalize_relative_path, validate_source,
};
pub use validation::{ValidationIssue, ValidationLevel, ValidationResult};
