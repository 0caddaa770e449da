//! Component objects: one implementation per DAK component kind.
//!
//! Every kind offers the same capabilities (locate, serialize, parse, validate)
//! through [`DakComponent`]. [`DynComponent`] is the type-erased view over
//! `serde_json::Value` used by the validation engine and the workbench, and
//! [`component_for`] is the factory map from kind to implementation.

pub mod business_process;
pub mod data_element;
pub mod decision_logic;
pub mod health_intervention;
pub mod indicator;
pub mod markdown;
pub mod persona;
pub mod requirements;
pub mod test_scenario;
pub mod user_scenario;
pub mod xml;

use std::fmt;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::validation::{ValidationIssue, ValidationResult};

pub use business_process::{BusinessProcessComponent, BusinessProcessWorkflow};
pub use data_element::{CoreDataElement, DataElementComponent};
pub use decision_logic::{DecisionLogicComponent, DecisionSupportLogic};
pub use health_intervention::{HealthInterventionComponent, HealthInterventions};
pub use indicator::{IndicatorComponent, ProgramIndicator};
pub use persona::{ActorType, Persona, PersonaComponent};
pub use requirements::{Requirements, RequirementsComponent};
pub use test_scenario::{ScenarioCase, TestScenario, TestScenarioComponent};
pub use user_scenario::{UserScenario, UserScenarioComponent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComponentKind {
    HealthInterventions,
    Personas,
    UserScenarios,
    BusinessProcesses,
    DataElements,
    DecisionLogic,
    Indicators,
    Requirements,
    TestScenarios,
}

impl ComponentKind {
    /// Manifest order.
    pub const ALL: [ComponentKind; 9] = [
        Self::HealthInterventions,
        Self::Personas,
        Self::UserScenarios,
        Self::BusinessProcesses,
        Self::DataElements,
        Self::DecisionLogic,
        Self::Indicators,
        Self::Requirements,
        Self::TestScenarios,
    ];

    /// Key of this kind's source list in `dak.json`.
    pub fn manifest_key(&self) -> &'static str {
        match self {
            Self::HealthInterventions => "healthInterventions",
            Self::Personas => "personas",
            Self::UserScenarios => "userScenarios",
            Self::BusinessProcesses => "businessProcesses",
            Self::DataElements => "dataElements",
            Self::DecisionLogic => "decisionLogic",
            Self::Indicators => "indicators",
            Self::Requirements => "requirements",
            Self::TestScenarios => "testScenarios",
        }
    }

    pub fn from_manifest_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.manifest_key() == key)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::HealthInterventions => "Health Interventions and Recommendations",
            Self::Personas => "Generic Personas",
            Self::UserScenarios => "User Scenarios",
            Self::BusinessProcesses => "Generic Business Processes and Workflows",
            Self::DataElements => "Core Data Elements",
            Self::DecisionLogic => "Decision-Support Logic",
            Self::Indicators => "Program Indicators",
            Self::Requirements => "Functional and Non-Functional Requirements",
            Self::TestScenarios => "Test Scenarios",
        }
    }

    /// Repository directory holding this kind's native files.
    pub fn directory(&self) -> &'static str {
        match self {
            Self::HealthInterventions => "input/health-interventions",
            Self::Personas => "input/fsh/actors",
            Self::UserScenarios => "input/scenarios",
            Self::BusinessProcesses => "input/process",
            Self::DataElements => "input/data-elements",
            Self::DecisionLogic => "input/decision-support",
            Self::Indicators => "input/indicators",
            Self::Requirements => "input/requirements",
            Self::TestScenarios => "input/testing",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::HealthInterventions | Self::UserScenarios | Self::Requirements => "md",
            Self::Personas => "fsh",
            Self::BusinessProcesses => "bpmn",
            Self::DataElements | Self::Indicators => "json",
            Self::DecisionLogic => "dmn",
            Self::TestScenarios => "feature",
        }
    }

    /// File stem used while a component has no id yet.
    pub fn placeholder_id(&self) -> &'static str {
        match self {
            Self::HealthInterventions => "new-health-intervention",
            Self::Personas => "new-persona",
            Self::UserScenarios => "new-user-scenario",
            Self::BusinessProcesses => "new-business-process",
            Self::DataElements => "new-data-element",
            Self::DecisionLogic => "new-decision-logic",
            Self::Indicators => "new-indicator",
            Self::Requirements => "new-requirements",
            Self::TestScenarios => "new-test-scenario",
        }
    }

    /// Kind owning a repository path, judged by directory and extension.
    pub fn from_path(path: &str) -> Option<Self> {
        let extension = Path::new(path).extension()?.to_str()?;
        Self::ALL.into_iter().find(|kind| {
            path.starts_with(kind.directory())
                && path[kind.directory().len()..].starts_with('/')
                && kind.extension().eq_ignore_ascii_case(extension)
        })
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.manifest_key())
    }
}

#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("{kind} payload is malformed: {reason}")]
    Malformed { kind: ComponentKind, reason: String },

    #[error("{kind} data has an unexpected shape: {source}")]
    Shape {
        kind: ComponentKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Identity accessors every component instance exposes.
pub trait ComponentData {
    fn id(&self) -> Option<&str>;
    fn set_id(&mut self, id: String);
    /// Human-readable name or title.
    fn label(&self) -> Option<&str>;
}

/// Locate, serialize, parse and validate one component kind.
pub trait DakComponent: Send + Sync + 'static {
    type Data: ComponentData + Serialize + DeserializeOwned + Clone + Send + Sync;

    const KIND: ComponentKind;

    /// Repository path for `data`; falls back to the kind's placeholder name
    /// while the id is missing.
    fn determine_file_path(&self, data: &Self::Data) -> String {
        let id = data
            .id()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(Self::KIND.placeholder_id());
        format!("{}/{}.{}", Self::KIND.directory(), id, Self::KIND.extension())
    }

    /// Native file text. A verbatim native payload on `data` wins over its
    /// structured fields.
    fn serialize_to_file(&self, data: &Self::Data) -> Result<String, SerializationError>;

    /// Best-effort extraction; the original text is retained on the result.
    fn parse_from_file(&self, content: &str) -> Result<Self::Data, SerializationError>;

    fn validate(&self, data: &Self::Data) -> ValidationResult;
}

/// Type-erased component object over JSON values.
pub trait DynComponent: Send + Sync {
    fn kind(&self) -> ComponentKind;
    fn file_path(&self, data: &Value) -> Result<String, SerializationError>;
    fn serialize(&self, data: &Value) -> Result<String, SerializationError>;
    /// Parse native text; when `path` is given and the text carries no id, the
    /// file stem becomes the id.
    fn parse(&self, path: Option<&str>, content: &str) -> Result<Value, SerializationError>;
    fn validate_value(&self, data: &Value) -> ValidationResult;
}

impl<C: DakComponent> DynComponent for C {
    fn kind(&self) -> ComponentKind {
        C::KIND
    }

    fn file_path(&self, data: &Value) -> Result<String, SerializationError> {
        let data = decode::<C>(data)?;
        Ok(self.determine_file_path(&data))
    }

    fn serialize(&self, data: &Value) -> Result<String, SerializationError> {
        let data = decode::<C>(data)?;
        self.serialize_to_file(&data)
    }

    fn parse(&self, path: Option<&str>, content: &str) -> Result<Value, SerializationError> {
        let mut data = self.parse_from_file(content)?;
        if data.id().is_none()
            && let Some(stem) = path
                .and_then(|p| Path::new(p).file_stem())
                .and_then(|s| s.to_str())
        {
            data.set_id(stem.to_string());
        }
        Ok(serde_json::to_value(data)?)
    }

    fn validate_value(&self, data: &Value) -> ValidationResult {
        match decode::<C>(data) {
            Ok(data) => self.validate(&data),
            Err(e) => {
                let mut result = ValidationResult::new();
                result.error(ValidationIssue::new("INVALID_SHAPE", e.to_string()));
                result
            }
        }
    }
}

fn decode<C: DakComponent>(data: &Value) -> Result<C::Data, SerializationError> {
    serde_json::from_value(data.clone()).map_err(|source| SerializationError::Shape {
        kind: C::KIND,
        source,
    })
}

static HEALTH_INTERVENTIONS: HealthInterventionComponent = HealthInterventionComponent;
static PERSONAS: PersonaComponent = PersonaComponent;
static USER_SCENARIOS: UserScenarioComponent = UserScenarioComponent;
static BUSINESS_PROCESSES: BusinessProcessComponent = BusinessProcessComponent;
static DATA_ELEMENTS: DataElementComponent = DataElementComponent;
static DECISION_LOGIC: DecisionLogicComponent = DecisionLogicComponent;
static INDICATORS: IndicatorComponent = IndicatorComponent;
static REQUIREMENTS: RequirementsComponent = RequirementsComponent;
static TEST_SCENARIOS: TestScenarioComponent = TestScenarioComponent;

/// The component object registered for `kind`.
pub fn component_for(kind: ComponentKind) -> &'static dyn DynComponent {
    match kind {
        ComponentKind::HealthInterventions => &HEALTH_INTERVENTIONS,
        ComponentKind::Personas => &PERSONAS,
        ComponentKind::UserScenarios => &USER_SCENARIOS,
        ComponentKind::BusinessProcesses => &BUSINESS_PROCESSES,
        ComponentKind::DataElements => &DATA_ELEMENTS,
        ComponentKind::DecisionLogic => &DECISION_LOGIC,
        ComponentKind::Indicators => &INDICATORS,
        ComponentKind::Requirements => &REQUIREMENTS,
        ComponentKind::TestScenarios => &TEST_SCENARIOS,
    }
}

pub fn all_components() -> impl Iterator<Item = &'static dyn DynComponent> {
    ComponentKind::ALL.into_iter().map(component_for)
}

/// Id for a new component: a slug of its label (or the kind's placeholder),
/// suffixed until it is not in `taken`.
pub fn assign_id(kind: ComponentKind, label: Option<&str>, taken: &[String]) -> String {
    let base = label
        .map(slugify)
        .filter(|slug| !slug.is_empty())
        .unwrap_or_else(|| kind.placeholder_id().to_string());
    if !taken.contains(&base) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}-{n}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Lowercase-hyphenated form of `text`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

// ── Shared validation helpers ──

pub(crate) fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Missing id is a warning (ids may be assigned later); missing label is an error.
pub(crate) fn check_identity(
    result: &mut ValidationResult,
    id: &Option<String>,
    label: &Option<String>,
    label_field: &str,
) {
    if non_blank(id).is_none() {
        result.warning(
            ValidationIssue::new("MISSING_ID", "id is not set; one is assigned on save")
                .on_field("id"),
        );
    }
    if non_blank(label).is_none() {
        result.error(
            ValidationIssue::new(
                format!("MISSING_{}", label_field.to_ascii_uppercase()),
                format!("{label_field} is required"),
            )
            .on_field(label_field),
        );
    }
}
