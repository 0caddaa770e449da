//! The `dak.json` manifest: DAK metadata plus one source list per component kind.
//!
//! The manifest never holds resolved data, only [`DakComponentSource`] entries;
//! resolution happens on demand.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::component::ComponentKind;
use crate::source::DakComponentSource;

/// Repository path of the manifest.
pub const DAK_JSON_PATH: &str = "dak.json";

const RESOURCE_TYPE: &str = "DAK";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("invalid dak.json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publisher {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Top-level DAK metadata, flattened into the root of `dak.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DakMetadata {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright_year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<Publisher>,
}

/// Manifest keys that are not metadata and not component collections.
pub const RESERVED_KEYS: &[&str] = &["resourceType"];

/// Metadata keys accepted at the root of `dak.json`.
pub const METADATA_KEYS: &[&str] = &[
    "id",
    "name",
    "title",
    "description",
    "version",
    "status",
    "publicationUrl",
    "canonicalUrl",
    "license",
    "copyrightYear",
    "publisher",
];

type Sources = Vec<DakComponentSource>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DakManifest {
    #[serde(default = "default_resource_type")]
    pub resource_type: String,
    #[serde(flatten)]
    pub metadata: DakMetadata,
    #[serde(default)]
    pub health_interventions: Sources,
    #[serde(default)]
    pub personas: Sources,
    #[serde(default)]
    pub user_scenarios: Sources,
    #[serde(default)]
    pub business_processes: Sources,
    #[serde(default)]
    pub data_elements: Sources,
    #[serde(default)]
    pub decision_logic: Sources,
    #[serde(default)]
    pub indicators: Sources,
    #[serde(default)]
    pub requirements: Sources,
    #[serde(default)]
    pub test_scenarios: Sources,
}

fn default_resource_type() -> String {
    RESOURCE_TYPE.to_string()
}

impl Default for DakManifest {
    fn default() -> Self {
        Self::new(DakMetadata::default())
    }
}

impl DakManifest {
    /// An empty manifest with every component collection present.
    pub fn new(metadata: DakMetadata) -> Self {
        Self {
            resource_type: default_resource_type(),
            metadata,
            health_interventions: Vec::new(),
            personas: Vec::new(),
            user_scenarios: Vec::new(),
            business_processes: Vec::new(),
            data_elements: Vec::new(),
            decision_logic: Vec::new(),
            indicators: Vec::new(),
            requirements: Vec::new(),
            test_scenarios: Vec::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, ManifestError> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    pub fn sources(&self, kind: ComponentKind) -> &[DakComponentSource] {
        match kind {
            ComponentKind::HealthInterventions => &self.health_interventions,
            ComponentKind::Personas => &self.personas,
            ComponentKind::UserScenarios => &self.user_scenarios,
            ComponentKind::BusinessProcesses => &self.business_processes,
            ComponentKind::DataElements => &self.data_elements,
            ComponentKind::DecisionLogic => &self.decision_logic,
            ComponentKind::Indicators => &self.indicators,
            ComponentKind::Requirements => &self.requirements,
            ComponentKind::TestScenarios => &self.test_scenarios,
        }
    }

    pub fn sources_mut(&mut self, kind: ComponentKind) -> &mut Sources {
        match kind {
            ComponentKind::HealthInterventions => &mut self.health_interventions,
            ComponentKind::Personas => &mut self.personas,
            ComponentKind::UserScenarios => &mut self.user_scenarios,
            ComponentKind::BusinessProcesses => &mut self.business_processes,
            ComponentKind::DataElements => &mut self.data_elements,
            ComponentKind::DecisionLogic => &mut self.decision_logic,
            ComponentKind::Indicators => &mut self.indicators,
            ComponentKind::Requirements => &mut self.requirements,
            ComponentKind::TestScenarios => &mut self.test_scenarios,
        }
    }

    /// Append `source` unless an equal reference is already listed.
    ///
    /// Returns `true` when the manifest changed.
    pub fn add_source(&mut self, kind: ComponentKind, source: DakComponentSource) -> bool {
        let sources = self.sources_mut(kind);
        let duplicate = match source.reference() {
            Some(reference) => sources.iter().any(|s| s.reference() == Some(reference)),
            None => sources.contains(&source),
        };
        if duplicate {
            return false;
        }
        sources.push(source);
        true
    }

    /// Total number of sources across all component kinds.
    pub fn source_count(&self) -> usize {
        ComponentKind::ALL
            .iter()
            .map(|kind| self.sources(*kind).len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceType;
    use serde_json::json;

    #[test]
    fn every_component_key_is_written() {
        let json = serde_json::to_value(DakManifest::default()).unwrap();
        for kind in ComponentKind::ALL {
            assert_eq!(json[kind.manifest_key()], json!([]), "{kind:?}");
        }
        assert_eq!(json["resourceType"], "DAK");
    }

    #[test]
    fn parses_manifest_with_flattened_metadata() {
        let manifest = DakManifest::from_json(
            r#"{
                "resourceType": "DAK",
                "id": "smart.who.int.anc",
                "name": "ANC",
                "publicationUrl": "https://smart.who.int/anc",
                "publisher": {"name": "WHO", "url": "https://who.int"},
                "businessProcesses": [{"url": "input/process/anc-registration.bpmn"}],
                "personas": [{"canonical": "http://smart.who.int/anc/ActorDefinition/client"}]
            }"#,
        )
        .unwrap();
        assert_eq!(manifest.metadata.id, "smart.who.int.anc");
        assert_eq!(
            manifest.metadata.publication_url.as_deref(),
            Some("https://smart.who.int/anc")
        );
        assert_eq!(
            manifest.sources(ComponentKind::BusinessProcesses)[0].source_type(),
            SourceType::UrlRelative
        );
        assert!(manifest.sources(ComponentKind::Indicators).is_empty());
        assert_eq!(manifest.source_count(), 2);
    }

    #[test]
    fn add_source_skips_duplicate_references() {
        let mut manifest = DakManifest::default();
        let kind = ComponentKind::DecisionLogic;
        assert!(manifest.add_source(kind, DakComponentSource::relative("input/decision-support/d1.dmn")));
        assert!(!manifest.add_source(kind, DakComponentSource::relative("input/decision-support/d1.dmn")));
        assert!(manifest.add_source(kind, DakComponentSource::inline(json!({"id": "d2"}))));
        assert!(!manifest.add_source(kind, DakComponentSource::inline(json!({"id": "d2"}))));
        assert_eq!(manifest.sources(kind).len(), 2);
    }

    #[test]
    fn invalid_source_fails_manifest_parse() {
        let err = DakManifest::from_json(r#"{"personas": [{}]}"#).unwrap_err();
        assert!(err.to_string().contains("none of"));
    }
}
