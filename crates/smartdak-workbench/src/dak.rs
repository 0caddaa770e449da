//! `DakObject`: the DAK aggregate for one repository branch.
//!
//! Reads go through the source resolver with the staging ground overlaid, so
//! unsaved edits are what the caller sees. Saves serialize through the
//! kind's component object into the staging ground and keep `dak.json` in
//! step. Nothing here writes to the repository; that is the commit pipeline.

use std::path::Path;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use smartdak_core::component::assign_id;
use smartdak_core::{
    ComponentKind, DakComponentSource, DakManifest, RepoContext, SourceLocation, SourceType,
    ValidationResult, component_for,
};
use smartdak_store::{StageMetadata, StagingGroundAdapter};
use smartdak_sync::{ResolveContext, SourceResolver};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{Result, WorkbenchError};

/// Outcome of resolving one manifest entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ComponentState {
    #[serde(rename_all = "camelCase")]
    Loaded {
        data: Value,
        source_type: SourceType,
        from_cache: bool,
    },
    /// The source could not be resolved; the rest of the DAK still loads.
    Unavailable { error: String, retryable: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentEntry {
    pub kind: ComponentKind,
    /// Position in the manifest collection.
    pub index: usize,
    pub source: DakComponentSource,
    #[serde(flatten)]
    pub state: ComponentState,
}

impl ComponentEntry {
    pub fn id(&self) -> Option<&str> {
        match &self.state {
            ComponentState::Loaded { data, .. } => data.get("id").and_then(Value::as_str),
            ComponentState::Unavailable { .. } => None,
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match &self.state {
            ComponentState::Loaded { data, .. } => Some(data),
            ComponentState::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self.state, ComponentState::Loaded { .. })
    }
}

#[derive(Debug, Clone)]
pub struct SaveOutcome {
    pub id: String,
    pub path: String,
    /// False when identical content was already staged.
    pub staged: bool,
    /// Whether a new source was added to `dak.json`.
    pub manifest_updated: bool,
    pub validation: ValidationResult,
}

pub struct DakObject {
    ctx: RepoContext,
    manifest: RwLock<DakManifest>,
    resolver: Arc<SourceResolver>,
    staging: Arc<StagingGroundAdapter>,
}

impl DakObject {
    pub(crate) fn new(
        ctx: RepoContext,
        manifest: DakManifest,
        resolver: Arc<SourceResolver>,
        staging: Arc<StagingGroundAdapter>,
    ) -> Self {
        Self {
            ctx,
            manifest: RwLock::new(manifest),
            resolver,
            staging,
        }
    }

    pub fn context(&self) -> &RepoContext {
        &self.ctx
    }

    pub fn staging(&self) -> &Arc<StagingGroundAdapter> {
        &self.staging
    }

    pub fn resolver(&self) -> &Arc<SourceResolver> {
        &self.resolver
    }

    pub async fn manifest(&self) -> DakManifest {
        self.manifest.read().await.clone()
    }

    // ── Reads ──

    /// Every component of `kind`, in manifest order. Sources that fail to
    /// resolve come back as [`ComponentState::Unavailable`].
    pub async fn list(&self, kind: ComponentKind) -> Vec<ComponentEntry> {
        let sources = self.manifest.read().await.sources(kind).to_vec();
        let ctx = ResolveContext::with_staging(&self.ctx, &self.staging);
        let results = join_all(
            sources
                .iter()
                .map(|source| self.resolver.resolve_component(kind, source, ctx)),
        )
        .await;

        sources
            .into_iter()
            .zip(results)
            .enumerate()
            .map(|(index, (source, result))| {
                let state = match result {
                    Ok(resolved) => ComponentState::Loaded {
                        data: resolved.data,
                        source_type: resolved.source_type,
                        from_cache: resolved.from_cache,
                    },
                    Err(e) => {
                        warn!(kind = %kind, index, error = %e, "component unavailable");
                        ComponentState::Unavailable {
                            retryable: e.is_retryable(),
                            error: e.to_string(),
                        }
                    }
                };
                ComponentEntry {
                    kind,
                    index,
                    source,
                    state,
                }
            })
            .collect()
    }

    pub async fn get_by_id(&self, kind: ComponentKind, id: &str) -> Option<ComponentEntry> {
        self.list(kind)
            .await
            .into_iter()
            .find(|entry| entry.id() == Some(id))
    }

    // ── Writes ──

    pub fn validate_component(&self, kind: ComponentKind, data: &Value) -> ValidationResult {
        component_for(kind).validate_value(data)
    }

    /// Serialize `data` to its native file, stage it, and list it in
    /// `dak.json` if it is not there yet. A missing id is assigned from the
    /// name or title. Validation findings are returned, not enforced; the
    /// commit pipeline enforces them.
    pub async fn save_component(&self, kind: ComponentKind, mut data: Value) -> Result<SaveOutcome> {
        if !data.is_object() {
            return Err(WorkbenchError::NotAnObject(json_type(&data)));
        }
        let component = component_for(kind);

        let existing = data
            .get("id")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        let id = match existing {
            Some(id) => id,
            None => {
                let taken = self.taken_ids(kind).await;
                let id = assign_id(kind, label(&data), &taken);
                data["id"] = Value::String(id.clone());
                id
            }
        };

        let path = component.file_path(&data)?;
        let content = component.serialize(&data)?;
        let validation = component.validate_value(&data);

        let metadata = StageMetadata {
            message: Some(format!("Update {} `{id}`", kind.display_name())),
            component: Some(kind),
            source: Some("workbench".into()),
        };
        let staged = self.staging.update_file(&path, &content, Some(metadata)).await?;

        let manifest_updated = {
            let mut manifest = self.manifest.write().await;
            let added = manifest.add_source(kind, DakComponentSource::relative(path.clone()));
            if added {
                self.staging.save_dak_json(&manifest).await?;
            }
            added
        };

        info!(
            kind = %kind,
            id = %id,
            path = %path,
            staged,
            manifest_updated,
            errors = validation.errors.len(),
            "saved component"
        );
        Ok(SaveOutcome {
            id,
            path,
            staged,
            manifest_updated,
            validation,
        })
    }

    /// Ids already used by `kind`: file stems of relative and absolute URLs,
    /// the last segment of canonicals, and ids of inline instances.
    async fn taken_ids(&self, kind: ComponentKind) -> Vec<String> {
        let manifest = self.manifest.read().await;
        manifest
            .sources(kind)
            .iter()
            .filter_map(|source| match &source.location {
                SourceLocation::UrlRelative { path } => file_stem(path),
                SourceLocation::UrlAbsolute { href } => file_stem(last_segment(href)?),
                SourceLocation::Canonical { uri } => last_segment(uri).map(str::to_string),
                SourceLocation::Inline { data } => {
                    data.get("id").and_then(Value::as_str).map(str::to_string)
                }
            })
            .collect()
    }
}

fn file_stem(path: &str) -> Option<String> {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
}

/// Final path segment of a URL, ignoring query, fragment and a trailing `/`.
fn last_segment(reference: &str) -> Option<&str> {
    let path = reference.split(['?', '#']).next()?.trim_end_matches('/');
    path.rsplit('/').next().filter(|segment| !segment.is_empty())
}

fn label(data: &Value) -> Option<&str> {
    ["name", "title"]
        .iter()
        .find_map(|key| data.get(*key).and_then(Value::as_str))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DakFactory;
    use serde_json::json;
    use smartdak_core::DAK_JSON_PATH;
    use smartdak_store::MemoryStorage;
    use smartdak_sync::MemoryRepository;

    const SCENARIO: &str = "# First visit\n\nClient arrives for booking.\n\n## Actors\n- Client\n- Midwife\n\n## Steps\n1. Register\n2. Book\n";

    fn ctx() -> RepoContext {
        RepoContext::new("who", "smart-anc", "main")
    }

    fn manifest_json() -> String {
        json!({
            "resourceType": "DAK",
            "id": "smart.who.int.anc",
            "name": "ANC",
            "userScenarios": [
                {"url": "input/scenarios/first-visit.md"},
                {"url": "input/scenarios/missing.md"}
            ],
            "dataElements": [
                {"instance": {"id": "weight", "name": "Weight", "type": "Quantity"}}
            ]
        })
        .to_string()
    }

    async fn dak() -> DakObject {
        let repo = MemoryRepository::new()
            .with_file(&ctx(), DAK_JSON_PATH, &manifest_json())
            .with_file(&ctx(), "input/scenarios/first-visit.md", SCENARIO);
        let factory = DakFactory::new(Arc::new(repo), Arc::new(MemoryStorage::new()));
        factory.create_from_repository(ctx()).await.unwrap()
    }

    #[tokio::test]
    async fn list_degrades_unresolvable_sources() {
        let dak = dak().await;
        let scenarios = dak.list(ComponentKind::UserScenarios).await;
        assert_eq!(scenarios.len(), 2);
        assert!(scenarios[0].is_available());
        assert_eq!(scenarios[0].id(), Some("first-visit"));
        assert_eq!(scenarios[0].data().unwrap()["title"], "First visit");
        match &scenarios[1].state {
            ComponentState::Unavailable { retryable, .. } => assert!(!retryable),
            other => panic!("expected unavailable, got {other:?}"),
        }

        let elements = dak.list(ComponentKind::DataElements).await;
        assert_eq!(elements[0].id(), Some("weight"));
        assert!(dak.list(ComponentKind::Indicators).await.is_empty());
    }

    #[tokio::test]
    async fn get_by_id_finds_loaded_components() {
        let dak = dak().await;
        let found = dak.get_by_id(ComponentKind::UserScenarios, "first-visit").await;
        assert_eq!(found.map(|e| e.index), Some(0));
        assert!(dak.get_by_id(ComponentKind::UserScenarios, "nope").await.is_none());
    }

    #[tokio::test]
    async fn save_assigns_id_and_stages_file_and_manifest() {
        let dak = dak().await;
        let outcome = dak
            .save_component(
                ComponentKind::DecisionLogic,
                json!({"name": "Danger signs", "description": "Refer on danger signs"}),
            )
            .await
            .unwrap();
        assert_eq!(outcome.id, "danger-signs");
        assert_eq!(outcome.path, "input/decision-support/danger-signs.dmn");
        assert!(outcome.staged && outcome.manifest_updated);
        assert!(outcome.validation.is_valid);

        let staged = dak.staging().get_file(&outcome.path).await.unwrap();
        assert!(staged.content.contains(r#"<decision id="danger-signs""#));
        assert_eq!(staged.metadata.component, Some(ComponentKind::DecisionLogic));

        let staged_manifest = dak.staging().load_dak_json().await.unwrap().unwrap();
        assert_eq!(staged_manifest.decision_logic.len(), 1);

        // the staged file is visible through the normal read path
        let loaded = dak.get_by_id(ComponentKind::DecisionLogic, "danger-signs").await;
        assert!(loaded.is_some_and(|e| e.is_available()));

        // saving again changes nothing in the manifest
        let again = dak
            .save_component(
                ComponentKind::DecisionLogic,
                json!({"id": "danger-signs", "name": "Danger signs", "description": "Refer on danger signs"}),
            )
            .await
            .unwrap();
        assert!(!again.staged);
        assert!(!again.manifest_updated);
    }

    #[tokio::test]
    async fn save_keeps_invalid_data_and_reports_it() {
        let dak = dak().await;
        let outcome = dak
            .save_component(ComponentKind::UserScenarios, json!({"id": "draft"}))
            .await
            .unwrap();
        assert!(!outcome.validation.is_valid);
        assert!(dak.staging().get_file("input/scenarios/draft.md").await.is_some());
    }

    #[tokio::test]
    async fn taken_ids_are_skipped() {
        let dak = dak().await;
        let outcome = dak
            .save_component(ComponentKind::UserScenarios, json!({"title": "First visit"}))
            .await
            .unwrap();
        assert_eq!(outcome.id, "first-visit-2");
    }

    #[tokio::test]
    async fn ids_behind_canonical_and_absolute_sources_are_taken() {
        let factory = DakFactory::new(
            Arc::new(MemoryRepository::new()),
            Arc::new(MemoryStorage::new()),
        );
        let manifest = json!({
            "id": "smart.who.int.anc",
            "personas": [{"canonical": "http://smart.who.int/anc/ActorDefinition/client"}],
            "decisionLogic": [
                {"url": "https://example.org/anc/input/decision-support/danger-signs.dmn?ref=main"}
            ]
        })
        .to_string();
        let dak = factory.create_from_dak_json(ctx(), &manifest).await.unwrap();

        let persona = dak
            .save_component(ComponentKind::Personas, json!({"name": "Client"}))
            .await
            .unwrap();
        assert_eq!(persona.id, "client-2");
        let decision = dak
            .save_component(ComponentKind::DecisionLogic, json!({"name": "Danger signs"}))
            .await
            .unwrap();
        assert_eq!(decision.id, "danger-signs-2");

        assert_eq!(last_segment("http://x.org/Library/ANC.DT.01/"), Some("ANC.DT.01"));
        assert_eq!(last_segment("https://x.org/"), Some("x.org"));
    }

    #[tokio::test]
    async fn non_object_data_is_rejected() {
        let dak = dak().await;
        let err = dak
            .save_component(ComponentKind::Personas, json!(["x"]))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkbenchError::NotAnObject("an array")));
    }
}
