//! Builds [`DakObject`]s from a repository branch, a manifest document, or
//! nothing at all.

use std::sync::Arc;

use smartdak_core::{DAK_JSON_PATH, DakManifest, DakMetadata, RepoContext};
use smartdak_store::{StagingGroundAdapter, StorageBackend};
use smartdak_sync::{RepositoryApi, ResolverConfig, SourceResolver};
use tracing::{debug, info};

use crate::Result;
use crate::dak::DakObject;

/// Shared wiring: one repository, one staging store and one resolver for
/// every DAK object it creates.
#[derive(Clone)]
pub struct DakFactory {
    repository: Arc<dyn RepositoryApi>,
    storage: Arc<dyn StorageBackend>,
    resolver: Arc<SourceResolver>,
}

impl DakFactory {
    pub fn new(repository: Arc<dyn RepositoryApi>, storage: Arc<dyn StorageBackend>) -> Self {
        Self::with_config(repository, storage, ResolverConfig::default())
    }

    pub fn with_config(
        repository: Arc<dyn RepositoryApi>,
        storage: Arc<dyn StorageBackend>,
        config: ResolverConfig,
    ) -> Self {
        let resolver = Arc::new(SourceResolver::with_config(repository.clone(), config));
        Self::with_resolver(repository, storage, resolver)
    }

    pub fn with_resolver(
        repository: Arc<dyn RepositoryApi>,
        storage: Arc<dyn StorageBackend>,
        resolver: Arc<SourceResolver>,
    ) -> Self {
        Self {
            repository,
            storage,
            resolver,
        }
    }

    pub fn repository(&self) -> &Arc<dyn RepositoryApi> {
        &self.repository
    }

    pub fn resolver(&self) -> &Arc<SourceResolver> {
        &self.resolver
    }

    /// Open the staging area for `ctx` with the resolver watching it.
    pub async fn open_staging(&self, ctx: &RepoContext) -> Result<Arc<StagingGroundAdapter>> {
        let staging = Arc::new(StagingGroundAdapter::open(self.storage.clone(), ctx.clone()).await?);
        staging.add_observer(self.resolver.clone()).await;
        Ok(staging)
    }

    /// Load the DAK on `ctx`. A staged `dak.json` wins over the committed one.
    pub async fn create_from_repository(&self, ctx: RepoContext) -> Result<DakObject> {
        let staging = self.open_staging(&ctx).await?;
        let manifest = match staging.load_dak_json().await? {
            Some(manifest) => {
                debug!(repo = %ctx, "using staged dak.json");
                manifest
            }
            None => {
                let json = self.repository.get_file_content(&ctx, DAK_JSON_PATH).await?;
                DakManifest::from_json(&json)?
            }
        };
        info!(repo = %ctx, sources = manifest.source_count(), "loaded DAK");
        Ok(DakObject::new(ctx, manifest, self.resolver.clone(), staging))
    }

    /// A new DAK with no components; its `dak.json` is staged immediately.
    pub async fn create_empty(&self, ctx: RepoContext, metadata: DakMetadata) -> Result<DakObject> {
        let staging = self.open_staging(&ctx).await?;
        let manifest = DakManifest::new(metadata);
        staging.save_dak_json(&manifest).await?;
        info!(repo = %ctx, id = %manifest.metadata.id, "created empty DAK");
        Ok(DakObject::new(ctx, manifest, self.resolver.clone(), staging))
    }

    /// A DAK over an already-fetched manifest document.
    pub async fn create_from_dak_json(&self, ctx: RepoContext, json: &str) -> Result<DakObject> {
        let manifest = DakManifest::from_json(json)?;
        let staging = self.open_staging(&ctx).await?;
        Ok(DakObject::new(ctx, manifest, self.resolver.clone(), staging))
    }

    /// Like [`create_from_dak_json`](Self::create_from_dak_json) but on a
    /// staging area that is already open, so edits held only in its memory
    /// carry over.
    pub fn create_on_staging(
        &self,
        staging: Arc<StagingGroundAdapter>,
        json: &str,
    ) -> Result<DakObject> {
        let manifest = DakManifest::from_json(json)?;
        let ctx = staging.context().clone();
        Ok(DakObject::new(ctx, manifest, self.resolver.clone(), staging))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WorkbenchError;
    use serde_json::json;
    use smartdak_core::ComponentKind;
    use smartdak_store::{FileStorage, MemoryStorage};
    use smartdak_sync::{LocalRepository, MemoryRepository};

    fn ctx() -> RepoContext {
        RepoContext::new("who", "smart-anc", "main")
    }

    #[tokio::test]
    async fn committed_manifest_is_loaded() {
        let repo = MemoryRepository::new().with_file(
            &ctx(),
            DAK_JSON_PATH,
            r#"{"id": "anc", "name": "ANC", "personas": [{"url": "input/fsh/actors/client.fsh"}]}"#,
        );
        let factory = DakFactory::new(Arc::new(repo), Arc::new(MemoryStorage::new()));
        let dak = factory.create_from_repository(ctx()).await.unwrap();
        let manifest = dak.manifest().await;
        assert_eq!(manifest.metadata.id, "anc");
        assert_eq!(manifest.sources(ComponentKind::Personas).len(), 1);
    }

    #[tokio::test]
    async fn staged_manifest_wins_across_sessions() {
        let tmp = tempfile::TempDir::new().unwrap();
        let storage: Arc<dyn StorageBackend> = Arc::new(FileStorage::open(tmp.path()).await.unwrap());
        let repo = Arc::new(LocalRepository::new(tmp.path().join("checkout")));
        let factory = DakFactory::new(repo, storage);

        let metadata = DakMetadata {
            id: "smart.who.int.hiv".into(),
            name: "HIV".into(),
            ..Default::default()
        };
        let dak = factory.create_empty(ctx(), metadata).await.unwrap();
        assert!(dak.staging().has_changes().await);
        drop(dak);

        // nothing committed: the staged manifest alone is enough
        let reopened = factory.create_from_repository(ctx()).await.unwrap();
        assert_eq!(reopened.manifest().await.metadata.name, "HIV");
    }

    #[tokio::test]
    async fn missing_manifest_is_a_repository_error() {
        let factory = DakFactory::new(
            Arc::new(MemoryRepository::new()),
            Arc::new(MemoryStorage::new()),
        );
        let err = factory.create_from_repository(ctx()).await.err().unwrap();
        assert!(matches!(err, WorkbenchError::Repo(ref e) if e.is_not_found()));
    }

    #[tokio::test]
    async fn manifest_document_is_parsed() {
        let factory = DakFactory::new(
            Arc::new(MemoryRepository::new()),
            Arc::new(MemoryStorage::new()),
        );
        let json = json!({"id": "anc", "indicators": [{"instance": {"id": "anc-1"}}]}).to_string();
        let dak = factory.create_from_dak_json(ctx(), &json).await.unwrap();
        assert_eq!(dak.list(ComponentKind::Indicators).await[0].id(), Some("anc-1"));
        assert!(matches!(
            factory.create_from_dak_json(ctx(), "{").await,
            Err(WorkbenchError::Manifest(_))
        ));
    }
}
