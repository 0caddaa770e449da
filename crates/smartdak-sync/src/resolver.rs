//! Source resolution: turns a component source descriptor into data.
//!
//! Inline sources return their data directly. Relative paths resolve below
//! `input/` on the active branch, reading the staging ground first and the
//! repository second. Absolute URLs are fetched over HTTP. Canonical URIs are
//! looked up in a [`CanonicalRegistry`] and then resolved as a repository path
//! or URL.
//!
//! Fetched text is cached for `cache_ttl` under a key derived from where it
//! came from. Staged content is never cached, and the resolver registers as a
//! staging observer so a staged write to a path drops that path's entry.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use serde_json::Value;
use smartdak_core::{
    ComponentKind, DakComponentSource, PERMITTED_ROOT, RepoContext, ResolvedSource, SourceLocation,
    SourceType, component_for, normalize_relative_path,
};
use smartdak_store::{StagingGroundAdapter, StagingObserver};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::repo::{RepoError, RepositoryApi};

/// Configuration for the source resolver
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Cache TTL for fetched content (default: 5 minutes)
    pub cache_ttl: Duration,
    /// Bound on each network or repository read (default: 10 seconds)
    pub request_timeout: Duration,
    /// Maximum cache entries (default: 1000)
    pub max_cache_entries: usize,
    /// Directory relative sources must stay below
    pub permitted_root: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            request_timeout: Duration::from_secs(10),
            max_cache_entries: 1000,
            permitted_root: PERMITTED_ROOT.to_string(),
        }
    }
}

impl ResolverConfig {
    /// Defaults overridden by `SMARTDAK_CACHE_TTL_SECS`,
    /// `SMARTDAK_REQUEST_TIMEOUT_SECS` and `SMARTDAK_CACHE_MAX_ENTRIES`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("SMARTDAK_CACHE_TTL_SECS")
            && let Ok(secs) = val.parse::<u64>()
        {
            config.cache_ttl = Duration::from_secs(secs);
        }

        if let Ok(val) = std::env::var("SMARTDAK_REQUEST_TIMEOUT_SECS")
            && let Ok(secs) = val.parse::<u64>()
        {
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Ok(val) = std::env::var("SMARTDAK_CACHE_MAX_ENTRIES")
            && let Ok(n) = val.parse::<usize>()
        {
            config.max_cache_entries = n.max(1);
        }

        config
    }
}

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("invalid source: {0}")]
    InvalidSource(String),

    #[error("relative path `{path}` escapes `{root}`")]
    PathEscapesRoot { path: String, root: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("timed out after {timeout:?} resolving {target}")]
    Timeout { target: String, timeout: Duration },

    #[error("network error resolving {target}: {reason}")]
    Network { target: String, reason: String },

    #[error("{target} returned HTTP {status}")]
    Http { target: String, status: u16 },

    #[error("could not parse {target}: {reason}")]
    Parse { target: String, reason: String },

    #[error("no resolution for canonical `{0}`")]
    Unresolvable(String),
}

impl ResolutionError {
    /// Whether retrying the same resolution may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Network { .. } => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    fn from_repo(target: &str, err: RepoError) -> Self {
        match err {
            RepoError::NotFound { .. } => Self::NotFound(target.to_string()),
            RepoError::InvalidPath(path) => Self::InvalidSource(path),
            RepoError::Http(e) => Self::Network {
                target: target.to_string(),
                reason: e.to_string(),
            },
            RepoError::Io(e) => Self::Network {
                target: target.to_string(),
                reason: e.to_string(),
            },
            RepoError::Server { status, .. } => Self::Http {
                target: target.to_string(),
                status,
            },
            RepoError::Decode { reason, .. } => Self::Parse {
                target: target.to_string(),
                reason,
            },
        }
    }
}

// ── Canonical registry ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanonicalTarget {
    /// Repository path, resolved like a relative source.
    RepositoryPath(String),
    /// Fetched over HTTP.
    Url(String),
}

/// Canonical URI lookup: exact registrations first, then registered bases,
/// then direct fetch for `http(s)` canonicals.
#[derive(Debug, Clone, Default)]
pub struct CanonicalRegistry {
    entries: HashMap<String, CanonicalTarget>,
    bases: Vec<String>,
}

impl CanonicalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, canonical: impl Into<String>, target: CanonicalTarget) {
        self.entries.insert(canonical.into(), target);
    }

    /// Canonicals of the form `{base}/{ResourceType}/{id}` map to the
    /// conventional repository path for that resource.
    pub fn register_base(&mut self, base: impl Into<String>) {
        let base = base.into().trim_end_matches('/').to_string();
        if !self.bases.contains(&base) {
            self.bases.push(base);
        }
    }

    pub fn lookup(&self, canonical: &str) -> Option<CanonicalTarget> {
        if let Some(target) = self.entries.get(canonical) {
            return Some(target.clone());
        }
        for base in &self.bases {
            if let Some(rest) = canonical.strip_prefix(base.as_str())
                && let Some((resource_type, id)) = rest.trim_start_matches('/').split_once('/')
                && !resource_type.is_empty()
                && !id.is_empty()
                && !id.contains('/')
            {
                return Some(CanonicalTarget::RepositoryPath(conventional_path(
                    resource_type,
                    id,
                )));
            }
        }
        if canonical.starts_with("https://") || canonical.starts_with("http://") {
            return Some(CanonicalTarget::Url(canonical.to_string()));
        }
        None
    }
}

fn conventional_path(resource_type: &str, id: &str) -> String {
    match resource_type {
        "ActorDefinition" => format!("{}/{id}.fsh", ComponentKind::Personas.directory()),
        _ => format!("input/resources/{resource_type}-{id}.json"),
    }
}

// ── Resolver ──

/// Where resolution happens: the repository branch, plus the staging ground
/// overlaying it when one is open.
#[derive(Clone, Copy)]
pub struct ResolveContext<'a> {
    pub repo: &'a RepoContext,
    pub staging: Option<&'a StagingGroundAdapter>,
}

impl<'a> ResolveContext<'a> {
    pub fn committed(repo: &'a RepoContext) -> Self {
        Self {
            repo,
            staging: None,
        }
    }

    pub fn with_staging(repo: &'a RepoContext, staging: &'a StagingGroundAdapter) -> Self {
        Self {
            repo,
            staging: Some(staging),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
}

struct CachedText {
    text: String,
    inserted_at: Instant,
    expires_at: Instant,
}

/// Where a non-inline source's text comes from.
enum Location {
    Repository(String),
    Remote(String),
}

pub struct SourceResolver {
    config: ResolverConfig,
    repository: Arc<dyn RepositoryApi>,
    registry: CanonicalRegistry,
    cache: RwLock<HashMap<String, CachedText>>,
    http_client: reqwest::Client,
}

impl SourceResolver {
    pub fn new(repository: Arc<dyn RepositoryApi>) -> Self {
        Self::with_config(repository, ResolverConfig::default())
    }

    pub fn with_config(repository: Arc<dyn RepositoryApi>, config: ResolverConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("smartdak/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            config,
            repository,
            registry: CanonicalRegistry::default(),
            cache: RwLock::new(HashMap::new()),
            http_client,
        }
    }

    pub fn with_registry(mut self, registry: CanonicalRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve and deserialize JSON (or inline) data into `T`.
    pub async fn resolve_source<T: DeserializeOwned>(
        &self,
        source: &DakComponentSource,
        ctx: ResolveContext<'_>,
    ) -> Result<ResolvedSource<T>, ResolutionError> {
        if let SourceLocation::Inline { data } = &source.location {
            let data = serde_json::from_value(data.clone()).map_err(|e| ResolutionError::Parse {
                target: "inline instance".into(),
                reason: e.to_string(),
            })?;
            return Ok(ResolvedSource::new(data, SourceType::Inline, false));
        }

        let target = source.reference().unwrap_or_default().to_string();
        let resolved = self.resolve_text(source, ctx).await?;
        let data = serde_json::from_str(&resolved.data).map_err(|e| ResolutionError::Parse {
            target,
            reason: e.to_string(),
        })?;
        Ok(resolved.map(|_| data))
    }

    /// Raw text behind a source. Inline data is rendered as JSON.
    pub async fn resolve_text(
        &self,
        source: &DakComponentSource,
        ctx: ResolveContext<'_>,
    ) -> Result<ResolvedSource<String>, ResolutionError> {
        let source_type = source.source_type();
        let location = match &source.location {
            SourceLocation::Inline { data } => {
                let text = serde_json::to_string_pretty(data).map_err(|e| ResolutionError::Parse {
                    target: "inline instance".into(),
                    reason: e.to_string(),
                })?;
                return Ok(ResolvedSource::new(text, source_type, false));
            }
            _ => self.locate(source)?,
        };

        let (text, from_cache) = match location {
            Location::Repository(path) => self.read_repository(&path, ctx).await?,
            Location::Remote(href) => self.fetch_remote(&href, source_type).await?,
        };
        Ok(ResolvedSource::new(text, source_type, from_cache))
    }

    /// Resolve and parse through the kind's component object, so native files
    /// (BPMN, DMN, FSH, Markdown, Gherkin) come back as component data.
    pub async fn resolve_component(
        &self,
        kind: ComponentKind,
        source: &DakComponentSource,
        ctx: ResolveContext<'_>,
    ) -> Result<ResolvedSource<Value>, ResolutionError> {
        if let SourceLocation::Inline { data } = &source.location {
            return Ok(ResolvedSource::new(data.clone(), SourceType::Inline, false));
        }
        let reference = source.reference().unwrap_or_default().to_string();
        let resolved = self.resolve_text(source, ctx).await?;
        let stem_hint = match self.locate(source) {
            Ok(Location::Repository(path)) => Some(path),
            _ => url_last_segment(&reference),
        };
        let component = component_for(kind);
        let data = component
            .parse(stem_hint.as_deref(), &resolved.data)
            .map_err(|e| ResolutionError::Parse {
                target: reference,
                reason: e.to_string(),
            })?;
        Ok(resolved.map(|_| data))
    }

    fn locate(&self, source: &DakComponentSource) -> Result<Location, ResolutionError> {
        match &source.location {
            SourceLocation::UrlRelative { path } => Ok(Location::Repository(self.normalize(path)?)),
            SourceLocation::UrlAbsolute { href } => {
                let url = url::Url::parse(href)
                    .map_err(|e| ResolutionError::InvalidSource(format!("`{href}`: {e}")))?;
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(ResolutionError::InvalidSource(format!(
                        "unsupported scheme in `{href}`"
                    )));
                }
                Ok(Location::Remote(href.clone()))
            }
            SourceLocation::Canonical { uri } => match self.registry.lookup(uri) {
                Some(CanonicalTarget::RepositoryPath(path)) => {
                    Ok(Location::Repository(self.normalize(&path)?))
                }
                Some(CanonicalTarget::Url(href)) => Ok(Location::Remote(href)),
                None => Err(ResolutionError::Unresolvable(uri.clone())),
            },
            SourceLocation::Inline { .. } => Err(ResolutionError::InvalidSource(
                "inline sources have no location".into(),
            )),
        }
    }

    fn normalize(&self, path: &str) -> Result<String, ResolutionError> {
        normalize_relative_path(path, &self.config.permitted_root).map_err(|violation| {
            match violation {
                smartdak_core::PathViolation::EscapesRoot { path, root } => {
                    ResolutionError::PathEscapesRoot { path, root }
                }
                other => ResolutionError::InvalidSource(other.to_string()),
            }
        })
    }

    async fn read_repository(
        &self,
        path: &str,
        ctx: ResolveContext<'_>,
    ) -> Result<(String, bool), ResolutionError> {
        if let Some(staging) = ctx.staging {
            if staging.context() == ctx.repo {
                if let Some(file) = staging.get_file(path).await {
                    debug!(path, "resolved from staging ground");
                    return Ok((file.content, false));
                }
            } else {
                warn!(
                    staging = %staging.context(),
                    repo = %ctx.repo,
                    "staging ground belongs to another branch; ignoring it"
                );
            }
        }

        let key = repo_cache_key(ctx.repo, path);
        if let Some(text) = self.get_cached(&key).await {
            debug!(path, "resolved from cache");
            return Ok((text, true));
        }

        info!(repo = %ctx.repo, path, "reading committed file");
        let text = self
            .bounded(path, self.repository.get_file_content(ctx.repo, path))
            .await?
            .map_err(|e| ResolutionError::from_repo(path, e))?;
        self.cache_text(key, text.clone()).await;
        Ok((text, false))
    }

    async fn fetch_remote(
        &self,
        href: &str,
        source_type: SourceType,
    ) -> Result<(String, bool), ResolutionError> {
        let key = url_cache_key(href);
        if let Some(text) = self.get_cached(&key).await {
            debug!(url = %href, "resolved from cache");
            return Ok((text, true));
        }

        let accept = match source_type {
            SourceType::Canonical => "application/fhir+json, application/json",
            _ => "application/fhir+json, application/json, text/plain;q=0.9, */*;q=0.8",
        };
        info!(url = %href, %source_type, "fetching remote source");
        let fetch = async {
            let response = self
                .http_client
                .get(href)
                .header(ACCEPT, accept)
                .send()
                .await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        };
        let (status, body) = self.bounded(href, fetch).await?.map_err(|e| {
            if e.is_timeout() {
                ResolutionError::Timeout {
                    target: href.to_string(),
                    timeout: self.config.request_timeout,
                }
            } else {
                ResolutionError::Network {
                    target: href.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;
        if status == StatusCode::NOT_FOUND {
            return Err(ResolutionError::NotFound(href.to_string()));
        }
        if !status.is_success() {
            return Err(ResolutionError::Http {
                target: href.to_string(),
                status: status.as_u16(),
            });
        }
        self.cache_text(key, body.clone()).await;
        Ok((body, false))
    }

    /// Apply the configured timeout to one read.
    async fn bounded<F: Future>(&self, target: &str, fut: F) -> Result<F::Output, ResolutionError> {
        tokio::time::timeout(self.config.request_timeout, fut)
            .await
            .map_err(|_| {
                warn!(resource = target, timeout = ?self.config.request_timeout, "resolution timed out");
                ResolutionError::Timeout {
                    target: target.to_string(),
                    timeout: self.config.request_timeout,
                }
            })
    }

    // ── Cache ──

    async fn get_cached(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        {
            let cache = self.cache.read().await;
            match cache.get(key) {
                Some(cached) if cached.expires_at > now => return Some(cached.text.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        self.cache.write().await.remove(key);
        debug!(key, "evicted expired cache entry");
        None
    }

    async fn cache_text(&self, key: String, text: String) {
        let mut cache = self.cache.write().await;

        if cache.len() >= self.config.max_cache_entries {
            // Expired entries first.
            let now = Instant::now();
            cache.retain(|_, v| v.expires_at > now);

            // Then the oldest half.
            if cache.len() >= self.config.max_cache_entries {
                let mut by_age: Vec<(String, Instant)> = cache
                    .iter()
                    .map(|(k, v)| (k.clone(), v.inserted_at))
                    .collect();
                by_age.sort_by_key(|(_, at)| *at);
                let evict = (cache.len() / 2).max(1);
                for (key, _) in by_age.into_iter().take(evict) {
                    cache.remove(&key);
                }
            }
        }

        let now = Instant::now();
        cache.insert(
            key,
            CachedText {
                text,
                inserted_at: now,
                expires_at: now + self.config.cache_ttl,
            },
        );
    }

    pub async fn clear_cache(&self) {
        self.cache.write().await.clear();
    }

    /// Drop the cache entry `source` would be served from. Returns whether one
    /// existed.
    pub async fn clear_cache_for_source(&self, source: &DakComponentSource, ctx: &RepoContext) -> bool {
        let key = match self.locate(source) {
            Ok(Location::Repository(path)) => repo_cache_key(ctx, &path),
            Ok(Location::Remote(href)) => url_cache_key(&href),
            Err(_) => return false,
        };
        self.cache.write().await.remove(&key).is_some()
    }

    /// Drop the cache entry for a repository path on `ctx`'s branch.
    pub async fn invalidate_path(&self, ctx: &RepoContext, path: &str) -> bool {
        let removed = self
            .cache
            .write()
            .await
            .remove(&repo_cache_key(ctx, path))
            .is_some();
        if removed {
            debug!(repo = %ctx, path, "invalidated cached path");
        }
        removed
    }

    pub async fn cache_stats(&self) -> ResolverStats {
        let cache = self.cache.read().await;
        let now = Instant::now();
        let valid_entries = cache.values().filter(|v| v.expires_at > now).count();

        ResolverStats {
            total_entries: cache.len(),
            valid_entries,
            expired_entries: cache.len() - valid_entries,
        }
    }
}

#[async_trait]
impl StagingObserver for SourceResolver {
    async fn staged_path_changed(&self, ctx: &RepoContext, path: &str) {
        self.invalidate_path(ctx, path).await;
    }
}

fn repo_cache_key(ctx: &RepoContext, path: &str) -> String {
    format!("repo:{}@{}:{}", ctx.repo_key(), ctx.branch, path)
}

fn url_cache_key(href: &str) -> String {
    format!("url:{href}")
}

fn url_last_segment(reference: &str) -> Option<String> {
    let url = url::Url::parse(reference).ok()?;
    let last = url.path_segments()?.rev().find(|s| !s.is_empty())?;
    Path::new(last).file_name()?.to_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryRepository;
    use serde_json::json;
    use smartdak_store::{MemoryStorage, StorageBackend};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn ctx() -> RepoContext {
        RepoContext::new("WorldHealthOrganization", "smart-anc", "main")
    }

    fn repository() -> Arc<MemoryRepository> {
        Arc::new(
            MemoryRepository::new()
                .with_file(&ctx(), "input/data-elements/age.json", r#"{"id":"age","name":"Age"}"#)
                .with_file(
                    &ctx(),
                    "input/process/anc.bpmn",
                    r#"<bpmn:definitions><bpmn:process id="anc" name="ANC"/></bpmn:definitions>"#,
                )
                .with_file(&ctx(), "input/fsh/actors/client.fsh", "Instance: client\nTitle: \"Client\"\n"),
        )
    }

    fn resolver(repo: Arc<MemoryRepository>) -> SourceResolver {
        SourceResolver::new(repo)
    }

    async fn staging() -> StagingGroundAdapter {
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryStorage::new());
        StagingGroundAdapter::open(storage, ctx()).await.unwrap()
    }

    #[tokio::test]
    async fn inline_is_returned_directly() {
        let resolver = resolver(repository());
        let source = DakComponentSource::inline(json!({"id": "x", "name": "X"}));
        let repo = ctx();
        let resolved: ResolvedSource<Value> = resolver
            .resolve_source(&source, ResolveContext::committed(&repo))
            .await
            .unwrap();
        assert_eq!(resolved.data["id"], "x");
        assert_eq!(resolved.source_type, SourceType::Inline);
        assert!(!resolved.from_cache);
    }

    #[tokio::test]
    async fn relative_source_is_cached() {
        let repo = repository();
        let resolver = resolver(repo.clone());
        let source = DakComponentSource::relative("data-elements/age.json");
        let rc = ctx();

        let first: ResolvedSource<Value> = resolver
            .resolve_source(&source, ResolveContext::committed(&rc))
            .await
            .unwrap();
        assert!(!first.from_cache);
        assert_eq!(first.data["name"], "Age");

        let second: ResolvedSource<Value> = resolver
            .resolve_source(&source, ResolveContext::committed(&rc))
            .await
            .unwrap();
        assert!(second.from_cache);
        assert_eq!(repo.reads(), 1);

        assert!(resolver.clear_cache_for_source(&source, &rc).await);
        let third = resolver
            .resolve_text(&source, ResolveContext::committed(&rc))
            .await
            .unwrap();
        assert!(!third.from_cache);
        assert_eq!(repo.reads(), 2);
    }

    #[tokio::test]
    async fn staged_content_wins_and_is_not_cached() {
        let repo = repository();
        let resolver = resolver(repo.clone());
        let staging = staging().await;
        let rc = ctx();
        staging
            .update_file("input/data-elements/age.json", r#"{"id":"age","name":"Age (years)"}"#, None)
            .await
            .unwrap();

        let source = DakComponentSource::relative("input/data-elements/age.json");
        let resolved: ResolvedSource<Value> = resolver
            .resolve_source(&source, ResolveContext::with_staging(&rc, &staging))
            .await
            .unwrap();
        assert_eq!(resolved.data["name"], "Age (years)");
        assert!(!resolved.from_cache);
        assert_eq!(repo.reads(), 0);
        assert_eq!(resolver.cache_stats().await.total_entries, 0);
    }

    #[tokio::test]
    async fn staged_write_invalidates_cached_path() {
        let resolver = Arc::new(resolver(repository()));
        let staging = staging().await;
        staging.add_observer(resolver.clone()).await;
        let rc = ctx();
        let source = DakComponentSource::relative("data-elements/age.json");

        resolver
            .resolve_text(&source, ResolveContext::committed(&rc))
            .await
            .unwrap();
        assert_eq!(resolver.cache_stats().await.total_entries, 1);

        staging
            .update_file("input/data-elements/age.json", "{\"id\":\"age\",\"name\":\"New\"}", None)
            .await
            .unwrap();
        assert_eq!(resolver.cache_stats().await.total_entries, 0);

        // Discarding the staged edit falls back to a fresh committed read.
        staging.clear().await.unwrap();
        let resolved = resolver
            .resolve_text(&source, ResolveContext::with_staging(&rc, &staging))
            .await
            .unwrap();
        assert!(!resolved.from_cache);
        assert!(resolved.data.contains("\"Age\""));
    }

    #[tokio::test]
    async fn escaping_and_missing_paths() {
        let resolver = resolver(repository());
        let rc = ctx();
        let escaping = DakComponentSource::relative("../secrets.json");
        assert!(matches!(
            resolver.resolve_text(&escaping, ResolveContext::committed(&rc)).await,
            Err(ResolutionError::PathEscapesRoot { .. })
        ));
        let missing = DakComponentSource::relative("input/none.json");
        let err = resolver
            .resolve_text(&missing, ResolveContext::committed(&rc))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::NotFound(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn resolve_component_parses_native_files() {
        let resolver = resolver(repository());
        let rc = ctx();
        let bpmn = resolver
            .resolve_component(
                ComponentKind::BusinessProcesses,
                &DakComponentSource::relative("process/anc.bpmn"),
                ResolveContext::committed(&rc),
            )
            .await
            .unwrap();
        assert_eq!(bpmn.data["id"], "anc");
        assert_eq!(bpmn.data["name"], "ANC");
        assert!(bpmn.data["bpmnXML"].as_str().unwrap().contains("bpmn:process"));
    }

    #[tokio::test]
    async fn canonical_under_registered_base_reads_repository() {
        let mut registry = CanonicalRegistry::new();
        registry.register_base("http://smart.who.int/anc");
        let resolver = resolver(repository()).with_registry(registry);
        let rc = ctx();
        let persona = resolver
            .resolve_component(
                ComponentKind::Personas,
                &DakComponentSource::canonical("http://smart.who.int/anc/ActorDefinition/client"),
                ResolveContext::committed(&rc),
            )
            .await
            .unwrap();
        assert_eq!(persona.source_type, SourceType::Canonical);
        assert_eq!(persona.data["id"], "client");
        assert_eq!(persona.data["name"], "Client");
    }

    #[tokio::test]
    async fn unregistered_non_http_canonical_is_unresolvable() {
        let resolver = resolver(repository());
        let rc = ctx();
        let source = DakComponentSource::canonical("urn:oid:2.16.840.1.113883");
        assert!(matches!(
            resolver.resolve_text(&source, ResolveContext::committed(&rc)).await,
            Err(ResolutionError::Unresolvable(_))
        ));
    }

    #[tokio::test]
    async fn absolute_url_fetch_and_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indicators/anc1.json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "anc1", "name": "ANC1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let resolver = resolver(repository());
        let rc = ctx();
        let source = DakComponentSource::url(format!("{}/indicators/anc1.json", server.uri()));
        assert_eq!(source.source_type(), SourceType::UrlAbsolute);

        let first: ResolvedSource<Value> = resolver
            .resolve_source(&source, ResolveContext::committed(&rc))
            .await
            .unwrap();
        let second: ResolvedSource<Value> = resolver
            .resolve_source(&source, ResolveContext::committed(&rc))
            .await
            .unwrap();
        assert_eq!(first.data["id"], "anc1");
        assert!(!first.from_cache);
        assert!(second.from_cache);
    }

    #[tokio::test]
    async fn http_errors_are_classified() {
        let server = MockServer::start().await;
        Mock::given(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(path("/broken"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(path("/garbage"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let resolver = resolver(repository());
        let rc = ctx();
        let url = |p: &str| DakComponentSource::url(format!("{}{p}", server.uri()));

        let err = resolver
            .resolve_text(&url("/missing"), ResolveContext::committed(&rc))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::NotFound(_)));

        let err = resolver
            .resolve_text(&url("/broken"), ResolveContext::committed(&rc))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::Http { status: 503, .. }));
        assert!(err.is_retryable());

        let err = resolver
            .resolve_source::<Value>(&url("/garbage"), ResolveContext::committed(&rc))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::Parse { .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let config = ResolverConfig {
            request_timeout: Duration::from_millis(100),
            ..Default::default()
        };
        let resolver = SourceResolver::with_config(repository(), config);
        let rc = ctx();
        let source = DakComponentSource::url(format!("{}/slow", server.uri()));
        let err = resolver
            .resolve_text(&source, ResolveContext::committed(&rc))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::Timeout { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn canonical_fetch_sends_fhir_accept() {
        let server = MockServer::start().await;
        Mock::given(path("/fhir/ValueSet/danger-signs"))
            .and(|req: &Request| {
                req.headers.get("accept").and_then(|v| v.to_str().ok())
                    == Some("application/fhir+json, application/json")
            })
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "danger-signs"})))
            .expect(1)
            .mount(&server)
            .await;
        let resolver = resolver(repository());
        let rc = ctx();
        let source =
            DakComponentSource::canonical(format!("{}/fhir/ValueSet/danger-signs", server.uri()));
        let resolved: ResolvedSource<Value> = resolver
            .resolve_source(&source, ResolveContext::committed(&rc))
            .await
            .unwrap();
        assert_eq!(resolved.data["id"], "danger-signs");
    }

    #[tokio::test]
    async fn eviction_under_capacity_pressure() {
        let config = ResolverConfig {
            max_cache_entries: 4,
            ..Default::default()
        };
        let resolver = SourceResolver::with_config(repository(), config);
        for i in 0..4 {
            resolver.cache_text(format!("k{i}"), "v".into()).await;
        }
        resolver.cache_text("k4".into(), "v".into()).await;
        let stats = resolver.cache_stats().await;
        assert_eq!(stats.total_entries, 3);
        assert!(resolver.get_cached("k4").await.is_some());

        resolver.clear_cache().await;
        assert_eq!(resolver.cache_stats().await.total_entries, 0);
    }

    #[tokio::test]
    async fn expired_entries_are_not_served() {
        let config = ResolverConfig {
            cache_ttl: Duration::ZERO,
            ..Default::default()
        };
        let repo = repository();
        let resolver = SourceResolver::with_config(repo.clone(), config);
        let rc = ctx();
        let source = DakComponentSource::relative("data-elements/age.json");
        resolver.resolve_text(&source, ResolveContext::committed(&rc)).await.unwrap();
        let stats = resolver.cache_stats().await;
        assert_eq!(stats.expired_entries, 1);
        let again = resolver.resolve_text(&source, ResolveContext::committed(&rc)).await.unwrap();
        assert!(!again.from_cache);
        assert_eq!(repo.reads(), 2);
    }

    #[test]
    fn registry_lookup_order() {
        let mut registry = CanonicalRegistry::new();
        registry.register_base("http://smart.who.int/anc/");
        registry.register(
            "http://smart.who.int/anc/PlanDefinition/special",
            CanonicalTarget::RepositoryPath("input/special.json".into()),
        );
        assert_eq!(
            registry.lookup("http://smart.who.int/anc/PlanDefinition/special"),
            Some(CanonicalTarget::RepositoryPath("input/special.json".into()))
        );
        assert_eq!(
            registry.lookup("http://smart.who.int/anc/Questionnaire/reg"),
            Some(CanonicalTarget::RepositoryPath(
                "input/resources/Questionnaire-reg.json".into()
            ))
        );
        assert_eq!(
            registry.lookup("https://hl7.org/fhir/ValueSet/x"),
            Some(CanonicalTarget::Url("https://hl7.org/fhir/ValueSet/x".into()))
        );
        assert_eq!(registry.lookup("urn:uuid:1234"), None);
    }

    #[test]
    fn retryability() {
        assert!(
            ResolutionError::Network {
                target: "x".into(),
                reason: "reset".into()
            }
            .is_retryable()
        );
        assert!(
            !ResolutionError::Http {
                target: "x".into(),
                status: 404
            }
            .is_retryable()
        );
        assert!(!ResolutionError::Unresolvable("x".into()).is_retryable());
    }
}
