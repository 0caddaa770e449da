use smartdak_core::{ComponentKind, ManifestError, SerializationError};
use smartdak_store::StoreError;
use smartdak_sync::{RepoError, ResolutionError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkbenchError {
    #[error("staging error: {0}")]
    Store(#[from] StoreError),

    #[error("repository error: {0}")]
    Repo(#[from] RepoError),

    #[error("resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("serialization error: {0}")]
    Serialization(#[from] SerializationError),

    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("component data must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("no {kind} component with id `{id}`")]
    ComponentNotFound { kind: ComponentKind, id: String },
}
