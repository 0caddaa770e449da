//! Storage layer: quota-bounded key-value backends and the staging ground
//! that holds uncommitted file edits per repository branch.

mod error;
pub use error::StoreError;

pub mod backend;
pub use backend::{FileStorage, MemoryStorage, StorageBackend, StorageQuota};

pub mod staging;
pub use staging::{
    ContributionReport, ContributionResult, StageMetadata, StagedFile, StagedFileMetadata,
    StagingGround, StagingGroundAdapter, StagingObserver, StagingStatus, staging_key,
};
