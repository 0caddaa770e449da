//! Repository access and source resolution: the repository API with in-memory,
//! local-checkout and GitHub implementations, and the caching source resolver.

pub mod local;
pub mod memory;
pub mod repo;
pub mod resolver;

#[cfg(feature = "http")]
pub mod github;

pub use local::LocalRepository;
pub use memory::MemoryRepository;
pub use repo::{CommitInfo, DirEntry, EntryKind, RepoError, RepositoryApi, list_files_recursive};
pub use resolver::{
    CanonicalRegistry, CanonicalTarget, ResolutionError, ResolveContext, ResolverConfig,
    ResolverStats, SourceResolver,
};

#[cfg(feature = "http")]
pub use github::GitHubClient;
