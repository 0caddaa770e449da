//! The DAK aggregate over a repository branch: typed component access backed
//! by the source resolver, saves into the staging ground, and the commit
//! pipeline that validates the staged DAK before pushing it.

mod error;
pub use error::WorkbenchError;

pub mod commit;
pub mod dak;
pub mod factory;

pub use commit::{CommitOutcome, CommitPipeline, CommitReport, PushFailure, SYNC_ROOT_FILES};
pub use dak::{ComponentEntry, ComponentState, DakObject, SaveOutcome};
pub use factory::DakFactory;

pub type Result<T> = std::result::Result<T, WorkbenchError>;
