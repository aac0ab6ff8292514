//! Version resolution and update orchestration.
//!
//! The orchestrator sequences resolver -> acquirer -> deployer across an
//! update plan, persisting the installed version after every successful step
//! so that a crash resumes cleanly from the last applied version. Differential
//! eligibility is re-checked per step against the version actually installed
//! at that point, never against the version the run started from.

mod error;
mod info;
mod orchestrator;
mod resolver;
mod store;
mod version;

pub use error::UpdateError;
pub use info::{BranchInfo, INFO_CACHE_TTL, VersionInfoClient, VersionManifest};
pub use orchestrator::{
    DEFAULT_CLIENT_BINARY, EndpointIndex, InstallLayout, Orchestrator, ProgressSink,
    UpdateOutcome, VersionIndex,
};
pub use resolver::{differential_usable, resolve_plan};
pub use store::ConfigStore;
pub use version::{ArchiveEndpoint, Branch, VersionInfo};
