//! Contract for the persistent config collaborator.
//!
//! The store is the single source of truth for what is on disk. Saving must be
//! durable before returning; the orchestrator persists a version only after
//! that step's deployment succeeded, so a crash mid-step leaves the record at
//! the last applied version.

pub trait ConfigStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn load_installed_version(&self) -> Result<Option<u32>, Self::Error>;

    fn save_installed_version(&self, version: u32) -> Result<(), Self::Error>;

    fn load_auth_domain(&self) -> Result<String, Self::Error>;
}
