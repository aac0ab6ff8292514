//! The update orchestrator: resolver -> acquirer -> deployer, step by step.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use relaunch_deploy::{CommandRunner, Deployer, FailureKind};
use relaunch_fetch::{AcquireOptions, Acquirer, DownloadPhase, HttpClient, Progress};

use crate::error::UpdateError;
use crate::resolver::{differential_usable, resolve_plan};
use crate::store::ConfigStore;
use crate::version::{ArchiveEndpoint, Branch, VersionInfo};

/// Coarse milestone reporting: `(message, percent)`. Percent is not monotonic
/// across archives within one run.
pub type ProgressSink = Arc<dyn Fn(&str, Option<f32>) + Send + Sync>;

/// Source of per-version archive metadata.
pub trait VersionIndex: Send + Sync {
    fn info(
        &self,
        version: u32,
        branch: Branch,
    ) -> impl Future<Output = Result<VersionInfo, UpdateError>> + Send;
}

/// Index that derives archive locations purely from the URL pattern: every
/// release build advertises a differential from its immediate predecessor,
/// pre-release builds only ship full archives.
pub struct EndpointIndex {
    endpoint: ArchiveEndpoint,
}

impl EndpointIndex {
    pub fn new(endpoint: ArchiveEndpoint) -> Self { Self { endpoint } }
}

impl VersionIndex for EndpointIndex {
    async fn info(&self, version: u32, branch: Branch) -> Result<VersionInfo, UpdateError> {
        let has_diff = branch.is_release() && version > 0;
        Ok(VersionInfo {
            version,
            full_url: self.endpoint.archive_url(branch, false, version),
            diff_url: has_diff.then(|| self.endpoint.archive_url(branch, true, version)),
            diff_source: has_diff.then(|| version - 1),
            is_differential: has_diff,
            checksum: None,
        })
    }
}

pub const DEFAULT_CLIENT_BINARY: &str = "CradleClient.exe";

#[derive(Debug, Clone)]
pub struct InstallLayout {
    pub install_dir:        PathBuf,
    pub tools_dir:          PathBuf,
    pub cache_dir:          PathBuf,
    pub client_binary_name: String,
}

impl InstallLayout {
    pub fn new(
        install_dir: impl Into<PathBuf>,
        tools_dir: impl Into<PathBuf>,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            install_dir:        install_dir.into(),
            tools_dir:          tools_dir.into(),
            cache_dir:          cache_dir.into(),
            client_binary_name: DEFAULT_CLIENT_BINARY.to_string(),
        }
    }

    pub fn with_client_binary_name(mut self, name: impl Into<String>) -> Self {
        self.client_binary_name = name.into();
        self
    }

    pub fn client_binary(&self) -> PathBuf { self.install_dir.join(&self.client_binary_name) }

    /// Cache entries are keyed by branch and filename.
    fn archive_path(&self, branch: Branch, version: u32, differential: bool) -> PathBuf {
        let kind = if differential { "diff" } else { "full" };
        self.cache_dir
            .join(branch.as_str())
            .join(format!("{version}-{kind}.archive"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    UpToDate,
    Updated {
        from:  Option<u32>,
        to:    u32,
        steps: usize,
    },
}

pub struct Orchestrator<C, R, S, I>
where
    C: HttpClient,
    R: CommandRunner,
    S: ConfigStore,
    I: VersionIndex,
{
    acquirer:    Acquirer<C>,
    deployer:    Deployer<R>,
    store:       S,
    index:       I,
    layout:      InstallLayout,
    on_progress: Option<ProgressSink>,
}

impl<C, R, S, I> Orchestrator<C, R, S, I>
where
    C: HttpClient,
    R: CommandRunner,
    S: ConfigStore,
    I: VersionIndex,
{
    pub fn new(
        acquirer: Acquirer<C>,
        deployer: Deployer<R>,
        store: S,
        index: I,
        layout: InstallLayout,
    ) -> Self {
        Self {
            acquirer,
            deployer,
            store,
            index,
            layout,
            on_progress: None,
        }
    }

    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.on_progress = Some(sink);
        self
    }

    /// Thin guard: skip the whole procedure when the client binary is present
    /// and already at the target version. A version record without a binary
    /// behind it is not trusted; the files win, so that case reinstalls.
    pub async fn ensure_installed(
        &self,
        target: u32,
        branch: Branch,
    ) -> Result<UpdateOutcome, UpdateError> {
        let current = self
            .store
            .load_installed_version()
            .map_err(UpdateError::store)?;
        if current == Some(target) {
            if self.layout.client_binary().exists() {
                info!(target, "client already at target version");
                return Ok(UpdateOutcome::UpToDate);
            }
            warn!(
                target,
                binary = %self.layout.client_binary().display(),
                "version record matches but client binary is missing, reinstalling"
            );
            return self.full_install(Some(target), target, branch).await;
        }
        self.perform_update(target, branch).await
    }

    /// Bring the installation to `target`, stepping through every intermediate
    /// version on the release branch and persisting after each step.
    ///
    /// Any acquisition or deployment failure aborts the remaining plan;
    /// persisted progress is retained, so re-invoking resumes from the last
    /// applied version.
    pub async fn perform_update(
        &self,
        target: u32,
        branch: Branch,
    ) -> Result<UpdateOutcome, UpdateError> {
        let current = self
            .store
            .load_installed_version()
            .map_err(UpdateError::store)?;

        let Some(current) = current else {
            info!(target, %branch, "no installed version, performing full install");
            return self.full_install(None, target, branch).await;
        };
        if !branch.is_release() {
            info!(target, %branch, "non-release branch, forcing full install");
            return self.full_install(Some(current), target, branch).await;
        }

        let plan = resolve_plan(Some(current), target, branch);
        if plan.is_empty() {
            info!(current, target, "nothing to do");
            return Ok(UpdateOutcome::UpToDate);
        }

        let total = plan.len();
        let mut installed = current;
        for (i, step) in plan.iter().copied().enumerate() {
            info!(step, index = i + 1, total, "update step");
            self.report(&format!("updating to version {step} ({}/{total})", i + 1), None);

            let step_info = self.index.info(step, branch).await?;
            let usable = differential_usable(&step_info, installed);
            if !usable && step_info.diff_url.is_some() {
                // Mid-chain fallback: correct, but it defeats the bandwidth
                // saving of differential chaining, so make it loud.
                warn!(
                    version = step,
                    declared_source = ?step_info.diff_source,
                    installed,
                    "differential archive unusable for this step, falling back to full archive"
                );
            }

            match step_info.diff_url.clone().filter(|_| usable) {
                Some(diff_url) => {
                    let archive = self.layout.archive_path(branch, step, true);
                    self.acquire_archive(&step_info, &diff_url, &archive).await?;
                    self.deploy_archive(&archive, true).await?;
                    // Differential patches are single-use, not retained.
                    if let Err(e) = tokio::fs::remove_file(&archive).await {
                        warn!(archive = %archive.display(), error = %e, "failed to remove applied differential");
                    }
                }
                None => {
                    let archive = self.layout.archive_path(branch, step, false);
                    self.acquire_archive(&step_info, &step_info.full_url, &archive)
                        .await?;
                    self.deploy_archive(&archive, false).await?;
                }
            }

            // Resumability boundary: persist before moving to the next step.
            self.store
                .save_installed_version(step)
                .map_err(UpdateError::store)?;
            installed = step;
        }

        Ok(UpdateOutcome::Updated {
            from:  Some(current),
            to:    target,
            steps: total,
        })
    }

    async fn full_install(
        &self,
        from: Option<u32>,
        target: u32,
        branch: Branch,
    ) -> Result<UpdateOutcome, UpdateError> {
        let target_info = self.index.info(target, branch).await?;
        let archive = self.layout.archive_path(branch, target, false);
        self.acquire_archive(&target_info, &target_info.full_url, &archive)
            .await?;
        self.deploy_archive(&archive, false).await?;
        self.store
            .save_installed_version(target)
            .map_err(UpdateError::store)?;
        Ok(UpdateOutcome::Updated {
            from,
            to: target,
            steps: 1,
        })
    }

    async fn acquire_archive(
        &self,
        step_info: &VersionInfo,
        url: &str,
        archive: &Path,
    ) -> Result<(), UpdateError> {
        let mut options = AcquireOptions::default().checksum(step_info.checksum.clone());
        if let Some(sink) = self.on_progress.clone() {
            let version = step_info.version;
            options = options.on_progress(Arc::new(move |p: Progress| match p.phase {
                DownloadPhase::Connecting => {
                    sink(&format!("downloading version {version}"), Some(0.0))
                }
                DownloadPhase::Downloading => {
                    sink(&format!("downloading version {version}"), p.percentage())
                }
                DownloadPhase::Verifying => {
                    sink(&format!("verifying version {version}"), None)
                }
                DownloadPhase::Completed => {
                    sink(&format!("version {version} ready"), None)
                }
            }));
        }
        self.acquirer.acquire(url, archive, &options).await?;
        Ok(())
    }

    async fn deploy_archive(&self, archive: &Path, differential: bool) -> Result<(), UpdateError> {
        self.report("applying update", None);
        let result = self
            .deployer
            .deploy(
                archive,
                &self.layout.install_dir,
                &self.layout.tools_dir,
                differential,
            )
            .await;

        match result {
            Ok(()) => {
                self.report("update applied", None);
                Ok(())
            }
            Err(e) => {
                // A corrupted cache entry would fail every retry; evict it so
                // the caller's next attempt re-downloads.
                if e.failure_kind() == Some(FailureKind::CorruptedArchive) {
                    warn!(archive = %archive.display(), "apply tool reports corrupt archive, evicting cache entry");
                    let _ = tokio::fs::remove_file(archive).await;
                }
                Err(e.into())
            }
        }
    }

    fn report(&self, message: &str, percent: Option<f32>) {
        if let Some(ref sink) = self.on_progress {
            sink(message, percent);
        }
    }
}
