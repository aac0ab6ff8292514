use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::classify::classify_failure;
use crate::error::DeployError;
use crate::runner::CommandRunner;

/// Hard wall-clock limit for one apply-tool run. Exceeding it is fatal, not
/// retryable.
pub const APPLY_TIMEOUT: Duration = Duration::from_secs(600);

/// Scratch subdirectory under the install dir used by the apply tool.
pub const STAGING_DIR_NAME: &str = ".apply-staging";

#[cfg(target_os = "windows")]
const APPLY_TOOL: &str = "archive-apply.exe";
#[cfg(not(target_os = "windows"))]
const APPLY_TOOL: &str = "archive-apply";

pub struct Deployer<R: CommandRunner> {
    runner:  R,
    timeout: Duration,
}

impl<R: CommandRunner> Deployer<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            timeout: APPLY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Apply `archive` onto `dest_dir` using the external tool from
    /// `tools_dir`, staging intermediate state under the install dir.
    ///
    /// The staging directory is recreated clean before the run; leftover
    /// staging state from a crashed run must never leak into a new one.
    pub async fn deploy(
        &self,
        archive: &Path,
        dest_dir: &Path,
        tools_dir: &Path,
        differential: bool,
    ) -> Result<(), DeployError> {
        let tool = tools_dir.join(APPLY_TOOL);
        if !tool.exists() {
            return Err(DeployError::ToolMissing { path: tool });
        }

        let staging = dest_dir.join(STAGING_DIR_NAME);
        recreate_dir(&staging).await?;

        let mut args = vec![
            "--staging".to_string(),
            staging.display().to_string(),
        ];
        if differential {
            args.push("--diff".to_string());
        }
        args.push(archive.display().to_string());
        args.push(dest_dir.display().to_string());

        info!(
            archive = %archive.display(),
            dest = %dest_dir.display(),
            differential,
            "applying archive"
        );

        let output = self
            .runner
            .run(&tool, &args, self.timeout)
            .await
            .map_err(|source| DeployError::Spawn {
                program: tool.clone(),
                source,
            })?;

        if output.timed_out {
            return Err(DeployError::TimedOut {
                timeout: self.timeout,
            });
        }

        if !output.success() {
            let kind = classify_failure(&output);
            warn!(?kind, exit_code = ?output.exit_code, "apply tool failed");
            return Err(DeployError::Failed {
                kind,
                exit_code: output.exit_code,
                detail: output.stderr,
            });
        }

        // Best-effort cleanup; a lingering staging dir is cosmetic.
        if let Err(e) = tokio::fs::remove_dir_all(&staging).await {
            warn!(staging = %staging.display(), error = %e, "failed to remove staging directory");
        }

        info!(dest = %dest_dir.display(), "archive applied");
        Ok(())
    }
}

async fn recreate_dir(dir: &Path) -> Result<(), DeployError> {
    if tokio::fs::metadata(dir).await.is_ok() {
        tokio::fs::remove_dir_all(dir)
            .await
            .map_err(|source| DeployError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
    }
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| DeployError::Io {
            path: dir.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::FailureKind;
    use crate::runner::CommandOutput;
    use std::io;
    use std::sync::Mutex;

    struct MockRunner {
        result:    Mutex<Option<io::Result<CommandOutput>>>,
        seen_args: Mutex<Vec<String>>,
        seen_tool: Mutex<Option<PathBuf>>,
    }

    impl MockRunner {
        fn returning(result: io::Result<CommandOutput>) -> Self {
            Self {
                result:    Mutex::new(Some(result)),
                seen_args: Mutex::new(Vec::new()),
                seen_tool: Mutex::new(None),
            }
        }
    }

    impl CommandRunner for MockRunner {
        async fn run(
            &self,
            program: &Path,
            args: &[String],
            _timeout: Duration,
        ) -> io::Result<CommandOutput> {
            *self.seen_tool.lock().unwrap() = Some(program.to_path_buf());
            *self.seen_args.lock().unwrap() = args.to_vec();
            self.result.lock().unwrap().take().unwrap()
        }
    }

    fn install_fixture() -> (tempfile::TempDir, PathBuf, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("game");
        let tools = dir.path().join("tools");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::create_dir_all(&tools).unwrap();
        std::fs::write(tools.join(APPLY_TOOL), b"#!/bin/sh\n").unwrap();
        let archive = dir.path().join("v7.archive");
        std::fs::write(&archive, b"payload").unwrap();
        (dir, dest, tools, archive)
    }

    #[tokio::test]
    async fn success_removes_staging() {
        let (_dir, dest, tools, archive) = install_fixture();
        // Leftover staging state from a previous crashed run.
        let staging = dest.join(STAGING_DIR_NAME);
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::write(staging.join("leftover.tmp"), b"junk").unwrap();

        let runner = MockRunner::returning(Ok(CommandOutput {
            exit_code: Some(0),
            ..Default::default()
        }));
        let deployer = Deployer::new(runner);
        deployer.deploy(&archive, &dest, &tools, false).await.unwrap();

        assert!(!staging.exists());
    }

    #[tokio::test]
    async fn differential_flag_is_passed() {
        let (_dir, dest, tools, archive) = install_fixture();
        let runner = MockRunner::returning(Ok(CommandOutput {
            exit_code: Some(0),
            ..Default::default()
        }));
        let deployer = Deployer::new(runner);
        deployer.deploy(&archive, &dest, &tools, true).await.unwrap();

        let args = deployer.runner.seen_args.lock().unwrap().clone();
        assert!(args.contains(&"--diff".to_string()));
        assert_eq!(args[0], "--staging");
    }

    #[tokio::test]
    async fn missing_tool_is_detected_before_spawn() {
        let (_dir, dest, _tools, archive) = install_fixture();
        let empty_tools = dest.join("no-tools");
        std::fs::create_dir_all(&empty_tools).unwrap();

        let runner = MockRunner::returning(Ok(CommandOutput::default()));
        let deployer = Deployer::new(runner);
        let err = deployer
            .deploy(&archive, &dest, &empty_tools, false)
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::ToolMissing { .. }));
    }

    #[tokio::test]
    async fn failure_is_classified_from_output() {
        let (_dir, dest, tools, archive) = install_fixture();
        let runner = MockRunner::returning(Ok(CommandOutput {
            exit_code: Some(1),
            stderr: "block 9: archive is corrupt".to_string(),
            ..Default::default()
        }));
        let deployer = Deployer::new(runner);
        let err = deployer
            .deploy(&archive, &dest, &tools, false)
            .await
            .unwrap_err();
        assert_eq!(err.failure_kind(), Some(FailureKind::CorruptedArchive));
    }

    #[tokio::test]
    async fn timeout_is_fatal() {
        let (_dir, dest, tools, archive) = install_fixture();
        let runner = MockRunner::returning(Ok(CommandOutput {
            timed_out: true,
            ..Default::default()
        }));
        let deployer = Deployer::new(runner);
        let err = deployer
            .deploy(&archive, &dest, &tools, false)
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::TimedOut { .. }));
    }

    #[tokio::test]
    async fn spawn_error_carries_program() {
        let (_dir, dest, tools, archive) = install_fixture();
        let runner = MockRunner::returning(Err(io::Error::new(
            io::ErrorKind::NotFound,
            "no such file",
        )));
        let deployer = Deployer::new(runner);
        let err = deployer
            .deploy(&archive, &dest, &tools, false)
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::Spawn { .. }));
    }
}
