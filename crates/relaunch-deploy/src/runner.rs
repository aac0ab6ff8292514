use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

/// Captured stream text is truncated to this many bytes per stream.
pub const MAX_CAPTURED_OUTPUT: usize = 64 * 1024;

/// Structured result of a finished (or timed-out) subprocess.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout:    String,
    pub stderr:    String,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool { !self.timed_out && self.exit_code == Some(0) }
}

pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        program: &Path,
        args: &[String],
        timeout: Duration,
    ) -> impl Future<Output = io::Result<CommandOutput>> + Send;
}

/// Runs the program through `tokio::process`, killing it when the wall-clock
/// timeout elapses.
pub struct TokioRunner;

impl CommandRunner for TokioRunner {
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        timeout: Duration,
    ) -> io::Result<CommandOutput> {
        let child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output?;
                Ok(CommandOutput {
                    exit_code: output.status.code(),
                    stdout:    truncate_lossy(&output.stdout),
                    stderr:    truncate_lossy(&output.stderr),
                    timed_out: false,
                })
            }
            // kill_on_drop reaps the child once the future is dropped.
            Err(_) => Ok(CommandOutput {
                exit_code: None,
                stdout:    String::new(),
                stderr:    String::new(),
                timed_out: true,
            }),
        }
    }
}

fn truncate_lossy(bytes: &[u8]) -> String {
    let slice = if bytes.len() > MAX_CAPTURED_OUTPUT {
        &bytes[..MAX_CAPTURED_OUTPUT]
    } else {
        bytes
    };
    String::from_utf8_lossy(slice).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_requires_zero_exit() {
        let ok = CommandOutput {
            exit_code: Some(0),
            ..Default::default()
        };
        assert!(ok.success());

        let failed = CommandOutput {
            exit_code: Some(2),
            ..Default::default()
        };
        assert!(!failed.success());

        let timed_out = CommandOutput {
            exit_code: Some(0),
            timed_out: true,
            ..Default::default()
        };
        assert!(!timed_out.success());
    }

    #[test]
    fn truncates_oversized_output() {
        let big = vec![b'x'; MAX_CAPTURED_OUTPUT + 100];
        assert_eq!(truncate_lossy(&big).len(), MAX_CAPTURED_OUTPUT);
    }

    #[tokio::test]
    async fn runs_real_process() {
        let runner = TokioRunner;
        let output = runner
            .run(
                Path::new("/bin/echo"),
                &["staging".to_string()],
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert!(output.success());
        assert!(output.stdout.contains("staging"));
    }

    #[tokio::test]
    async fn timeout_is_reported_not_errored() {
        let runner = TokioRunner;
        let output = runner
            .run(
                Path::new("/bin/sleep"),
                &["5".to_string()],
                Duration::from_millis(50),
            )
            .await
            .unwrap();
        assert!(output.timed_out);
        assert!(!output.success());
    }
}
