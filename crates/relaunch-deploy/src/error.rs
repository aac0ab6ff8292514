use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::classify::FailureKind;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("apply tool not found at {path}")]
    ToolMissing { path: PathBuf },

    #[error("failed to start apply tool {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("apply tool exceeded the {}s deployment timeout", timeout.as_secs())]
    TimedOut { timeout: std::time::Duration },

    #[error("{}", kind.user_message())]
    Failed {
        kind:      FailureKind,
        exit_code: Option<i32>,
        detail:    String,
    },

    #[error("deployment I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DeployError {
    /// Classified kind, when the failure came from tool output.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            DeployError::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
