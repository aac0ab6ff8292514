//! Archive deployment through the external apply tool.
//!
//! The deployer stages intermediate state in a scratch directory under the
//! install dir, runs the tool with a hard wall-clock timeout, and classifies
//! failures from the captured output rather than the bare exit status. The
//! classification is a pure function so it can be tested without spawning
//! anything.

mod classify;
mod deploy;
mod error;
mod runner;

pub use classify::{FailureKind, classify_failure};
pub use deploy::{APPLY_TIMEOUT, Deployer, STAGING_DIR_NAME};
pub use error::DeployError;
pub use runner::{CommandOutput, CommandRunner, MAX_CAPTURED_OUTPUT, TokioRunner};
