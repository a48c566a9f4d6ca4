//! Remote command execution.
//!
//! The external backend only ever needs one primitive: run a command string
//! on a named target and hand back its stdout. There is no retry here; the
//! convergence poller decides whether to ask again.
//!
//! - [`SshExecutor`] shells out to `ssh` (authentication must already be set
//!   up, e.g. with keys)
//! - [`ScriptedExecutor`] answers from canned output, for tests

mod mock;
mod ssh;

pub use mock::ScriptedExecutor;
pub use ssh::SshExecutor;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from remote command execution.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The transport process could not be started.
    #[error("failed to spawn remote command: {0}")]
    Spawn(#[from] std::io::Error),

    /// The command ran but exited non-zero.
    #[error("command `{command}` failed on {target}: exit={exit_code}, stderr={stderr}")]
    CommandFailed {
        /// `user@host` the command ran on.
        target: String,
        /// The command line.
        command: String,
        /// Exit code (-1 if killed by a signal).
        exit_code: i32,
        /// Standard error output.
        stderr: String,
    },
}

/// Runs a command against a named target and returns captured stdout.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run `command` on `target` (`user@host`).
    ///
    /// Fails if the command cannot be started or exits non-zero.
    async fn run(&self, target: &str, command: &str) -> Result<String, RemoteError>;
}
