//! `ssh`-backed executor.
//!
//! Uses `tokio::process::Command` to shell out to `ssh`.
//! Keys must be pre-configured; `BatchMode` keeps a missing key from
//! hanging on a password prompt.

use async_trait::async_trait;

use super::{RemoteError, RemoteExecutor};

/// Executes commands on remote targets through the local `ssh` binary.
#[derive(Debug, Clone)]
pub struct SshExecutor {
    connect_timeout_secs: u64,
}

impl SshExecutor {
    /// Create an executor with the given connection timeout.
    pub fn new(connect_timeout_secs: u64) -> Self {
        Self {
            connect_timeout_secs,
        }
    }

    /// Arguments passed to `ssh` for one invocation.
    fn args(&self, target: &str, command: &str) -> Vec<String> {
        vec![
            "-o".into(),
            "StrictHostKeyChecking=no".into(),
            "-o".into(),
            format!("ConnectTimeout={}", self.connect_timeout_secs),
            "-o".into(),
            "BatchMode=yes".into(),
            target.into(),
            command.into(),
        ]
    }
}

impl Default for SshExecutor {
    fn default() -> Self {
        Self::new(30)
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn run(&self, target: &str, command: &str) -> Result<String, RemoteError> {
        tracing::debug!("ssh {}: {}", target, command);

        let output = tokio::process::Command::new("ssh")
            .args(self.args(target, command))
            .output()
            .await?;

        if !output.status.success() {
            return Err(RemoteError::CommandFailed {
                target: target.to_string(),
                command: command.to_string(),
                exit_code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_place_target_before_command() {
        let ssh = SshExecutor::new(5);
        let args = ssh.args("ubuntu@mira002", "ceph osd stat");
        assert_eq!(args[3], "ConnectTimeout=5");
        assert_eq!(&args[args.len() - 2..], ["ubuntu@mira002", "ceph osd stat"]);
        assert!(args.contains(&"BatchMode=yes".to_string()));
    }

    #[test]
    fn default_timeout_is_thirty_seconds() {
        let args = SshExecutor::default().args("h", "true");
        assert_eq!(args[3], "ConnectTimeout=30");
    }

    #[tokio::test]
    #[ignore = "requires external cluster"]
    async fn ssh_run_whoami() {
        let target = std::env::var("FLEET_SSH_TARGET").expect("FLEET_SSH_TARGET not set");
        let out = SshExecutor::default()
            .run(&target, "whoami")
            .await
            .expect("ssh whoami failed");
        assert!(!out.trim().is_empty());
    }
}
