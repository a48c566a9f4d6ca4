//! Scripted executor for testing.
//!
//! Allows queueing output per command and capturing every invocation for
//! verification.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use super::{RemoteError, RemoteExecutor};

/// In-memory executor answering from canned output.
///
/// Each command has a queue of responses. Queued responses are consumed
/// in order; once only one is left it is repeated for every further call,
/// so a poll loop keeps seeing the last state. Unknown commands fail.
#[derive(Debug, Default, Clone)]
pub struct ScriptedExecutor {
    inner: Arc<Mutex<ScriptedInner>>,
}

#[derive(Debug, Default)]
struct ScriptedInner {
    responses: HashMap<String, VecDeque<Result<String, i32>>>,
    calls: Vec<(String, String)>,
}

impl ScriptedExecutor {
    /// Create an executor with no scripted commands.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue stdout to return for `command`.
    pub fn respond(&self, command: &str, stdout: &str) -> &Self {
        self.push(command, Ok(stdout.to_string()));
        self
    }

    /// Queue a non-zero exit for `command`.
    pub fn fail(&self, command: &str, exit_code: i32) -> &Self {
        self.push(command, Err(exit_code));
        self
    }

    /// Every `(target, command)` seen so far, in order.
    pub fn calls(&self) -> Vec<(String, String)> {
        let inner = self.inner.lock().unwrap();
        inner.calls.clone()
    }

    /// How many times `command` was run.
    pub fn call_count(&self, command: &str) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.calls.iter().filter(|(_, c)| c == command).count()
    }

    fn push(&self, command: &str, response: Result<String, i32>) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .responses
            .entry(command.to_string())
            .or_default()
            .push_back(response);
    }
}

#[async_trait]
impl RemoteExecutor for ScriptedExecutor {
    async fn run(&self, target: &str, command: &str) -> Result<String, RemoteError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push((target.to_string(), command.to_string()));

        let response = match inner.responses.get_mut(command) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };

        match response {
            Some(Ok(stdout)) => Ok(stdout),
            Some(Err(exit_code)) => Err(RemoteError::CommandFailed {
                target: target.to_string(),
                command: command.to_string(),
                exit_code,
                stderr: "scripted failure".into(),
            }),
            None => Err(RemoteError::CommandFailed {
                target: target.to_string(),
                command: command.to_string(),
                exit_code: 127,
                stderr: "command not scripted".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queued_responses_then_repeat_last() {
        let exec = ScriptedExecutor::new();
        exec.respond("ceph osd stat", "first")
            .respond("ceph osd stat", "second");

        assert_eq!(exec.run("a@h", "ceph osd stat").await.unwrap(), "first");
        assert_eq!(exec.run("a@h", "ceph osd stat").await.unwrap(), "second");
        assert_eq!(exec.run("a@h", "ceph osd stat").await.unwrap(), "second");
        assert_eq!(exec.call_count("ceph osd stat"), 3);
    }

    #[tokio::test]
    async fn unscripted_command_fails() {
        let exec = ScriptedExecutor::new();
        let err = exec.run("a@h", "uptime").await.unwrap_err();
        assert!(matches!(err, RemoteError::CommandFailed { exit_code: 127, .. }));
        assert_eq!(exec.calls(), vec![("a@h".to_string(), "uptime".to_string())]);
    }

    #[tokio::test]
    async fn scripted_failure() {
        let exec = ScriptedExecutor::new();
        exec.fail("ceph pg stat", 1);
        let err = exec.run("a@h", "ceph pg stat").await.unwrap_err();
        assert!(matches!(err, RemoteError::CommandFailed { exit_code: 1, .. }));
    }
}
