//! Simulated fleet member.
//!
//! An agent is a tokio task that heartbeats to its cluster's state service
//! until told to stop. Halting the task is how a member "goes dark": the
//! cluster stops hearing from it, though heartbeats already queued are
//! still delivered.

use rand::Rng;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use fleet_types::AgentAddress;

use super::cluster::ClusterHandle;
use crate::error::ControlError;

/// Owned handle to one simulated agent.
///
/// Lifecycle: `start` spawns the task, `stop` signals it, `join` waits for
/// it to finish. `halt` is `stop` followed by `join`.
#[derive(Debug)]
pub struct AgentHandle {
    fqdn: AgentAddress,
    cluster: ClusterHandle,
    heartbeat: Duration,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl AgentHandle {
    /// Create a stopped agent.
    pub fn new(fqdn: AgentAddress, cluster: ClusterHandle, heartbeat: Duration) -> Self {
        Self {
            fqdn,
            cluster,
            heartbeat: heartbeat.max(Duration::from_millis(1)),
            stop: None,
            task: None,
        }
    }

    /// The agent's address.
    pub fn fqdn(&self) -> &AgentAddress {
        &self.fqdn
    }

    /// True between `start` and `stop`, as long as the task has not exited
    /// on its own.
    pub fn is_running(&self) -> bool {
        self.stop.is_some() && self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Spawn the agent task. No-op while a previous task is still alive.
    pub fn start(&mut self) {
        if self.task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let fqdn = self.fqdn.clone();
        let cluster = self.cluster.clone();
        let period = self.heartbeat;

        tracing::debug!("Starting agent {}", self.fqdn);
        self.stop = Some(stop_tx);
        self.task = Some(tokio::spawn(run(fqdn, cluster, period, stop_rx)));
    }

    /// Signal the task to exit. Does not wait for it.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            tracing::debug!("Stopping agent {}", self.fqdn);
            let _ = stop.send(());
        }
    }

    /// Wait for a stopped task to finish.
    pub async fn join(&mut self) -> Result<(), ControlError> {
        match self.task.take() {
            Some(task) => task.await.map_err(|e| {
                ControlError::Environment(format!("agent {} did not exit cleanly: {e}", self.fqdn))
            }),
            None => Ok(()),
        }
    }

    /// Stop and join.
    pub async fn halt(&mut self) -> Result<(), ControlError> {
        self.stop();
        self.join().await
    }
}

async fn run(
    fqdn: AgentAddress,
    cluster: ClusterHandle,
    period: Duration,
    mut stop: oneshot::Receiver<()>,
) {
    // Spread the first heartbeat so agents started together don't report in lockstep.
    let jitter = {
        let max = period.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(0..=max))
    };
    let mut ticker = tokio::time::interval_at(Instant::now() + jitter, period);

    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = ticker.tick() => {
                if let Err(e) = cluster.heartbeat(&fqdn).await {
                    tracing::debug!("Agent {} lost its cluster: {}", fqdn, e);
                    break;
                }
            }
        }
    }

    tracing::debug!("Agent {} exited", fqdn);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddedConfig;
    use crate::embedded::cluster::{ClusterService, ClusterState};
    use fleet_types::ClusterId;

    async fn cluster(dir: &std::path::Path, fqdn: &AgentAddress) -> ClusterHandle {
        let state = ClusterState::new(
            ClusterId::new(),
            "cluster0.com",
            std::slice::from_ref(fqdn),
            &EmbeddedConfig::default(),
        );
        ClusterService::spawn(state, dir.join("cluster.json"))
            .unwrap()
            .0
    }

    #[tokio::test]
    async fn start_stop_join() {
        let dir = tempfile::tempdir().unwrap();
        let fqdn = AgentAddress::new("node000.cluster0.com").unwrap();
        let handle = cluster(dir.path(), &fqdn).await;
        let mut agent = AgentHandle::new(fqdn.clone(), handle.clone(), Duration::from_millis(2));

        assert!(!agent.is_running());
        agent.start();
        assert!(agent.is_running());

        tokio::time::sleep(Duration::from_millis(30)).await;
        agent.halt().await.unwrap();
        assert!(!agent.is_running());

        let seen = handle.snapshot().await.unwrap().heartbeats(&fqdn).unwrap();
        assert!(seen > 0, "agent should have reported at least once");

        tokio::time::sleep(Duration::from_millis(20)).await;
        let later = handle.snapshot().await.unwrap().heartbeats(&fqdn).unwrap();
        assert_eq!(seen, later, "halted agent must not keep reporting");
    }

    #[tokio::test]
    async fn restart_after_halt() {
        let dir = tempfile::tempdir().unwrap();
        let fqdn = AgentAddress::new("node000.cluster0.com").unwrap();
        let handle = cluster(dir.path(), &fqdn).await;
        let mut agent = AgentHandle::new(fqdn, handle, Duration::from_millis(2));

        agent.start();
        agent.halt().await.unwrap();
        agent.start();
        assert!(agent.is_running());
        agent.halt().await.unwrap();
    }

    #[tokio::test]
    async fn halt_without_start_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let fqdn = AgentAddress::new("node000.cluster0.com").unwrap();
        let handle = cluster(dir.path(), &fqdn).await;
        let mut agent = AgentHandle::new(fqdn, handle, Duration::from_millis(2));
        agent.halt().await.unwrap();
        agent.join().await.unwrap();
    }

    #[tokio::test]
    async fn agent_exits_when_cluster_is_gone() {
        let dir = tempfile::tempdir().unwrap();
        let fqdn = AgentAddress::new("node000.cluster0.com").unwrap();
        let handle = cluster(dir.path(), &fqdn).await;
        handle.stop().await.unwrap();

        let mut agent = AgentHandle::new(fqdn, handle, Duration::from_millis(1));
        agent.start();
        tokio::time::timeout(Duration::from_secs(1), async {
            while agent.is_running() {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("agent should exit on its own");

        assert!(!agent.is_running());
        agent.join().await.unwrap();
    }

    #[tokio::test]
    async fn restart_after_task_exited_on_its_own() {
        let dir = tempfile::tempdir().unwrap();
        let fqdn = AgentAddress::new("node000.cluster0.com").unwrap();
        let handle = cluster(dir.path(), &fqdn).await;
        handle.stop().await.unwrap();

        let mut agent = AgentHandle::new(fqdn, handle, Duration::from_millis(1));
        agent.start();
        tokio::time::timeout(Duration::from_secs(1), async {
            while agent.is_running() {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap();

        // A finished task does not block a new one.
        agent.start();
        assert!(agent.stop.is_some());
        agent.halt().await.unwrap();
    }
}
