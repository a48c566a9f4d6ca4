//! One simulated cluster: its agents, state service and working directory.

use futures_util::future::join_all;
use std::path::Path;
use tempfile::TempDir;
use tokio::task::JoinHandle;

use fleet_types::{AgentAddress, ClusterId};

use super::agent::AgentHandle;
use super::cluster::{ClusterHandle, ClusterService, ClusterState};
use crate::config::EmbeddedConfig;
use crate::error::ControlError;

/// A simulated cluster and the agents that make up its fleet.
///
/// Owns everything it creates. [`close`](SimulatedFleet::close) releases it
/// in order: agents, then the state service, then the working directory.
#[derive(Debug)]
pub struct SimulatedFleet {
    fsid: ClusterId,
    domain: String,
    workdir: TempDir,
    cluster: ClusterHandle,
    service: Option<JoinHandle<()>>,
    agents: Vec<AgentHandle>,
}

impl SimulatedFleet {
    /// Lay out a working directory and state for `server_count` agents in
    /// domain `cluster<index>.<suffix>`. Agents are created stopped.
    pub fn create(
        index: usize,
        server_count: usize,
        config: &EmbeddedConfig,
    ) -> Result<Self, ControlError> {
        let domain = format!("cluster{}.{}", index, config.domain_suffix);
        let workdir = tempfile::Builder::new()
            .prefix(&format!("fleet-cluster{index}-"))
            .tempdir()?;

        let fqdns = (0..server_count)
            .map(|i| AgentAddress::new(format!("node{i:03}.{domain}")))
            .collect::<Result<Vec<_>, _>>()?;

        for fqdn in &fqdns {
            std::fs::create_dir_all(workdir.path().join("agents").join(fqdn.as_str()))?;
        }

        let fsid = ClusterId::new();
        let state = ClusterState::new(fsid, domain.clone(), &fqdns, config);
        let (cluster, service) = ClusterService::spawn(state, workdir.path().join("cluster.json"))?;

        let agents = fqdns
            .into_iter()
            .map(|fqdn| AgentHandle::new(fqdn, cluster.clone(), config.heartbeat_interval()))
            .collect();

        tracing::debug!(
            "Created fleet {} ({} agents) in {}",
            domain,
            server_count,
            workdir.path().display()
        );

        Ok(Self {
            fsid,
            domain,
            workdir,
            cluster,
            service: Some(service),
            agents,
        })
    }

    /// Cluster fsid.
    pub fn fsid(&self) -> ClusterId {
        self.fsid
    }

    /// Generated domain, e.g. `cluster0.com`.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Working directory holding `cluster.json` and per-agent directories.
    pub fn working_dir(&self) -> &Path {
        self.workdir.path()
    }

    /// Handle to the cluster state service.
    pub fn cluster(&self) -> &ClusterHandle {
        &self.cluster
    }

    /// Agent addresses in creation order.
    pub fn agent_fqdns(&self) -> Vec<AgentAddress> {
        self.agents.iter().map(|a| a.fqdn().clone()).collect()
    }

    /// Whether `fqdn`'s agent is currently halted.
    pub fn is_dark(&self, fqdn: &AgentAddress) -> Result<bool, ControlError> {
        self.agents
            .iter()
            .find(|a| a.fqdn() == fqdn)
            .map(|a| !a.is_running())
            .ok_or_else(|| self.unknown_agent(fqdn))
    }

    /// Start every agent.
    pub fn start(&mut self) {
        tracing::info!("Starting {} agents for {}", self.agents.len(), self.domain);
        for agent in &mut self.agents {
            agent.start();
        }
    }

    /// Halt one agent and wait for its task to finish.
    pub async fn halt_agent(&mut self, fqdn: &AgentAddress) -> Result<(), ControlError> {
        tracing::info!("Halting agent {}", fqdn);
        self.agent_mut(fqdn)?.halt().await
    }

    /// Restart one halted agent.
    pub fn resume_agent(&mut self, fqdn: &AgentAddress) -> Result<(), ControlError> {
        tracing::info!("Resuming agent {}", fqdn);
        self.agent_mut(fqdn)?.start();
        Ok(())
    }

    /// Halt every agent concurrently. All agents are joined even if one
    /// fails; the first failure is returned.
    pub async fn halt_all(&mut self) -> Result<(), ControlError> {
        tracing::info!("Halting all agents for {}", self.domain);
        for agent in &mut self.agents {
            agent.stop();
        }
        join_all(self.agents.iter_mut().map(|agent| agent.join()))
            .await
            .into_iter()
            .collect()
    }

    /// Restart every halted agent.
    pub fn resume_all(&mut self) {
        tracing::info!("Resuming all agents for {}", self.domain);
        for agent in &mut self.agents {
            agent.start();
        }
    }

    /// Halt agents, stop the state service and remove the working
    /// directory. Every step runs even if an earlier one failed.
    pub async fn close(mut self) -> Result<(), ControlError> {
        let halted = self.halt_all().await;
        let stopped = self.stop_service().await;

        let path = self.workdir.path().to_path_buf();
        let removed = self.workdir.close().map_err(ControlError::from);
        if removed.is_ok() {
            tracing::debug!("Removed {}", path.display());
        }

        halted.and(stopped).and(removed)
    }

    async fn stop_service(&mut self) -> Result<(), ControlError> {
        let Some(service) = self.service.take() else {
            return Ok(());
        };
        // A failed send means the service already exited; the join reports why.
        let _ = self.cluster.stop().await;
        service.await.map_err(|e| {
            ControlError::Environment(format!(
                "cluster state service for {} did not exit cleanly: {e}",
                self.fsid
            ))
        })
    }

    fn agent_mut(&mut self, fqdn: &AgentAddress) -> Result<&mut AgentHandle, ControlError> {
        let fsid = self.fsid;
        self.agents
            .iter_mut()
            .find(|a| a.fqdn() == fqdn)
            .ok_or_else(|| ControlError::UnknownAgent {
                fsid,
                agent: fqdn.clone(),
            })
    }

    fn unknown_agent(&self, fqdn: &AgentAddress) -> ControlError {
        ControlError::UnknownAgent {
            fsid: self.fsid,
            agent: fqdn.clone(),
        }
    }
}
