//! Embedded backend: simulated clusters run in-process.
//!
//! Each configured cluster is a [`SimulatedFleet`]: a state service plus one
//! heartbeating agent task per server. Going dark halts agent tasks; the
//! cluster simply stops hearing from them.

mod agent;
mod cluster;
mod fleet;

pub use agent::AgentHandle;
pub use cluster::{ClusterHandle, ClusterService, ClusterState, HostRecord, OsdRecord};
pub use fleet::SimulatedFleet;

use async_trait::async_trait;
use futures_util::future::join_all;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use fleet_types::{AgentAddress, ClusterId, ClusterShape};

use crate::config::{Config, EmbeddedConfig, TimingConfig};
use crate::controller::FleetController;
use crate::error::ControlError;

/// Controller owning zero or more simulated fleets, keyed by fsid.
#[derive(Debug)]
pub struct EmbeddedFleetController {
    config: EmbeddedConfig,
    drain_window: Duration,
    fleets: BTreeMap<ClusterId, SimulatedFleet>,
    next_index: usize,
}

impl EmbeddedFleetController {
    /// Create a controller owning no fleets.
    pub fn new(config: EmbeddedConfig, timing: &TimingConfig) -> Self {
        Self {
            config,
            drain_window: timing.drain_window(),
            fleets: BTreeMap::new(),
            next_index: 0,
        }
    }

    /// Create a controller from the `[embedded]` and `[timing]` sections.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.embedded.clone(), &config.timing)
    }

    /// State service handle for one cluster.
    pub fn cluster(&self, fsid: ClusterId) -> Result<&ClusterHandle, ControlError> {
        Ok(self.fleet(fsid)?.cluster())
    }

    /// Working directory of one cluster.
    pub fn working_dir(&self, fsid: ClusterId) -> Result<&Path, ControlError> {
        Ok(self.fleet(fsid)?.working_dir())
    }

    /// Whether `fqdn` in cluster `fsid` is currently dark.
    pub fn is_dark(&self, fsid: ClusterId, fqdn: &AgentAddress) -> Result<bool, ControlError> {
        self.fleet(fsid)?.is_dark(fqdn)
    }

    fn fleet(&self, fsid: ClusterId) -> Result<&SimulatedFleet, ControlError> {
        self.fleets
            .get(&fsid)
            .ok_or(ControlError::UnknownCluster(fsid))
    }

    fn fleet_mut(&mut self, fsid: ClusterId) -> Result<&mut SimulatedFleet, ControlError> {
        self.fleets
            .get_mut(&fsid)
            .ok_or(ControlError::UnknownCluster(fsid))
    }

    fn agent_count(&self) -> usize {
        self.fleets.values().map(|f| f.agent_fqdns().len()).sum()
    }

    /// Give the state services time to work through messages sent by
    /// agents that have just been halted or resumed.
    async fn drain(&self) {
        if !self.drain_window.is_zero() {
            tracing::debug!("Draining for {:?}", self.drain_window);
            tokio::time::sleep(self.drain_window).await;
        }
    }

    /// Tear down fleets created by a `configure` call that failed part way.
    async fn discard(&mut self, fsids: Vec<ClusterId>) {
        for fsid in fsids {
            if let Some(fleet) = self.fleets.remove(&fsid) {
                if let Err(e) = fleet.close().await {
                    tracing::warn!("Failed to discard fleet {}: {}", fsid, e);
                }
            }
        }
    }
}

#[async_trait]
impl FleetController for EmbeddedFleetController {
    async fn configure(&mut self, shape: ClusterShape) -> Result<(), ControlError> {
        if shape.is_empty() {
            return Err(ControlError::InvalidShape(shape));
        }

        let in_use = self.agent_count();
        if in_use.saturating_add(shape.total_servers()) > self.config.max_agents {
            return Err(ControlError::Environment(format!(
                "insufficient capacity for {shape}: {in_use} of {} simulated servers already running",
                self.config.max_agents
            )));
        }

        tracing::info!("Configuring simulated fleets: {}", shape);

        let mut created = Vec::with_capacity(shape.cluster_count);
        for _ in 0..shape.cluster_count {
            let index = self.next_index;
            self.next_index += 1;

            match SimulatedFleet::create(index, shape.server_count, &self.config) {
                Ok(mut fleet) => {
                    fleet.start();
                    let fsid = fleet.fsid();
                    tracing::info!("Simulated cluster {} is {}", fleet.domain(), fsid);
                    created.push(fsid);
                    self.fleets.insert(fsid, fleet);
                }
                Err(e) => {
                    tracing::error!("Failed to create simulated cluster {}: {}", index, e);
                    self.discard(created).await;
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), ControlError> {
        tracing::info!("EmbeddedFleetController.shutdown ({} clusters)", self.fleets.len());

        let mut fleets = std::mem::take(&mut self.fleets);

        // Every agent must be joined before any directory goes away.
        let halted = join_all(fleets.values_mut().map(|fleet| fleet.halt_all())).await;
        let mut first_error = halted.into_iter().find_map(Result::err);

        self.drain().await;

        for (fsid, fleet) in fleets {
            if let Err(e) = fleet.close().await {
                tracing::warn!("Failed to clean up cluster {}: {}", fsid, e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    async fn mark_osd_in(
        &mut self,
        fsid: ClusterId,
        osd_id: u32,
        osd_in: bool,
    ) -> Result<(), ControlError> {
        self.fleet(fsid)?.cluster().set_osd_state(osd_id, osd_in).await
    }

    fn cluster_ids(&self) -> Vec<ClusterId> {
        self.fleets.keys().copied().collect()
    }

    fn get_server_fqdns(&self) -> Vec<AgentAddress> {
        self.fleets
            .values()
            .flat_map(SimulatedFleet::agent_fqdns)
            .collect()
    }

    fn get_fqdns(&self, fsid: ClusterId) -> Result<Vec<AgentAddress>, ControlError> {
        Ok(self.fleet(fsid)?.agent_fqdns())
    }

    async fn get_service_fqdns(
        &self,
        fsid: ClusterId,
        service_type: &str,
    ) -> Result<Vec<AgentAddress>, ControlError> {
        self.fleet(fsid)?.cluster().service_fqdns(service_type).await
    }

    async fn go_dark(
        &mut self,
        fsid: ClusterId,
        dark: bool,
        minion_id: Option<&AgentAddress>,
    ) -> Result<(), ControlError> {
        let fleet = self.fleet_mut(fsid)?;
        match (minion_id, dark) {
            (Some(fqdn), true) => fleet.halt_agent(fqdn).await?,
            (Some(fqdn), false) => fleet.resume_agent(fqdn)?,
            (None, true) => fleet.halt_all().await?,
            (None, false) => fleet.resume_all(),
        }

        self.drain().await;
        Ok(())
    }
}
