//! External backend: a fixed, already-running deployment.
//!
//! Nothing is provisioned. `configure` only accepts the shape the
//! deployment has and then polls the admin host until the cluster reports
//! itself clean. Commands run through a [`RemoteExecutor`] (normally
//! [`SshExecutor`]).

use async_trait::async_trait;
use std::sync::Arc;

use fleet_types::{AgentAddress, ClusterId, ClusterShape};

use crate::config::{Config, ExternalConfig};
use crate::controller::FleetController;
use crate::error::ControlError;
use crate::poller::Poller;
use crate::remote::{RemoteExecutor, SshExecutor};
use crate::status::{check_default_pools_only, check_osds_up_and_in, check_pgs_active_and_clean, Verdict};
use crate::targets::RemoteTargetMap;

/// Installs a salt minion and points it at `{master}`.
const BOOTSTRAP_COMMAND: &str = "wget -O - https://raw.github.com/saltstack/salt-bootstrap/develop/bootstrap-salt.sh | sudo sh ; \
sudo sed -i 's/^[#]*master:.*$/master: {master}/' /etc/salt/minion && sudo service salt-minion restart";

/// Controller for a borrowed real cluster.
pub struct ExternalFleetController {
    config: ExternalConfig,
    targets: RemoteTargetMap,
    executor: Arc<dyn RemoteExecutor>,
    poller: Poller,
    connected: bool,
}

impl std::fmt::Debug for ExternalFleetController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalFleetController")
            .field("fsid", &self.config.fsid)
            .field("targets", &self.targets)
            .field("poller", &self.poller)
            .field("connected", &self.connected)
            .finish()
    }
}

impl ExternalFleetController {
    /// Create a controller for the deployment described by `config`.
    ///
    /// # Errors
    ///
    /// Fails if the target map is malformed or does not list exactly the
    /// configured number of servers.
    pub fn new(
        config: ExternalConfig,
        poller: Poller,
        executor: Arc<dyn RemoteExecutor>,
    ) -> Result<Self, ControlError> {
        let targets = config.target_map()?;
        let expected = config.shape().total_servers();
        if targets.len() != expected {
            return Err(ControlError::Environment(format!(
                "target map lists {} hosts but the deployment is configured with {}",
                targets.len(),
                config.shape()
            )));
        }

        Ok(Self {
            config,
            targets,
            executor,
            poller,
            connected: false,
        })
    }

    /// Create an `ssh`-backed controller from the `[external]` and `[timing]`
    /// sections.
    pub fn from_config(config: &Config) -> Result<Self, ControlError> {
        let executor = SshExecutor::new(config.external.connect_timeout_secs);
        Self::new(
            config.external.clone(),
            config.timing.poller(),
            Arc::new(executor),
        )
    }

    /// The deployment's fsid.
    pub fn fsid(&self) -> ClusterId {
        self.config.fsid
    }

    /// Host to role map.
    pub fn targets(&self) -> &RemoteTargetMap {
        &self.targets
    }

    /// Whether `configure` has succeeded since the last `shutdown`.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Install the management agent on every target and point it at
    /// `master`.
    pub async fn bootstrap_agents(&self, master: &AgentAddress) -> Result<(), ControlError> {
        let command = BOOTSTRAP_COMMAND.replace("{master}", master.as_str());
        for target in self.targets.targets() {
            tracing::info!("Bootstrapping agent on {} (master {})", target.host(), master);
            self.executor.run(&target.ssh_target(), &command).await?;
        }
        Ok(())
    }

    fn ensure_owned(&self, fsid: ClusterId) -> Result<(), ControlError> {
        if self.connected && fsid == self.config.fsid {
            Ok(())
        } else {
            Err(ControlError::UnknownCluster(fsid))
        }
    }

    /// Run a cluster tool subcommand on the admin target.
    async fn admin_command(&self, args: &str) -> Result<String, ControlError> {
        let command = format!("{} {}", self.config.ceph_command, args);
        let output = self
            .executor
            .run(&self.targets.admin().ssh_target(), &command)
            .await?;
        Ok(output)
    }

    /// Re-run `args` until `check` says the output has converged.
    async fn wait_for(&self, args: &str, check: fn(&str) -> Verdict) -> Result<(), ControlError> {
        let what = format!("`{} {}`", self.config.ceph_command, args);
        let attempts = self
            .poller
            .wait_until(
                &what,
                move || self.admin_command(args),
                |output: &String| check(output).is_converged(),
            )
            .await?;
        tracing::debug!("{} converged after {} attempt(s)", what, attempts);
        Ok(())
    }
}

#[async_trait]
impl FleetController for ExternalFleetController {
    async fn configure(&mut self, shape: ClusterShape) -> Result<(), ControlError> {
        let supported = self.config.shape();
        if shape != supported {
            return Err(ControlError::UnsupportedConfiguration {
                requested: shape,
                supported,
            });
        }

        tracing::info!(
            "Checking external cluster {} via {}",
            self.config.fsid,
            self.targets.admin().ssh_target()
        );

        self.wait_for("osd stat", check_osds_up_and_in).await?;
        self.wait_for("osd lspools", check_default_pools_only).await?;
        self.wait_for("pg stat", check_pgs_active_and_clean).await?;

        self.connected = true;
        tracing::info!("External cluster {} is clean", self.config.fsid);
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), ControlError> {
        tracing::info!("Disconnecting from external cluster {}", self.config.fsid);
        self.connected = false;
        Ok(())
    }

    async fn mark_osd_in(
        &mut self,
        fsid: ClusterId,
        osd_id: u32,
        osd_in: bool,
    ) -> Result<(), ControlError> {
        self.ensure_owned(fsid)?;
        let verb = if osd_in { "in" } else { "out" };
        self.admin_command(&format!("osd {verb} {osd_id}")).await?;
        Ok(())
    }

    fn cluster_ids(&self) -> Vec<ClusterId> {
        if self.connected {
            vec![self.config.fsid]
        } else {
            Vec::new()
        }
    }

    fn get_server_fqdns(&self) -> Vec<AgentAddress> {
        if self.connected {
            self.targets.hosts()
        } else {
            Vec::new()
        }
    }

    fn get_fqdns(&self, fsid: ClusterId) -> Result<Vec<AgentAddress>, ControlError> {
        self.ensure_owned(fsid)?;
        Ok(self.targets.hosts())
    }

    async fn get_service_fqdns(
        &self,
        fsid: ClusterId,
        service_type: &str,
    ) -> Result<Vec<AgentAddress>, ControlError> {
        self.ensure_owned(fsid)?;
        // Every host in the deployment runs every service.
        tracing::debug!("get_service_fqdns({}, {}): all targets", fsid, service_type);
        Ok(self.targets.hosts())
    }

    async fn go_dark(
        &mut self,
        fsid: ClusterId,
        dark: bool,
        minion_id: Option<&AgentAddress>,
    ) -> Result<(), ControlError> {
        tracing::debug!(
            "go_dark({}, {}, {:?}) ignored on external cluster",
            fsid,
            dark,
            minion_id.map(AgentAddress::as_str)
        );
        Ok(())
    }
}
