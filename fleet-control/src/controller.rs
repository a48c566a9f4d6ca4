//! The control contract every backend implements.

use async_trait::async_trait;

use fleet_types::{AgentAddress, ClusterId, ClusterShape};

use crate::config::{Backend, Config};
use crate::embedded::EmbeddedFleetController;
use crate::error::ControlError;
use crate::external::ExternalFleetController;

/// Controls the cluster(s) a test runs against.
///
/// `configure` either hands back a clean environment or fails with an error
/// whose [`kind`](ControlError::kind) tells the test to skip or to fail.
/// There is no partial success. Per-cluster calls are only valid for an
/// fsid returned by [`cluster_ids`](FleetController::cluster_ids) between
/// `configure` and `shutdown`; anything else is
/// [`ControlError::UnknownCluster`].
#[async_trait]
pub trait FleetController: Send + Sync {
    /// Provide `shape` in a clean state, or fail.
    async fn configure(&mut self, shape: ClusterShape) -> Result<(), ControlError>;

    /// Release everything created for the test. A borrowed cluster is only
    /// disconnected from, never destroyed.
    async fn shutdown(&mut self) -> Result<(), ControlError>;

    /// Mark an OSD in (or out). Calling it twice has the effect of calling
    /// it once.
    async fn mark_osd_in(
        &mut self,
        fsid: ClusterId,
        osd_id: u32,
        osd_in: bool,
    ) -> Result<(), ControlError>;

    /// Clusters currently owned.
    fn cluster_ids(&self) -> Vec<ClusterId>;

    /// Every fleet member across all owned clusters.
    fn get_server_fqdns(&self) -> Vec<AgentAddress>;

    /// Fleet members of one cluster.
    fn get_fqdns(&self, fsid: ClusterId) -> Result<Vec<AgentAddress>, ControlError>;

    /// Fleet members of one cluster hosting `service_type` (`mon`, `osd`, ...).
    async fn get_service_fqdns(
        &self,
        fsid: ClusterId,
        service_type: &str,
    ) -> Result<Vec<AgentAddress>, ControlError>;

    /// Cut (`dark == true`) or restore network reachability of one member,
    /// or of the whole cluster when `minion_id` is `None`.
    ///
    /// Backends that cannot affect reachability treat this as a no-op.
    async fn go_dark(
        &mut self,
        fsid: ClusterId,
        dark: bool,
        minion_id: Option<&AgentAddress>,
    ) -> Result<(), ControlError>;
}

/// Build the controller selected by `config.backend`.
pub fn build_controller(config: &Config) -> Result<Box<dyn FleetController>, ControlError> {
    match config.backend {
        Backend::Embedded => {
            tracing::debug!("Using embedded fleet controller");
            Ok(Box::new(EmbeddedFleetController::from_config(config)))
        }
        Backend::External => {
            tracing::debug!("Using external fleet controller");
            Ok(Box::new(ExternalFleetController::from_config(config)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config(backend: Backend) -> Config {
        let mut config = Config {
            backend,
            ..Config::default()
        };
        config.timing.drain_window_ms = 10;
        config.embedded.heartbeat_interval_ms = 5;
        config
    }

    #[tokio::test]
    async fn embedded_backend_through_trait_object() {
        let mut controller = build_controller(&fast_config(Backend::Embedded)).unwrap();
        controller.configure(ClusterShape::new(2)).await.unwrap();

        let fsids = controller.cluster_ids();
        assert_eq!(fsids.len(), 1);
        assert_eq!(controller.get_fqdns(fsids[0]).unwrap().len(), 2);

        controller.shutdown().await.unwrap();
        assert!(controller.cluster_ids().is_empty());
    }

    #[tokio::test]
    async fn external_backend_rejects_other_shapes() {
        let mut controller = build_controller(&fast_config(Backend::External)).unwrap();
        let err = controller
            .configure(ClusterShape::new(4))
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::UnsupportedConfiguration { .. }));
        assert!(controller.cluster_ids().is_empty());
    }

    #[test]
    fn external_backend_rejects_bad_target_map() {
        let mut config = fast_config(Backend::External);
        config.external.targets.clear();
        assert!(matches!(
            build_controller(&config),
            Err(ControlError::Targets(_))
        ));
    }
}
