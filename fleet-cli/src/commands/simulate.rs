//! Keep simulated fleets running until told to stop.

use anyhow::{Context, Result};
use std::future::Future;

use fleet_control::{ClusterShape, Config, EmbeddedFleetController, FleetController};

/// Start embedded fleets for `shape` and hold them until `stop` resolves.
///
/// Always uses the embedded backend, whatever `config.backend` says.
pub async fn run(config: &Config, shape: ClusterShape, stop: impl Future<Output = ()>) -> Result<()> {
    let mut controller = EmbeddedFleetController::from_config(config);
    controller
        .configure(shape)
        .await
        .with_context(|| format!("Failed to start simulated fleets for {shape}"))?;

    for fsid in controller.cluster_ids() {
        let dir = controller.working_dir(fsid)?;
        println!("Cluster {fsid} ({})", dir.display());
        for fqdn in controller.get_fqdns(fsid)? {
            println!("  {fqdn}");
        }
    }
    println!("Running; press Ctrl-C to stop");

    stop.await;

    tracing::info!("Stopping simulated fleets");
    controller
        .shutdown()
        .await
        .context("Failed to shut down simulated fleets")?;
    Ok(())
}
