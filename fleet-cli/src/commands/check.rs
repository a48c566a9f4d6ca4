//! Configure a backend, report what it provides, then release it.

use anyhow::{Context, Result};

use fleet_control::{build_controller, ClusterShape, Config, ControlError, FleetController, Role};

/// Run the check command against the configured backend.
pub async fn run(config: &Config, shape: ClusterShape) -> Result<()> {
    let mut controller = build_controller(config).context("Failed to build controller")?;
    check(controller.as_mut(), shape).await
}

/// Configure `controller` for `shape`, print its clusters, then shut down.
///
/// A skip is reported on stdout and is not an error.
pub async fn check(controller: &mut dyn FleetController, shape: ClusterShape) -> Result<()> {
    match controller.configure(shape).await {
        Ok(()) => {}
        Err(ControlError::Skip { reason }) => {
            println!("SKIP: {reason}");
            return Ok(());
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to configure {shape}")),
    }

    let reported = report(controller).await;
    controller
        .shutdown()
        .await
        .context("Failed to shut down cleanly")?;
    reported
}

async fn report(controller: &dyn FleetController) -> Result<()> {
    for fsid in controller.cluster_ids() {
        println!("Cluster {fsid}:");
        let mons = controller.get_service_fqdns(fsid, Role::MON).await?;
        for fqdn in controller.get_fqdns(fsid)? {
            let marker = if mons.contains(&fqdn) { " (mon)" } else { "" };
            println!("  {fqdn}{marker}");
        }
    }
    println!("OK: {} server(s) ready", controller.get_server_fqdns().len());
    Ok(())
}
