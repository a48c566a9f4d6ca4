//! Install the management agent on the external deployment.

use anyhow::{Context, Result};

use fleet_control::{AgentAddress, Config, ExternalFleetController};

/// Run the agent bootstrap on every target in `[external.targets]`.
pub async fn run(config: &Config, master: &AgentAddress) -> Result<()> {
    let controller =
        ExternalFleetController::from_config(config).context("Invalid external configuration")?;

    println!(
        "Bootstrapping {} target(s) against master {}",
        controller.targets().len(),
        master
    );
    controller
        .bootstrap_agents(master)
        .await
        .context("Agent bootstrap failed")?;
    println!("Done");
    Ok(())
}
