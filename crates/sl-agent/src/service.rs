//! OS service management
//!
//! Installs and controls the agent as a systemd unit on Linux. Other
//! platforms report the flags as unsupported.

use std::path::Path;

use anyhow::{bail, Context, Result};
use tokio::process::Command;

const SERVICE_NAME: &str = "screenlink-agent";
const UNIT_PATH: &str = "/etc/systemd/system/screenlink-agent.service";

/// Install and enable the systemd unit
pub async fn install(config_path: &Path) -> Result<()> {
    ensure_supported()?;

    let exe = std::env::current_exe().context("Failed to resolve the agent binary path")?;
    let unit = render_unit(&exe.display().to_string(), &config_path.display().to_string());

    tokio::fs::write(UNIT_PATH, unit)
        .await
        .with_context(|| format!("Failed to write {} (are you root?)", UNIT_PATH))?;

    systemctl(&["daemon-reload"]).await?;
    systemctl(&["enable", SERVICE_NAME]).await?;
    println!("Service installed; start it with --start-service");
    Ok(())
}

/// Disable and remove the systemd unit
pub async fn remove() -> Result<()> {
    ensure_supported()?;

    let _ = systemctl(&["disable", SERVICE_NAME]).await;
    match tokio::fs::remove_file(UNIT_PATH).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e).with_context(|| format!("Failed to remove {}", UNIT_PATH)),
    }
    systemctl(&["daemon-reload"]).await?;
    println!("Service removed");
    Ok(())
}

/// Start the installed service
pub async fn start() -> Result<()> {
    ensure_supported()?;
    systemctl(&["start", SERVICE_NAME]).await
}

/// Stop the installed service
pub async fn stop() -> Result<()> {
    ensure_supported()?;
    systemctl(&["stop", SERVICE_NAME]).await
}

fn ensure_supported() -> Result<()> {
    if cfg!(target_os = "linux") {
        Ok(())
    } else {
        bail!("Service management is only supported on Linux (systemd)");
    }
}

fn render_unit(exe: &str, config_path: &str) -> String {
    format!(
        "[Unit]\n\
         Description=Screenlink agent\n\
         After=network-online.target\n\
         Wants=network-online.target\n\
         \n\
         [Service]\n\
         ExecStart={} --config {}\n\
         Restart=on-failure\n\
         RestartSec=5\n\
         \n\
         [Install]\n\
         WantedBy=multi-user.target\n",
        exe, config_path
    )
}

async fn systemctl(args: &[&str]) -> Result<()> {
    let status = Command::new("systemctl")
        .args(args)
        .status()
        .await
        .context("Failed to run systemctl")?;

    if status.success() {
        Ok(())
    } else {
        bail!("systemctl {} exited with {}", args.join(" "), status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_references_binary_and_config() {
        let unit = render_unit("/usr/local/bin/sl-agent", "/etc/screenlink/agent.json");
        assert!(unit.contains("ExecStart=/usr/local/bin/sl-agent --config /etc/screenlink/agent.json"));
        assert!(unit.contains("Restart=on-failure"));
    }
}
