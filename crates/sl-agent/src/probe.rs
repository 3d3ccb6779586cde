//! Host system probe
//!
//! Detects monitor count and locates the platform screen-share server
//! binary. Detection failures are recoverable; callers keep their
//! configured values.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;

use sl_core::error::ProbeError;
use sl_core::traits::SystemProbe;
use sl_core::types::MachineFacts;

/// Known Windows screen-share server install paths
const WINDOWS_SERVER_PATHS: &[&str] = &[
    r"C:\Program Files\TightVNC\tvnserver.exe",
    r"C:\Program Files (x86)\TightVNC\tvnserver.exe",
    r"C:\Program Files\UltraVNC\winvnc.exe",
    r"C:\Program Files (x86)\UltraVNC\winvnc.exe",
];

/// macOS built-in screen sharing daemon
const MACOS_SCREEN_SHARING_PLIST: &str =
    "/System/Library/LaunchDaemons/com.apple.screensharing.plist";

/// Probes the machine the agent runs on
pub struct HostProbe;

#[async_trait]
impl SystemProbe for HostProbe {
    async fn detect(&self) -> Result<MachineFacts, ProbeError> {
        let monitors = match detect_monitors().await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!("Monitor detection failed: {}", e);
                0
            }
        };

        let share_server = locate_share_server().await;
        if let Some(path) = &share_server {
            tracing::debug!("Screen-share server found at {:?}", path);
        }

        Ok(MachineFacts {
            monitors,
            share_server,
        })
    }
}

/// Count attached monitors, 0 when unknown
async fn detect_monitors() -> Result<u32, ProbeError> {
    if cfg!(target_os = "linux") {
        let output = run_probe_command("xrandr", &["--listmonitors"]).await?;
        Ok(parse_xrandr_monitors(&output))
    } else if cfg!(target_os = "windows") {
        let output = run_probe_command("wmic", &["desktopmonitor", "get", "name"]).await?;
        Ok(parse_wmic_monitors(&output))
    } else if cfg!(target_os = "macos") {
        let output = run_probe_command("system_profiler", &["SPDisplaysDataType"]).await?;
        Ok(parse_profiler_monitors(&output))
    } else {
        Err(ProbeError::UnsupportedPlatform(
            std::env::consts::OS.to_string(),
        ))
    }
}

async fn run_probe_command(program: &str, args: &[&str]) -> Result<String, ProbeError> {
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| ProbeError::CommandFailed(format!("{}: {}", program, e)))?;

    if !output.status.success() {
        return Err(ProbeError::CommandFailed(format!(
            "{} exited with {}",
            program, output.status
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parse `xrandr --listmonitors` output
///
/// The header carries the count ("Monitors: 2"); entry lines are counted
/// as a fallback.
fn parse_xrandr_monitors(output: &str) -> u32 {
    for line in output.lines() {
        if let Some(rest) = line.trim().strip_prefix("Monitors:") {
            if let Ok(count) = rest.trim().parse() {
                return count;
            }
        }
    }

    output
        .lines()
        .filter(|line| {
            line.trim_start()
                .chars()
                .next()
                .map(|c| c.is_ascii_digit())
                .unwrap_or(false)
        })
        .count() as u32
}

/// Parse `wmic desktopmonitor get name` output
fn parse_wmic_monitors(output: &str) -> u32 {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.eq_ignore_ascii_case("Name"))
        .count() as u32
}

/// Parse `system_profiler SPDisplaysDataType` output
fn parse_profiler_monitors(output: &str) -> u32 {
    output.matches("Display Type:").count() as u32
}

/// Locate the screen-share server for this platform
async fn locate_share_server() -> Option<PathBuf> {
    if cfg!(target_os = "linux") {
        let output = Command::new("which").arg("x11vnc").output().await.ok()?;
        if !output.status.success() {
            return None;
        }
        let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if path.is_empty() {
            None
        } else {
            Some(PathBuf::from(path))
        }
    } else if cfg!(target_os = "windows") {
        WINDOWS_SERVER_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    } else if cfg!(target_os = "macos") {
        let plist = PathBuf::from(MACOS_SCREEN_SHARING_PLIST);
        plist.exists().then_some(plist)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_xrandr_header() {
        let output = "Monitors: 2\n 0: +*eDP-1 1920/344x1080/194+0+0  eDP-1\n 1: +HDMI-1 2560/597x1440/336+1920+0  HDMI-1\n";
        assert_eq!(parse_xrandr_monitors(output), 2);
    }

    #[test]
    fn test_parse_xrandr_entries_fallback() {
        let output = " 0: +*eDP-1 1920/344x1080/194+0+0  eDP-1\n";
        assert_eq!(parse_xrandr_monitors(output), 1);
    }

    #[test]
    fn test_parse_xrandr_empty() {
        assert_eq!(parse_xrandr_monitors(""), 0);
    }

    #[test]
    fn test_parse_wmic_skips_header_and_blanks() {
        let output = "Name\nGeneric PnP Monitor\nGeneric PnP Monitor\n\n";
        assert_eq!(parse_wmic_monitors(output), 2);
    }

    #[test]
    fn test_parse_profiler_counts_displays() {
        let output = "Graphics/Displays:\n  Display Type: Built-in\n  Display Type: External\n";
        assert_eq!(parse_profiler_monitors(output), 2);
    }
}
