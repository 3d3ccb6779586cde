//! Built-in Screen Sharing provider for macOS

use async_trait::async_trait;
use tokio::process::Command;

use sl_core::config::AgentConfig;
use sl_core::error::ShareError;
use sl_core::traits::ScreenShareProvider;

const SCREEN_SHARING_PLIST: &str = "/System/Library/LaunchDaemons/com.apple.screensharing.plist";

/// Toggles the system Screen Sharing daemon via launchctl
///
/// Requires the agent to run with sufficient privileges to load system
/// launch daemons.
pub struct MacosProvider;

#[async_trait]
impl ScreenShareProvider for MacosProvider {
    fn name(&self) -> &'static str {
        "macos-screen-sharing"
    }

    async fn start(&self, _config: &AgentConfig) -> Result<(), ShareError> {
        let status = Command::new("launchctl")
            .args(["load", "-w", SCREEN_SHARING_PLIST])
            .status()
            .await
            .map_err(|e| ShareError::StartFailed(format!("launchctl: {}", e)))?;

        if status.success() {
            Ok(())
        } else {
            Err(ShareError::StartFailed(format!(
                "launchctl load exited with {} (insufficient privileges?)",
                status
            )))
        }
    }

    async fn stop(&self) -> Result<(), ShareError> {
        let status = Command::new("launchctl")
            .args(["unload", SCREEN_SHARING_PLIST])
            .status()
            .await
            .map_err(|e| ShareError::StopFailed(format!("launchctl: {}", e)))?;

        if status.success() {
            Ok(())
        } else {
            Err(ShareError::StopFailed(format!(
                "launchctl unload exited with {}",
                status
            )))
        }
    }
}
