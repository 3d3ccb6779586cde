//! TightVNC/UltraVNC provider for Windows

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;

use sl_core::config::AgentConfig;
use sl_core::error::ShareError;
use sl_core::traits::ScreenShareProvider;

/// Known server install paths, checked in order
const SERVER_PATHS: &[&str] = &[
    r"C:\Program Files\TightVNC\tvnserver.exe",
    r"C:\Program Files (x86)\TightVNC\tvnserver.exe",
    r"C:\Program Files\UltraVNC\winvnc.exe",
    r"C:\Program Files (x86)\UltraVNC\winvnc.exe",
];

/// Launches an installed TightVNC or UltraVNC server
pub struct WindowsProvider;

#[async_trait]
impl ScreenShareProvider for WindowsProvider {
    fn name(&self) -> &'static str {
        "windows-vnc"
    }

    async fn start(&self, _config: &AgentConfig) -> Result<(), ShareError> {
        let server = locate_server().ok_or_else(|| {
            ShareError::ServerNotFound("no VNC server found; install TightVNC or UltraVNC".to_string())
        })?;

        tracing::debug!("Starting VNC server at {:?}", server);
        Command::new(&server)
            .arg("-run")
            .spawn()
            .map_err(|e| ShareError::StartFailed(format!("spawn {:?}: {}", server, e)))?;

        Ok(())
    }

    async fn stop(&self) -> Result<(), ShareError> {
        for image in ["tvnserver.exe", "winvnc.exe"] {
            let _ = Command::new("taskkill")
                .args(["/IM", image, "/F"])
                .output()
                .await;
        }
        Ok(())
    }
}

fn locate_server() -> Option<PathBuf> {
    SERVER_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}
