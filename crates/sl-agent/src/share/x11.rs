//! x11vnc provider for Linux

use async_trait::async_trait;
use tokio::process::Command;

use sl_core::config::AgentConfig;
use sl_core::error::ShareError;
use sl_core::traits::ScreenShareProvider;

/// Runs x11vnc against the configured display
pub struct X11Provider;

#[async_trait]
impl ScreenShareProvider for X11Provider {
    fn name(&self) -> &'static str {
        "x11vnc"
    }

    async fn start(&self, config: &AgentConfig) -> Result<(), ShareError> {
        let which = Command::new("which")
            .arg("x11vnc")
            .output()
            .await
            .map_err(|e| ShareError::StartFailed(format!("which x11vnc: {}", e)))?;
        if !which.status.success() {
            return Err(ShareError::ServerNotFound(
                "x11vnc not found; install it with your package manager".to_string(),
            ));
        }

        // Stop any previous instance before binding the port
        let _ = Command::new("pkill")
            .args(["-f", "x11vnc"])
            .output()
            .await;

        let password_file = if config.vnc_password.is_empty() {
            None
        } else {
            Some(write_password_file(&config.vnc_password)?)
        };

        let args = build_args(config, password_file.as_deref());
        tracing::debug!("Starting x11vnc: {}", args.join(" "));

        let status = Command::new("x11vnc")
            .args(&args)
            .status()
            .await
            .map_err(|e| ShareError::StartFailed(format!("spawn x11vnc: {}", e)))?;

        if status.success() {
            Ok(())
        } else {
            Err(ShareError::StartFailed(format!(
                "x11vnc exited with {}",
                status
            )))
        }
    }

    async fn stop(&self) -> Result<(), ShareError> {
        let _ = Command::new("pkill")
            .args(["-f", "x11vnc"])
            .output()
            .await;
        Ok(())
    }
}

/// Assemble the x11vnc argument list
///
/// `-bg` forks the server into the background once it is listening, so a
/// successful exit status means the port is bound.
fn build_args(config: &AgentConfig, password_file: Option<&str>) -> Vec<String> {
    let mut args = vec![
        "-display".to_string(),
        config.display.clone(),
        "-rfbport".to_string(),
        config.vnc_port.to_string(),
        "-shared".to_string(),
        "-forever".to_string(),
        "-noxdamage".to_string(),
        "-noxfixes".to_string(),
        "-noxrandr".to_string(),
        "-bg".to_string(),
    ];

    match password_file {
        Some(path) => {
            args.push("-passwdfile".to_string());
            args.push(path.to_string());
        }
        None => args.push("-nopw".to_string()),
    }

    args
}

/// Write the share password to a private temp file
fn write_password_file(password: &str) -> Result<String, ShareError> {
    let path = std::env::temp_dir().join("screenlink_vnc_passwd");
    std::fs::write(&path, password)
        .map_err(|e| ShareError::StartFailed(format!("write password file: {}", e)))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
            .map_err(|e| ShareError::StartFailed(format!("chmod password file: {}", e)))?;
    }

    Ok(path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_without_password() {
        let mut config = AgentConfig::default();
        config.vnc_port = 5901;
        config.display = ":1".to_string();

        let args = build_args(&config, None);
        assert!(args.contains(&"-nopw".to_string()));
        assert!(args.windows(2).any(|w| w == ["-rfbport", "5901"]));
        assert!(args.windows(2).any(|w| w == ["-display", ":1"]));
    }

    #[test]
    fn test_args_with_password_file() {
        let config = AgentConfig::default();
        let args = build_args(&config, Some("/tmp/pw"));
        assert!(args.windows(2).any(|w| w == ["-passwdfile", "/tmp/pw"]));
        assert!(!args.contains(&"-nopw".to_string()));
    }
}
