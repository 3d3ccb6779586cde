//! Platform screen-share providers
//!
//! One provider per platform, selected once at startup. The lifecycle
//! only talks to the `ScreenShareProvider` trait.

mod macos;
mod windows;
mod x11;

pub use macos::MacosProvider;
pub use windows::WindowsProvider;
pub use x11::X11Provider;

use std::sync::Arc;

use async_trait::async_trait;

use sl_core::config::AgentConfig;
use sl_core::error::ShareError;
use sl_core::traits::ScreenShareProvider;

/// Pick the provider for the running platform
pub fn select_provider() -> Result<Arc<dyn ScreenShareProvider>, ShareError> {
    if cfg!(target_os = "linux") {
        Ok(Arc::new(X11Provider))
    } else if cfg!(target_os = "windows") {
        Ok(Arc::new(WindowsProvider))
    } else if cfg!(target_os = "macos") {
        Ok(Arc::new(MacosProvider))
    } else {
        Err(ShareError::UnsupportedPlatform(
            std::env::consts::OS.to_string(),
        ))
    }
}

/// No-op provider used when screen-share auto-start is disabled
pub struct DisabledProvider;

#[async_trait]
impl ScreenShareProvider for DisabledProvider {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn start(&self, _config: &AgentConfig) -> Result<(), ShareError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), ShareError> {
        Ok(())
    }
}
