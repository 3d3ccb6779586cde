//! Screen-share provider trait

use async_trait::async_trait;

use crate::config::AgentConfig;
use crate::error::ShareError;

/// Starts and stops the platform screen-share server
///
/// One implementation per platform, selected once at startup. The agent
/// core never branches on the OS itself.
#[async_trait]
pub trait ScreenShareProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &'static str;

    /// Start the screen-share server on the configured port
    async fn start(&self, config: &AgentConfig) -> Result<(), ShareError>;

    /// Stop the screen-share server
    async fn stop(&self) -> Result<(), ShareError>;
}
