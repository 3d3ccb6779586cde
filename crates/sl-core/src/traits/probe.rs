//! System probe trait

use async_trait::async_trait;

use crate::error::ProbeError;
use crate::types::MachineFacts;

/// Detects facts about the local machine
///
/// Probe failures are recoverable; callers keep their configured values
/// when detection fails.
#[async_trait]
pub trait SystemProbe: Send + Sync {
    /// Detect monitor count and screen-share server availability
    async fn detect(&self) -> Result<MachineFacts, ProbeError>;
}
