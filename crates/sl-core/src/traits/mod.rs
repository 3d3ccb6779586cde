//! Capability traits
//!
//! Seams between the agent core and its external collaborators: the system
//! probe, the platform screen-share server, and the secure tunnel
//! transport. Each has one production implementation in sl-agent and
//! scripted implementations in tests.

mod probe;
mod share;
mod tunnel;

pub use probe::SystemProbe;
pub use share::ScreenShareProvider;
pub use tunnel::{SecureTunnel, TunnelAuth, TunnelDialer, TunnelEndpoint};
