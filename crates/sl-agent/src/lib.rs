//! sl-agent: screenlink remote-machine agent
//!
//! The agent runs on remote machines and keeps a persistent logical link
//! to the coordinator: it registers identity and capabilities, optionally
//! opens an outbound reverse SSH tunnel to the local screen-share port,
//! and proves liveness with periodic heartbeats.

pub mod lifecycle;
pub mod probe;
pub mod registration;
pub mod service;
pub mod setup;
pub mod share;
pub mod tunnel;

pub use lifecycle::{AgentLifecycle, LifecyclePhase};
