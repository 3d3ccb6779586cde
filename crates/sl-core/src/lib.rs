//! sl-core: Core abstractions and configuration for the screenlink agent
//!
//! This crate provides the configuration model, error taxonomy, domain
//! types, coordinator API payloads, and capability traits shared by the
//! agent daemon.

pub mod api;
pub mod config;
pub mod error;
pub mod pidfile;
pub mod traits;
pub mod types;

pub use error::AgentError;
pub use types::{ConnectionId, ConnectionRecord, RegistrationStatus, TunnelState};
