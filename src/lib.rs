//! podium - Conference Cluster Service Discovery
//!
//! Tracks which backend media and processing workers are alive by watching
//! presence in shared coordination groups, and selects the best instance for
//! each new unit of work.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Discovery configuration and validation
//! - [`presence`] - Membership events and the presence-source seam
//! - [`registry`] - Per-subsystem instance tables built from presence
//! - [`filter`] - Capability filtering over registry snapshots
//! - [`selector`] - Load- and health-aware bridge selection
//! - [`services`] - The facade the orchestrator talks to
//! - [`metrics`] - Prometheus instrumentation
//!
//! # Example
//!
//! ```no_run
//! use podium::config::DiscoveryConfig;
//! use podium::presence::LocalPresenceSource;
//! use podium::services::ConferenceServices;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DiscoveryConfig::from_file("config.toml")?;
//!     let services_presence = Arc::new(LocalPresenceSource::new());
//!     let bridge_presence = Arc::new(LocalPresenceSource::new());
//!
//!     let services = ConferenceServices::new(config, services_presence, bridge_presence)?;
//!     services.start().await?;
//!
//!     let bridge = services.select_bridge().await?;
//!     println!("next conference goes to {}", bridge.id);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod metrics;
pub mod presence;
pub mod registry;
pub mod selector;
pub mod services;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{DiscoveryConfig, GroupConfig};
    pub use crate::error::{Error, Result};
    pub use crate::presence::{InstanceState, PresenceEvent, PresenceSource};
    pub use crate::registry::{InstanceRegistry, ServiceInstance, ServiceKind, Subsystem};
    pub use crate::selector::{BridgeSelector, SelectionError};
    pub use crate::services::{ConferenceServices, DiscoveryStats, LookupError};
}

// Direct re-exports for convenience
pub use registry::{ServiceInstance, ServiceKind, Subsystem};
pub use services::ConferenceServices;
