//! The bridge orchestrator.
//!
//! Composes daemons, terminal backends, and storage adapters into the
//! controller-facing surface: delegate a request to a named AI, poll its
//! status, fetch the response, check health.

pub mod errors;
pub mod orchestrator;
pub mod registry;
pub mod types;

pub use errors::BridgeError;
pub use orchestrator::{Bridge, BridgeConfig};
pub use registry::{DaemonFactory, FactoryRegistry};
pub use types::{AiStatus, BridgeResponse, Health, HealthStatus, RequestStatus, SystemStatus};
