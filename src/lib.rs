// pod-route: keeps a host route to the pod network of a VM-hosted cluster

pub mod config;
pub mod context;
pub mod discovery;
pub mod error;
pub mod exec;
pub mod orchestrator;
pub mod platform;
pub mod routes;
pub mod vm;

#[cfg(test)]
pub(crate) mod testing;

pub use context::{CancelHandle, Context};
pub use error::{RoutingError, RoutingResult};
pub use orchestrator::{PodRouting, RoutingStatus};
