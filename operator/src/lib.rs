pub use common::{Alm, Error, Result};

/// Cluster access seam
pub mod store;
pub use store::{ClusterStore, KubeStore, Managed};

/// Kubernetes events published on transitions
pub mod events;

/// Create-if-absent of owned resources
pub mod ensure;
/// Builders of the owned resources
pub mod resources;

pub mod bootstrap;
pub mod rollout;

/// The ALM state machine
pub mod reconciler;

/// State machinery for kube, as exposeable to actix
pub mod manager;
pub use manager::Manager;

/// Log and trace integrations
pub mod telemetry;

/// Metrics
mod metrics;
pub use metrics::Metrics;

#[cfg(test)] pub mod k8smock;
