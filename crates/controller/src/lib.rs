//! Reconciles a cluster workload inventory into an in-memory model, projects
//! the selected group onto a button grid and turns presses into scale
//! requests.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod model;
pub mod projection;
pub mod reconciler;
pub mod runtime;

pub use config::{load_workloads, parse_workloads};
pub use error::{ConfigError, ReconcileError};
pub use model::{DeployableUnit, Group, WorkloadModel};
pub use projection::GridProjection;
pub use reconciler::{GroupObserver, Reconciler};
pub use runtime::Controller;

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
