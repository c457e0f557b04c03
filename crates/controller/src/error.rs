use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A MODIFIED event named a unit the model does not hold.
    #[error("received update for unknown unit '{unit}' in group '{group}'")]
    UnknownUnit { group: String, unit: String },
    #[error("failed to fetch instances of '{group}/{unit}': {source}")]
    Fetch {
        group: String,
        unit: String,
        source: anyhow::Error,
    },
    #[error("failed to watch group '{group}': {source}")]
    Watch { group: String, source: anyhow::Error },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read workload config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed workload config: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("workload config declares no groups")]
    Empty,
    #[error("workload config declares {count} groups; the selector strip holds {max}")]
    TooManyGroups { count: usize, max: usize },
    #[error("group '{0}' is declared more than once")]
    DuplicateGroup(String),
    #[error("STATIC group '{0}' does not list its deployments")]
    MissingDeployments(String),
    #[error("deployment '{unit}' is listed more than once in group '{group}'")]
    DuplicateUnit { group: String, unit: String },
}
