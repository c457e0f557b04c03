//! Workload configuration: a JSON array of monitored groups.
//!
//! ```json
//! [
//!   { "project": "shop", "mode": "DYNAMIC" },
//!   { "project": "infra", "mode": "STATIC", "deployments": ["db", "cache"] }
//! ]
//! ```

use std::{collections::HashSet, fs, path::Path};

use serde::Deserialize;
use shared::{domain::GroupMode, grid::GRID_SIZE};
use tracing::warn;

use crate::{
    error::ConfigError,
    model::{DeployableUnit, Group, WorkloadModel},
};

const DEFAULT_PROJECT: &str = "default";

#[derive(Debug, Deserialize)]
struct GroupConfig {
    #[serde(default = "default_project")]
    project: String,
    #[serde(default)]
    mode: GroupMode,
    #[serde(default)]
    deployments: Option<Vec<String>>,
    #[serde(default)]
    require_opt_in: bool,
}

fn default_project() -> String {
    DEFAULT_PROJECT.to_string()
}

pub fn load_workloads(path: &Path) -> Result<WorkloadModel, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_workloads(&raw)
}

pub fn parse_workloads(raw: &str) -> Result<WorkloadModel, ConfigError> {
    let entries: Vec<GroupConfig> = serde_json::from_str(raw)?;
    if entries.is_empty() {
        return Err(ConfigError::Empty);
    }
    if entries.len() > GRID_SIZE {
        return Err(ConfigError::TooManyGroups {
            count: entries.len(),
            max: GRID_SIZE,
        });
    }

    let mut seen_groups = HashSet::new();
    let mut groups = Vec::with_capacity(entries.len());
    for entry in entries {
        if !seen_groups.insert(entry.project.clone()) {
            return Err(ConfigError::DuplicateGroup(entry.project));
        }
        groups.push(build_group(entry)?);
    }
    Ok(WorkloadModel::new(groups))
}

fn build_group(entry: GroupConfig) -> Result<Group, ConfigError> {
    let group = Group::new(entry.project.clone(), entry.mode).with_opt_in(entry.require_opt_in);
    match entry.mode {
        GroupMode::Dynamic => {
            if entry.deployments.is_some() {
                warn!(group = %entry.project, "ignoring deployments listed for DYNAMIC group");
            }
            Ok(group)
        }
        GroupMode::Static => {
            let names = entry
                .deployments
                .ok_or_else(|| ConfigError::MissingDeployments(entry.project.clone()))?;
            let mut seen_units = HashSet::new();
            for name in &names {
                if !seen_units.insert(name.as_str()) {
                    return Err(ConfigError::DuplicateUnit {
                        group: entry.project.clone(),
                        unit: name.clone(),
                    });
                }
            }
            if names.len() > GRID_SIZE {
                warn!(
                    group = %entry.project,
                    count = names.len(),
                    max = GRID_SIZE,
                    "deployments beyond the grid height will not be shown"
                );
            }
            Ok(group.with_units(names.into_iter().map(DeployableUnit::new)))
        }
    }
}
