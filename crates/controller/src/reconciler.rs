use std::sync::Arc;

use cluster_integration::{ClusterAdapter, WatchHandle};
use shared::domain::{GroupMode, InstanceRecord, Selector, UnitDescriptor, WatchAction, WatchEvent};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    error::ReconcileError,
    model::{DeployableUnit, Group, WorkloadModel},
};

/// Label a unit must carry to join a group configured with `require_opt_in`.
pub const OPT_IN_LABEL: &str = "minipad/enabled";

/// Receives the name of every group whose unit set or instance state changed.
pub trait GroupObserver {
    fn group_changed(&mut self, model: &WorkloadModel, group: &str);
}

/// Keeps the workload model in step with cluster events.
pub struct Reconciler<C: ClusterAdapter> {
    cluster: Arc<C>,
}

impl<C: ClusterAdapter> Reconciler<C> {
    pub fn new(cluster: Arc<C>) -> Self {
        Self { cluster }
    }

    /// Populates STATIC groups, then starts one watch per group.
    pub async fn initialize(
        &self,
        model: &mut WorkloadModel,
        sink: mpsc::Sender<WatchEvent>,
    ) -> Result<Vec<WatchHandle>, ReconcileError> {
        for group in model.groups_mut() {
            if group.mode() == GroupMode::Static {
                self.populate_static_group(group).await;
            }
        }

        let mut watches = Vec::with_capacity(model.group_count());
        for group in model.groups() {
            let handle = self
                .cluster
                .watch(group.name(), sink.clone())
                .await
                .map_err(|source| ReconcileError::Watch {
                    group: group.name().to_string(),
                    source,
                })?;
            watches.push(handle);
        }
        Ok(watches)
    }

    async fn populate_static_group(&self, group: &mut Group) {
        let group_name = group.name().to_string();
        for unit in group.units_mut() {
            info!(group = %group_name, unit = %unit.name(), "initializing static deployment");
            let described = self.cluster.describe_unit(&group_name, unit.name()).await;
            match described {
                Ok(descriptor) => unit.set_selector(descriptor.selector),
                Err(error) => {
                    warn!(group = %group_name, unit = %unit.name(), %error, "failed to describe static deployment");
                    continue;
                }
            }
            let fetched = self.fetch(&group_name, unit.name(), unit.selector()).await;
            match fetched {
                Ok(records) => unit.replace_instances(records),
                Err(error) => warn!(%error, "static deployment starts without instances"),
            }
        }
    }

    /// Applies one cluster event and notifies `observer` when the owning
    /// group changed. Events for groups outside the model are ignored.
    pub async fn on_event(
        &self,
        model: &mut WorkloadModel,
        event: WatchEvent,
        observer: &mut (dyn GroupObserver + Send),
    ) -> Result<(), ReconcileError> {
        let WatchEvent { action, unit } = event;
        let group_name = unit.group.clone();
        let Some(group) = model.group_by_name_mut(&group_name) else {
            debug!(group = %group_name, unit = %unit.name, %action, "ignoring event for unmonitored group");
            return Ok(());
        };

        let changed = match (action, group.mode()) {
            (WatchAction::Error, _) => {
                warn!(group = %group_name, unit = %unit.name, "error watching deployments; model unchanged");
                false
            }
            (WatchAction::Added, GroupMode::Dynamic) => self.add_unit(group, unit).await?,
            (WatchAction::Modified, _) => self.modify_unit(group, &unit).await?,
            (WatchAction::Deleted, GroupMode::Dynamic) => {
                info!(group = %group_name, unit = %unit.name, "removing deployment");
                group.remove_unit_by_name(&unit.name).is_some()
            }
            (WatchAction::Added | WatchAction::Deleted, GroupMode::Static) => {
                debug!(group = %group_name, unit = %unit.name, %action, "static group ignores membership events");
                false
            }
        };

        if changed {
            observer.group_changed(model, &group_name);
        }
        Ok(())
    }

    async fn add_unit(&self, group: &mut Group, unit: UnitDescriptor) -> Result<bool, ReconcileError> {
        if group.require_opt_in() && !opted_in(&unit) {
            debug!(
                group = %group.name(),
                unit = %unit.name,
                label = OPT_IN_LABEL,
                "skipping deployment that did not opt in"
            );
            return Ok(false);
        }

        let fetched = self.fetch(group.name(), &unit.name, &unit.selector).await;

        // a reconnecting watch lists existing units again as ADDED
        if let Some(existing) = group.unit_by_name_mut(&unit.name) {
            let records = fetched?;
            debug!(unit = %unit.name, "deployment already known; refreshing instances");
            existing.set_selector(unit.selector);
            existing.replace_instances(records);
            return Ok(true);
        }

        // the unit is tracked even without a pod list; MODIFIED fills it in
        let records = fetched.unwrap_or_else(|error| {
            warn!(%error, "adding deployment without instances");
            Vec::new()
        });
        info!(group = %group.name(), unit = %unit.name, "adding deployment");
        let mut added = DeployableUnit::with_selector(unit.name, unit.selector);
        added.replace_instances(records);
        if group.add_unit(added).is_err() {
            return Ok(false);
        }
        Ok(true)
    }

    async fn modify_unit(&self, group: &mut Group, unit: &UnitDescriptor) -> Result<bool, ReconcileError> {
        let Some(existing) = group.unit_by_name(&unit.name) else {
            if group.require_opt_in() && !opted_in(unit) {
                debug!(group = %group.name(), unit = %unit.name, "update for deployment that did not opt in");
                return Ok(false);
            }
            return Err(ReconcileError::UnknownUnit {
                group: group.name().to_string(),
                unit: unit.name.clone(),
            });
        };
        let selector = if unit.selector.is_empty() {
            existing.selector().clone()
        } else {
            unit.selector.clone()
        };

        let records = self.fetch(group.name(), &unit.name, &selector).await?;

        debug!(group = %group.name(), unit = %unit.name, instances = records.len(), "modifying deployment");
        if let Some(existing) = group.unit_by_name_mut(&unit.name) {
            existing.set_selector(selector);
            existing.replace_instances(records);
        }
        Ok(true)
    }

    async fn fetch(
        &self,
        group: &str,
        unit: &str,
        selector: &Selector,
    ) -> Result<Vec<InstanceRecord>, ReconcileError> {
        if selector.is_empty() {
            // an empty label selector would match every pod in the namespace
            debug!(%group, %unit, "deployment has no label selector; no instances");
            return Ok(Vec::new());
        }
        self.cluster
            .fetch_instances(group, selector)
            .await
            .map_err(|source| ReconcileError::Fetch {
                group: group.to_string(),
                unit: unit.to_string(),
                source,
            })
    }
}

fn opted_in(unit: &UnitDescriptor) -> bool {
    unit.labels.get(OPT_IN_LABEL).map(String::as_str) == Some("true")
}

#[cfg(test)]
#[path = "tests/reconciler_tests.rs"]
mod tests;
