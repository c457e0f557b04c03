//! In-memory picture of the monitored workloads: groups hold deployable
//! units, units hold their live instances.
//!
//! Only the reconciler mutates the model, hence the crate-private mutators.

use std::collections::BTreeMap;

use shared::{
    domain::{GroupMode, InstanceRecord, InstanceStatus, Selector},
    error::{IndexKind, OutOfRange},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployableUnit {
    name: String,
    selector: Selector,
    instances: BTreeMap<String, InstanceStatus>,
}

impl DeployableUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_selector(name, Selector::new())
    }

    pub fn with_selector(name: impl Into<String>, selector: Selector) -> Self {
        Self {
            name: name.into(),
            selector,
            instances: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Live instances keyed and iterated by instance name.
    pub fn instances(&self) -> &BTreeMap<String, InstanceStatus> {
        &self.instances
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub(crate) fn set_selector(&mut self, selector: Selector) {
        self.selector = selector;
    }

    /// Replaces the instance map wholesale; terminating instances are dropped.
    pub(crate) fn replace_instances(&mut self, records: impl IntoIterator<Item = InstanceRecord>) {
        self.instances = records
            .into_iter()
            .filter(|record| !record.terminating)
            .map(|record| (record.name, record.status))
            .collect();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    name: String,
    mode: GroupMode,
    require_opt_in: bool,
    units: Vec<DeployableUnit>,
}

impl Group {
    pub fn new(name: impl Into<String>, mode: GroupMode) -> Self {
        Self {
            name: name.into(),
            mode,
            require_opt_in: false,
            units: Vec::new(),
        }
    }

    /// Declares the fixed unit set of a STATIC group.
    pub fn with_units(mut self, units: impl IntoIterator<Item = DeployableUnit>) -> Self {
        self.units = units.into_iter().collect();
        self
    }

    pub fn with_opt_in(mut self, require_opt_in: bool) -> Self {
        self.require_opt_in = require_opt_in;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> GroupMode {
        self.mode
    }

    pub fn require_opt_in(&self) -> bool {
        self.require_opt_in
    }

    /// Units in row order.
    pub fn units(&self) -> &[DeployableUnit] {
        &self.units
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn unit_at(&self, index: usize) -> Result<&DeployableUnit, OutOfRange> {
        self.units
            .get(index)
            .ok_or_else(|| OutOfRange::new(IndexKind::Unit, index, self.units.len()))
    }

    pub fn unit_by_name(&self, name: &str) -> Option<&DeployableUnit> {
        self.units.iter().find(|unit| unit.name == name)
    }

    pub(crate) fn units_mut(&mut self) -> &mut [DeployableUnit] {
        &mut self.units
    }

    pub(crate) fn unit_by_name_mut(&mut self, name: &str) -> Option<&mut DeployableUnit> {
        self.units.iter_mut().find(|unit| unit.name == name)
    }

    /// Appends `unit`; hands it back if the name is already taken.
    pub(crate) fn add_unit(&mut self, unit: DeployableUnit) -> Result<(), DeployableUnit> {
        if self.unit_by_name(&unit.name).is_some() {
            return Err(unit);
        }
        self.units.push(unit);
        Ok(())
    }

    /// Removes the unit, shifting every later unit up one row.
    pub(crate) fn remove_unit_by_name(&mut self, name: &str) -> Option<DeployableUnit> {
        let index = self.units.iter().position(|unit| unit.name == name)?;
        Some(self.units.remove(index))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadModel {
    groups: Vec<Group>,
}

impl WorkloadModel {
    pub fn new(groups: Vec<Group>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn group_at(&self, index: usize) -> Result<&Group, OutOfRange> {
        self.groups
            .get(index)
            .ok_or_else(|| OutOfRange::new(IndexKind::Group, index, self.groups.len()))
    }

    pub fn group_by_name(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|group| group.name == name)
    }

    pub(crate) fn groups_mut(&mut self) -> &mut [Group] {
        &mut self.groups
    }

    pub(crate) fn group_by_name_mut(&mut self, name: &str) -> Option<&mut Group> {
        self.groups.iter_mut().find(|group| group.name == name)
    }
}
