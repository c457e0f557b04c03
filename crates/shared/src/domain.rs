use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// Label selector, kept ordered so that query strings are stable.
pub type Selector = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroupMode {
    Static,
    #[default]
    Dynamic,
}

impl fmt::Display for GroupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupMode::Static => f.write_str("STATIC"),
            GroupMode::Dynamic => f.write_str("DYNAMIC"),
        }
    }
}

/// Pod phase as reported upstream. Unrecognised phases are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InstanceStatus {
    Running,
    Pending,
    Succeeded,
    Failed,
    Unknown,
    Other(String),
}

impl From<&str> for InstanceStatus {
    fn from(value: &str) -> Self {
        match value {
            "Running" => InstanceStatus::Running,
            "Pending" => InstanceStatus::Pending,
            "Succeeded" => InstanceStatus::Succeeded,
            "Failed" => InstanceStatus::Failed,
            "Unknown" | "" => InstanceStatus::Unknown,
            other => InstanceStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceStatus::Running => f.write_str("Running"),
            InstanceStatus::Pending => f.write_str("Pending"),
            InstanceStatus::Succeeded => f.write_str("Succeeded"),
            InstanceStatus::Failed => f.write_str("Failed"),
            InstanceStatus::Unknown => f.write_str("Unknown"),
            InstanceStatus::Other(raw) => f.write_str(raw),
        }
    }
}

/// One fetched instance of a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRecord {
    pub name: String,
    pub status: InstanceStatus,
    /// Deletion already requested upstream.
    pub terminating: bool,
}

impl InstanceRecord {
    pub fn new(name: impl Into<String>, status: impl Into<InstanceStatus>) -> Self {
        Self {
            name: name.into(),
            status: status.into(),
            terminating: false,
        }
    }

    pub fn terminating(mut self) -> Self {
        self.terminating = true;
        self
    }
}

/// What the cluster tells us about a deployable unit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UnitDescriptor {
    pub group: String,
    pub name: String,
    pub selector: Selector,
    pub labels: BTreeMap<String, String>,
}

impl UnitDescriptor {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            selector: Selector::new(),
            labels: BTreeMap::new(),
        }
    }

    pub fn with_selector<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.selector.insert(key.into(), value.into());
        self
    }

    pub fn with_label<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchAction {
    Added,
    Modified,
    Deleted,
    /// The watch itself failed; carries no unit state.
    Error,
}

impl WatchAction {
    /// Maps the `type` field of a watch event line. `None` for event types
    /// that carry no unit change (bookmarks).
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "ADDED" => Some(WatchAction::Added),
            "MODIFIED" => Some(WatchAction::Modified),
            "DELETED" => Some(WatchAction::Deleted),
            "BOOKMARK" => None,
            _ => Some(WatchAction::Error),
        }
    }
}

impl fmt::Display for WatchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchAction::Added => f.write_str("ADDED"),
            WatchAction::Modified => f.write_str("MODIFIED"),
            WatchAction::Deleted => f.write_str("DELETED"),
            WatchAction::Error => f.write_str("ERROR"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub action: WatchAction,
    pub unit: UnitDescriptor,
}

impl WatchEvent {
    pub fn new(action: WatchAction, unit: UnitDescriptor) -> Self {
        Self { action, unit }
    }
}
