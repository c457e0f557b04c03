use async_trait::async_trait;
use shared::domain::{InstanceRecord, Selector, UnitDescriptor, WatchEvent};
use tokio::{sync::mpsc, task::JoinHandle};

pub mod kube;

pub use kube::KubeRestCluster;

/// Narrow view of the cluster API the controller depends on.
#[async_trait]
pub trait ClusterAdapter: Send + Sync {
    /// Looks up a deployable unit, mainly to learn its instance selector.
    async fn describe_unit(&self, group: &str, unit: &str) -> anyhow::Result<UnitDescriptor>;

    /// Lists the instances matching `selector` in `group`, terminating ones
    /// included and flagged.
    async fn fetch_instances(
        &self,
        group: &str,
        selector: &Selector,
    ) -> anyhow::Result<Vec<InstanceRecord>>;

    /// Starts delivering unit events of `group` into `sink` until the
    /// returned handle is stopped or the receiver is dropped.
    async fn watch(
        &self,
        group: &str,
        sink: mpsc::Sender<WatchEvent>,
    ) -> anyhow::Result<WatchHandle>;

    async fn scale(&self, group: &str, unit: &str, replicas: u32) -> anyhow::Result<()>;
}

/// Owns the background task feeding a watch.
#[derive(Debug)]
pub struct WatchHandle {
    task: Option<JoinHandle<()>>,
}

impl WatchHandle {
    pub fn spawned(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
