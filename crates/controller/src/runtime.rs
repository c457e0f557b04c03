//! Single consumer loop serializing cluster events, button presses and
//! rendering.

use std::sync::Arc;

use cluster_integration::{ClusterAdapter, WatchHandle};
use shared::{
    domain::WatchEvent,
    grid::{ControlEvent, GridDevice},
};
use tokio::{
    sync::{mpsc, watch},
    task::JoinSet,
};
use tracing::{debug, info, warn};

use crate::{
    dispatcher::{self, ScaleRequest},
    error::ReconcileError,
    model::WorkloadModel,
    projection::GridProjection,
    reconciler::Reconciler,
};

const WATCH_EVENT_BUFFER: usize = 256;

pub struct Controller<C: ClusterAdapter + 'static, D: GridDevice> {
    model: WorkloadModel,
    cluster: Arc<C>,
    reconciler: Reconciler<C>,
    projection: GridProjection<D>,
    watches: Vec<WatchHandle>,
    scale_tasks: JoinSet<()>,
}

impl<C: ClusterAdapter + 'static, D: GridDevice> Controller<C, D> {
    pub fn new(model: WorkloadModel, cluster: Arc<C>, device: D, default_group: &str) -> Self {
        let projection = GridProjection::new(device, &model, default_group);
        Self {
            model,
            reconciler: Reconciler::new(Arc::clone(&cluster)),
            cluster,
            projection,
            watches: Vec::new(),
            scale_tasks: JoinSet::new(),
        }
    }

    /// Clears the device, populates STATIC groups, starts the watches
    /// feeding `sink` and draws the first frame.
    pub async fn initialize(&mut self, sink: mpsc::Sender<WatchEvent>) -> Result<(), ReconcileError> {
        if let Err(error) = self.projection.device_mut().reset() {
            warn!(%error, "failed to reset grid device");
        }
        self.watches = self.reconciler.initialize(&mut self.model, sink).await?;
        self.render();
        Ok(())
    }

    pub async fn handle_watch_event(&mut self, event: WatchEvent) {
        if let Err(error) = self
            .reconciler
            .on_event(&mut self.model, event, &mut self.projection)
            .await
        {
            warn!(%error, "skipping cluster event");
        }
    }

    pub fn handle_control(&mut self, event: ControlEvent) {
        if let Some(request) = dispatcher::dispatch(event, &self.model, &mut self.projection) {
            self.submit_scale(request);
        }
        self.reap_scale_tasks();
    }

    fn submit_scale(&mut self, request: ScaleRequest) {
        let cluster = Arc::clone(&self.cluster);
        self.scale_tasks.spawn(async move {
            let ScaleRequest {
                group,
                unit,
                replicas,
            } = request;
            if let Err(error) = cluster.scale(&group, &unit, replicas).await {
                warn!(%group, %unit, replicas, %error, "scale request failed");
            }
        });
    }

    fn reap_scale_tasks(&mut self) {
        while let Some(result) = self.scale_tasks.try_join_next() {
            if let Err(error) = result {
                warn!(%error, "scale task did not complete");
            }
        }
    }

    fn render(&mut self) {
        if let Err(error) = self.projection.render(&self.model) {
            warn!(%error, "failed to draw grid");
        }
    }

    /// Runs until `shutdown` flips to `true` (or its sender is dropped), or
    /// until every watch has ended. Consumes the controller so that nothing
    /// can touch the model once it returns.
    pub async fn run(
        mut self,
        mut controls: mpsc::Receiver<ControlEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), ReconcileError> {
        let (sink, mut cluster_events) = mpsc::channel(WATCH_EVENT_BUFFER);
        self.initialize(sink).await?;
        info!(groups = self.model.group_count(), "controller running");

        let mut controls_open = true;
        while !*shutdown.borrow() {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("shutdown sender dropped");
                        break;
                    }
                }
                event = cluster_events.recv() => match event {
                    Some(event) => self.handle_watch_event(event).await,
                    None => {
                        info!("all watches ended");
                        break;
                    }
                },
                control = controls.recv(), if controls_open => match control {
                    Some(control) => self.handle_control(control),
                    None => {
                        debug!("control input closed");
                        controls_open = false;
                    }
                },
            }
        }

        self.stop();
        Ok(())
    }

    /// Stops watches and outstanding scale requests and blanks the device.
    pub fn stop(&mut self) {
        let running = self.watches.iter().filter(|watch| watch.is_running()).count();
        info!(watches = running, "stopping controller");
        for watch in &mut self.watches {
            watch.stop();
        }
        self.watches.clear();
        self.scale_tasks.abort_all();
        if let Err(error) = self.projection.device_mut().reset() {
            warn!(%error, "failed to reset grid device");
        }
    }
}

#[cfg(test)]
#[path = "tests/runtime_tests.rs"]
mod tests;
