use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use cluster_integration::{ClusterAdapter, WatchHandle};
use shared::{
    domain::{InstanceRecord, InstanceStatus, Selector, UnitDescriptor, WatchEvent},
    grid::{Color, GridDevice, Indicator, GRID_SIZE},
};
use tokio::sync::mpsc;

use crate::dispatcher::ScaleRequest;

/// Units of the fake cluster select their instances by `app=<unit name>`.
pub(crate) fn descriptor(group: &str, unit: &str) -> UnitDescriptor {
    UnitDescriptor::new(group, unit).with_selector("app", unit)
}

pub(crate) fn running(names: &[&str]) -> Vec<InstanceRecord> {
    names
        .iter()
        .map(|name| InstanceRecord::new(*name, InstanceStatus::Running))
        .collect()
}

/// Polls `condition` for up to a second.
pub(crate) async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}

/// Counts live holders; the count drops when the holder is dropped, including
/// when the owning task is aborted.
struct Live(Arc<AtomicUsize>);

impl Live {
    fn new(count: &Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(count))
    }
}

impl Drop for Live {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub(crate) struct FakeCluster {
    instances: Mutex<HashMap<(String, String), Vec<InstanceRecord>>>,
    fail_fetches: Mutex<bool>,
    fetches: Mutex<Vec<(String, Selector)>>,
    scales: Mutex<Vec<ScaleRequest>>,
    sinks: Mutex<HashMap<String, mpsc::Sender<WatchEvent>>>,
    refused_watch: Mutex<Option<String>>,
    active_watches: Arc<AtomicUsize>,
    hold_scales: AtomicBool,
    scales_in_flight: Arc<AtomicUsize>,
}

impl FakeCluster {
    pub(crate) fn set_instances(&self, group: &str, unit: &str, records: Vec<InstanceRecord>) {
        self.instances
            .lock()
            .expect("instances lock")
            .insert((group.to_string(), unit.to_string()), records);
    }

    pub(crate) fn fail_fetches(&self, fail: bool) {
        *self.fail_fetches.lock().expect("fail lock") = fail;
    }

    pub(crate) fn refuse_watch(&self, group: &str) {
        *self.refused_watch.lock().expect("refused lock") = Some(group.to_string());
    }

    pub(crate) fn active_watches(&self) -> usize {
        self.active_watches.load(Ordering::SeqCst)
    }

    /// Scale calls made from now on never complete.
    pub(crate) fn hold_scales(&self) {
        self.hold_scales.store(true, Ordering::SeqCst);
    }

    pub(crate) fn scales_in_flight(&self) -> usize {
        self.scales_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn fetch_count(&self) -> usize {
        self.fetches.lock().expect("fetches lock").len()
    }

    pub(crate) fn scales(&self) -> Vec<ScaleRequest> {
        self.scales.lock().expect("scales lock").clone()
    }

    pub(crate) fn watched_groups(&self) -> Vec<String> {
        let mut groups: Vec<String> = self.sinks.lock().expect("sinks lock").keys().cloned().collect();
        groups.sort();
        groups
    }

    pub(crate) async fn wait_for_watches(&self, count: usize) {
        for _ in 0..200 {
            if self.sinks.lock().expect("sinks lock").len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("watches were not started");
    }

    pub(crate) async fn emit(&self, event: WatchEvent) {
        let sink = self
            .sinks
            .lock()
            .expect("sinks lock")
            .get(&event.unit.group)
            .cloned()
            .expect("group is watched");
        sink.send(event).await.expect("controller receives events");
    }

    pub(crate) async fn wait_for_scales(&self, count: usize) -> Vec<ScaleRequest> {
        for _ in 0..200 {
            let scales = self.scales();
            if scales.len() >= count {
                return scales;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {count} scale requests, saw {:?}", self.scales());
    }
}

#[async_trait]
impl ClusterAdapter for FakeCluster {
    async fn describe_unit(&self, group: &str, unit: &str) -> Result<UnitDescriptor> {
        Ok(descriptor(group, unit))
    }

    async fn fetch_instances(&self, group: &str, selector: &Selector) -> Result<Vec<InstanceRecord>> {
        self.fetches
            .lock()
            .expect("fetches lock")
            .push((group.to_string(), selector.clone()));
        if *self.fail_fetches.lock().expect("fail lock") {
            return Err(anyhow!("cluster unavailable"));
        }
        let Some(unit) = selector.get("app") else {
            return Ok(Vec::new());
        };
        Ok(self
            .instances
            .lock()
            .expect("instances lock")
            .get(&(group.to_string(), unit.clone()))
            .cloned()
            .unwrap_or_default())
    }

    async fn watch(&self, group: &str, sink: mpsc::Sender<WatchEvent>) -> Result<WatchHandle> {
        if self.refused_watch.lock().expect("refused lock").as_deref() == Some(group) {
            return Err(anyhow!("watch refused for {group}"));
        }
        self.sinks
            .lock()
            .expect("sinks lock")
            .insert(group.to_string(), sink);
        let live = Live::new(&self.active_watches);
        Ok(WatchHandle::spawned(tokio::spawn(async move {
            let _live = live;
            std::future::pending::<()>().await;
        })))
    }

    async fn scale(&self, group: &str, unit: &str, replicas: u32) -> Result<()> {
        if self.hold_scales.load(Ordering::SeqCst) {
            let _in_flight = Live::new(&self.scales_in_flight);
            std::future::pending::<()>().await;
        }
        self.scales.lock().expect("scales lock").push(ScaleRequest {
            group: group.to_string(),
            unit: unit.to_string(),
            replicas,
        });
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum GridOp {
    Set(Indicator, Color),
    ClearRow(usize),
    Reset,
}

#[derive(Default)]
struct GridState {
    frame: BTreeMap<Indicator, Color>,
    ops: Vec<GridOp>,
}

/// Grid device keeping the lit state and every call; clones share state.
#[derive(Clone, Default)]
pub(crate) struct RecordingGrid {
    state: Arc<Mutex<GridState>>,
}

impl RecordingGrid {
    pub(crate) fn frame(&self) -> BTreeMap<Indicator, Color> {
        self.state.lock().expect("grid lock").frame.clone()
    }

    pub(crate) fn ops(&self) -> Vec<GridOp> {
        self.state.lock().expect("grid lock").ops.clone()
    }

    pub(crate) fn color(&self, indicator: Indicator) -> Color {
        self.state
            .lock()
            .expect("grid lock")
            .frame
            .get(&indicator)
            .copied()
            .unwrap_or(Color::Off)
    }

    /// Every full render clears row 0 exactly once.
    pub(crate) fn render_count(&self) -> usize {
        self.state
            .lock()
            .expect("grid lock")
            .ops
            .iter()
            .filter(|op| **op == GridOp::ClearRow(0))
            .count()
    }

    pub(crate) fn lit_cells(&self, row: usize) -> Vec<Color> {
        (0..GRID_SIZE)
            .map(|col| self.color(Indicator::Cell { row, col }))
            .take_while(|color| *color != Color::Off)
            .collect()
    }
}

impl GridDevice for RecordingGrid {
    fn set_indicator(&mut self, indicator: Indicator, color: Color) -> Result<()> {
        let mut state = self.state.lock().expect("grid lock");
        if color == Color::Off {
            state.frame.remove(&indicator);
        } else {
            state.frame.insert(indicator, color);
        }
        state.ops.push(GridOp::Set(indicator, color));
        Ok(())
    }

    fn clear_row(&mut self, row: usize) -> Result<()> {
        let mut state = self.state.lock().expect("grid lock");
        state.frame.retain(|indicator, _| match indicator {
            Indicator::Cell { row: r, .. } | Indicator::RowEnd(r) => *r != row,
            Indicator::Selector(_) => true,
        });
        state.ops.push(GridOp::ClearRow(row));
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        let mut state = self.state.lock().expect("grid lock");
        state.frame.clear();
        state.ops.push(GridOp::Reset);
        Ok(())
    }
}
