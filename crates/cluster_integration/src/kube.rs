//! Kubernetes REST implementation of [`ClusterAdapter`].
//!
//! Talks plain HTTP to an already authenticated endpoint, typically
//! `kubectl proxy`.

use std::{collections::BTreeMap, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{header::CONTENT_TYPE, Client};
use serde::Deserialize;
use shared::domain::{InstanceRecord, Selector, UnitDescriptor, WatchAction, WatchEvent};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use crate::{ClusterAdapter, WatchHandle};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8001";
const WATCH_RECONNECT_DELAY: Duration = Duration::from_secs(5);
const MERGE_PATCH_CONTENT_TYPE: &str = "application/merge-patch+json";
const MAX_WATCH_LINE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMeta {
    name: String,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    labels: Option<BTreeMap<String, String>>,
    #[serde(default)]
    deletion_timestamp: Option<String>,
    #[serde(default)]
    resource_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LabelSelector {
    #[serde(default)]
    match_labels: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct DeploymentSpec {
    #[serde(default)]
    selector: Option<LabelSelector>,
}

#[derive(Debug, Deserialize)]
struct Deployment {
    metadata: ObjectMeta,
    #[serde(default)]
    spec: Option<DeploymentSpec>,
}

impl Deployment {
    fn into_descriptor(self, fallback_group: &str) -> UnitDescriptor {
        let selector = self
            .spec
            .and_then(|spec| spec.selector)
            .and_then(|selector| selector.match_labels)
            .unwrap_or_default();
        UnitDescriptor {
            group: self
                .metadata
                .namespace
                .unwrap_or_else(|| fallback_group.to_string()),
            name: self.metadata.name,
            selector,
            labels: self.metadata.labels.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PodStatus {
    #[serde(default)]
    phase: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Pod {
    metadata: ObjectMeta,
    #[serde(default)]
    status: Option<PodStatus>,
}

#[derive(Debug, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<Pod>,
}

#[derive(Debug, Deserialize)]
struct WatchLine {
    #[serde(rename = "type")]
    kind: String,
    object: serde_json::Value,
}

#[derive(Clone)]
pub struct KubeRestCluster {
    http: Client,
    base: Url,
    reconnect_delay: Duration,
}

impl KubeRestCluster {
    pub fn new(base: Url) -> Self {
        Self::with_client(Client::new(), base)
    }

    pub fn with_client(http: Client, mut base: Url) -> Self {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Self {
            http,
            base,
            reconnect_delay: WATCH_RECONNECT_DELAY,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .with_context(|| format!("invalid cluster API path '{path}'"))
    }

    fn deployments_path(group: &str) -> String {
        format!("apis/apps/v1/namespaces/{group}/deployments")
    }
}

#[async_trait]
impl ClusterAdapter for KubeRestCluster {
    async fn describe_unit(&self, group: &str, unit: &str) -> Result<UnitDescriptor> {
        let url = self.endpoint(&format!("{}/{unit}", Self::deployments_path(group)))?;
        let deployment: Deployment = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("failed to fetch deployment {group}/{unit}"))?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("malformed deployment {group}/{unit}"))?;
        Ok(deployment.into_descriptor(group))
    }

    async fn fetch_instances(&self, group: &str, selector: &Selector) -> Result<Vec<InstanceRecord>> {
        if selector.is_empty() {
            // `labelSelector=` matches every pod in the namespace
            debug!(%group, "empty label selector; not listing pods");
            return Ok(Vec::new());
        }
        let url = self.endpoint(&format!("api/v1/namespaces/{group}/pods"))?;
        let pods: PodList = self
            .http
            .get(url)
            .query(&[("labelSelector", label_selector_query(selector))])
            .send()
            .await
            .with_context(|| format!("failed to list pods in {group}"))?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("malformed pod list in {group}"))?;

        Ok(pods
            .items
            .into_iter()
            .map(|pod| InstanceRecord {
                terminating: pod.metadata.deletion_timestamp.is_some(),
                status: pod
                    .status
                    .and_then(|status| status.phase)
                    .as_deref()
                    .unwrap_or_default()
                    .into(),
                name: pod.metadata.name,
            })
            .collect())
    }

    async fn watch(&self, group: &str, sink: mpsc::Sender<WatchEvent>) -> Result<WatchHandle> {
        let url = self.endpoint(&Self::deployments_path(group))?;
        let http = self.http.clone();
        let group = group.to_string();
        let delay = self.reconnect_delay;

        info!(%group, "watching deployments");
        let task = tokio::spawn(async move {
            let mut resource_version = None;
            loop {
                match stream_watch(&http, &url, &group, &sink, &mut resource_version).await {
                    Ok(()) => debug!(%group, "deployment watch stream ended"),
                    Err(error) => warn!(%group, %error, "deployment watch failed"),
                }
                if sink.is_closed() {
                    break;
                }
                tokio::time::sleep(delay).await;
            }
        });
        Ok(WatchHandle::spawned(task))
    }

    async fn scale(&self, group: &str, unit: &str, replicas: u32) -> Result<()> {
        let url = self.endpoint(&format!("{}/{unit}/scale", Self::deployments_path(group)))?;
        let body = serde_json::json!({ "spec": { "replicas": replicas } });
        self.http
            .patch(url)
            .header(CONTENT_TYPE, MERGE_PATCH_CONTENT_TYPE)
            .body(serde_json::to_vec(&body)?)
            .send()
            .await
            .with_context(|| format!("failed to scale {group}/{unit}"))?
            .error_for_status()?;
        Ok(())
    }
}

fn label_selector_query(selector: &Selector) -> String {
    selector
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(",")
}

async fn stream_watch(
    http: &Client,
    url: &Url,
    group: &str,
    sink: &mpsc::Sender<WatchEvent>,
    resource_version: &mut Option<String>,
) -> Result<()> {
    let mut request = http.get(url.clone()).query(&[("watch", "true")]);
    if let Some(version) = resource_version.as_deref() {
        request = request.query(&[("resourceVersion", version)]);
    }
    let response = request.send().await?.error_for_status()?;

    let mut body = Box::pin(response.bytes_stream());
    let mut lines = LineBuffer::new(MAX_WATCH_LINE_BYTES);
    while let Some(chunk) = body.next().await {
        lines.push(&chunk?)?;
        while let Some(line) = lines.next_line() {
            let Some(event) = decode_watch_line(&line, group, resource_version)? else {
                continue;
            };
            if sink.send(event).await.is_err() {
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Splits a chunked body into newline-terminated lines. An unfinished line
/// longer than `limit` is an error.
#[derive(Debug)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
    limit: usize,
}

impl LineBuffer {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            pending: Vec::new(),
            limit,
        }
    }

    pub(crate) fn push(&mut self, chunk: &[u8]) -> Result<()> {
        self.pending.extend_from_slice(chunk);
        let unfinished = match self.pending.iter().rposition(|byte| *byte == b'\n') {
            Some(end) => self.pending.len() - end - 1,
            None => self.pending.len(),
        };
        if unfinished > self.limit {
            self.pending.clear();
            bail!("watch event exceeds {} bytes without a line break", self.limit);
        }
        Ok(())
    }

    pub(crate) fn next_line(&mut self) -> Option<Vec<u8>> {
        let end = self.pending.iter().position(|byte| *byte == b'\n')?;
        Some(self.pending.drain(..=end).collect())
    }
}

/// Decodes one newline-delimited watch event. Blank lines and bookmarks
/// yield `None`; `resource_version` tracks where to resume after a
/// reconnect and is cleared when the server reports an error.
pub(crate) fn decode_watch_line(
    line: &[u8],
    group: &str,
    resource_version: &mut Option<String>,
) -> Result<Option<WatchEvent>> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let line: WatchLine = serde_json::from_slice(line).context("malformed watch event")?;

    let Some(action) = WatchAction::from_wire(&line.kind) else {
        if let Some(version) = line
            .object
            .pointer("/metadata/resourceVersion")
            .and_then(|v| v.as_str())
        {
            *resource_version = Some(version.to_string());
        }
        return Ok(None);
    };

    if action == WatchAction::Error {
        let reason = line
            .object
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown watch error");
        warn!(%group, reason, "watch reported an error");
        *resource_version = None;
        return Ok(Some(WatchEvent::new(
            action,
            UnitDescriptor::new(group, String::new()),
        )));
    }

    let deployment: Deployment = serde_json::from_value(line.object)
        .map_err(|error| anyhow!("malformed deployment in watch event: {error}"))?;
    if let Some(version) = deployment.metadata.resource_version.clone() {
        *resource_version = Some(version);
    }
    Ok(Some(WatchEvent::new(action, deployment.into_descriptor(group))))
}

#[cfg(test)]
#[path = "tests/kube_tests.rs"]
mod tests;
