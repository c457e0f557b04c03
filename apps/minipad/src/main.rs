use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use cluster_integration::KubeRestCluster;
use controller::{load_workloads, Controller};
use launchpad::{spawn_reader, LaunchpadGrid};
use shared::grid::ControlEvent;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use url::Url;

mod config;

use config::load_settings;

const CONTROL_EVENT_BUFFER: usize = 64;

/// Drives a Launchpad Mini from the deployments of a cluster.
#[derive(Parser, Debug)]
#[command(name = "minipad")]
struct Args {
    /// JSON file listing the monitored projects.
    #[arg(short = 'f', long = "file")]
    file: Option<PathBuf>,
    /// Project selected at startup [default: default]
    #[arg(short = 'n', long)]
    namespace: Option<String>,
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long)]
    midi_device: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(v) = args.api_url {
        settings.api_url = v;
    }
    if let Some(v) = args.midi_device {
        settings.midi_device = v;
    }
    if let Some(v) = args.namespace {
        settings.namespace = v;
    }
    let workloads_path = args
        .file
        .or(settings.workloads.clone())
        .context("no workload configuration given; pass -f <JSON_CONFIG>")?;

    let model = load_workloads(&workloads_path)
        .with_context(|| format!("invalid workload configuration {}", workloads_path.display()))?;
    info!(
        groups = model.group_count(),
        config = %workloads_path.display(),
        "loaded workload configuration"
    );

    let api_url = Url::parse(&settings.api_url)
        .with_context(|| format!("invalid cluster API url '{}'", settings.api_url))?;
    let cluster = Arc::new(KubeRestCluster::new(api_url));

    let (grid, midi_input) = LaunchpadGrid::open(&settings.midi_device)?;
    let (control_tx, control_rx) = mpsc::channel::<ControlEvent>(CONTROL_EVENT_BUFFER);
    // blocks on the device node; left running until the process exits
    let _reader = spawn_reader(midi_input, control_tx);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "failed to listen for ctrl-c");
            // dropping the sender would stop the controller
            std::future::pending::<()>().await;
        }
        info!("interrupt received; shutting down");
        let _ = shutdown_tx.send(true);
    });

    info!(
        api = %settings.api_url,
        device = %settings.midi_device,
        group = %settings.namespace,
        "starting minipad"
    );
    Controller::new(model, cluster, grid, &settings.namespace)
        .run(control_rx, shutdown_rx)
        .await?;
    Ok(())
}
