use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Parser;
use controller::{BootState, Controller};
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;
use worker::{
    native::NativeRuntime,
    source::{DrawSource, RawDraw, SodaSource, StaticSource},
    spawn_worker,
};
use worker_channel::{StatusLog, WorkerChannel};

mod config;
mod surfaces;

use config::{load_settings, Settings};
use surfaces::FsSurfaces;

#[derive(Parser, Debug)]
#[command(name = "dashboard", about = "Build the lottery draw dashboard")]
struct Args {
    /// TOML settings file; defaults to ./dashboard.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    dataset: Option<String>,
    #[arg(long)]
    out_dir: Option<PathBuf>,
    /// Make the dashboard export package installable.
    #[arg(long)]
    rich_export: bool,
    /// Read draw rows from a local JSON file instead of the remote API.
    #[arg(long)]
    draws_file: Option<PathBuf>,
}

impl Args {
    fn apply(&self, settings: &mut Settings) {
        if let Some(dataset) = &self.dataset {
            settings.dataset = dataset.clone();
        }
        if let Some(out_dir) = &self.out_dir {
            settings.output_dir = out_dir.clone();
        }
        if self.rich_export {
            settings.rich_export = true;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut settings = load_settings(args.config.as_deref())?;
    args.apply(&mut settings);
    info!(dataset = %settings.dataset, out_dir = %settings.output_dir.display(), "starting dashboard");

    let source = draw_source(&args, &settings).await?;
    let runtime = Arc::new(NativeRuntime::new(source, settings.rich_export));
    let log = Arc::new(StatusLog::new(settings.status_log_capacity));
    let channel = WorkerChannel::spawn(spawn_worker(runtime), log.clone());
    let surfaces = Arc::new(FsSurfaces::new(
        settings.output_dir.clone(),
        settings.chart_targets(),
    ));

    let mut controller = Controller::new(
        channel,
        settings.boot_plan(),
        surfaces.clone(),
        surfaces,
        log.clone(),
    );
    let state = controller.run().await.clone();

    tokio::fs::create_dir_all(&settings.output_dir)
        .await
        .with_context(|| format!("failed to create '{}'", settings.output_dir.display()))?;
    let log_path = settings.output_dir.join("status.log");
    tokio::fs::write(&log_path, log.render_text())
        .await
        .with_context(|| format!("failed to write '{}'", log_path.display()))?;

    println!("{}", log.headline());
    match state {
        BootState::Failed { stage, message } => {
            anyhow::bail!("dashboard boot failed during {stage:?}: {message}")
        }
        other => {
            info!(state = ?other, log = %log_path.display(), "dashboard boot finished");
            Ok(())
        }
    }
}

async fn draw_source(args: &Args, settings: &Settings) -> anyhow::Result<Arc<dyn DrawSource>> {
    if let Some(path) = &args.draws_file {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read draws file '{}'", path.display()))?;
        let rows: Vec<RawDraw> = serde_json::from_str(&raw)
            .with_context(|| format!("invalid draws file '{}'", path.display()))?;
        return Ok(Arc::new(StaticSource::new(rows)));
    }

    let base_url = Url::parse(&settings.soda_base_url)
        .with_context(|| format!("invalid SODA base url '{}'", settings.soda_base_url))?;
    let client = reqwest::Client::builder()
        .user_agent(concat!("dashboard/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(Arc::new(SodaSource::new(client, base_url)))
}
