use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use controller::BootPlan;
use serde::Deserialize;
use shared::{
    domain::ChartName,
    protocol::{InitPayload, DEFAULT_DATASET},
};
use worker::source::DEFAULT_SODA_BASE;
use worker_channel::status::DEFAULT_LOG_CAPACITY;

const DEFAULT_CONFIG_FILE: &str = "dashboard.toml";
const ENV_PREFIX: &str = "DASHBOARD__";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub environment_index_location: String,
    pub accelerated_packages: Vec<String>,
    pub pure_script_packages: Vec<String>,
    pub dataset: String,
    pub soda_base_url: String,
    pub output_dir: PathBuf,
    pub chart_targets: Vec<String>,
    pub status_log_capacity: usize,
    pub rich_export: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment_index_location: "https://cdn.jsdelivr.net/pyodide/v0.26.4/full/".into(),
            accelerated_packages: vec!["micropip".into(), "numpy".into(), "pandas".into()],
            pure_script_packages: vec!["plotly".into(), "vizro".into()],
            dataset: DEFAULT_DATASET.into(),
            soda_base_url: DEFAULT_SODA_BASE.into(),
            output_dir: PathBuf::from("./dashboard-out"),
            chart_targets: ChartName::ALL
                .iter()
                .map(|chart| chart.as_str().to_string())
                .collect(),
            status_log_capacity: DEFAULT_LOG_CAPACITY,
            rich_export: false,
        }
    }
}

impl Settings {
    pub fn boot_plan(&self) -> BootPlan {
        BootPlan {
            init: InitPayload {
                environment_index_location: self.environment_index_location.clone(),
                accelerated_packages: self.accelerated_packages.clone(),
                pure_script_packages: self.pure_script_packages.clone(),
            },
            dataset: self.dataset.clone(),
        }
    }

    /// Configured chart targets that name a known chart.
    pub fn chart_targets(&self) -> BTreeSet<ChartName> {
        self.chart_targets
            .iter()
            .filter_map(|raw| {
                let chart = ChartName::parse(raw.trim());
                if chart.is_none() {
                    tracing::warn!(target_id = raw.as_str(), "ignoring unknown chart target");
                }
                chart
            })
            .collect()
    }
}

/// Defaults, then the config file, then `DASHBOARD__*` environment variables.
/// A missing default config file is fine; a missing explicit one is not.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = match path {
        Some(path) => read_settings_file(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            read_settings_file(Path::new(DEFAULT_CONFIG_FILE))?
        }
        None => Settings::default(),
    };
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn read_settings_file(path: &Path) -> anyhow::Result<Settings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file '{}'", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("invalid config file '{}'", path.display()))
}

fn apply_env_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

    if let Some(v) = var("ENVIRONMENT_INDEX_LOCATION") {
        settings.environment_index_location = v;
    }
    if let Some(v) = var("ACCELERATED_PACKAGES") {
        settings.accelerated_packages = split_list(&v);
    }
    if let Some(v) = var("PURE_SCRIPT_PACKAGES") {
        settings.pure_script_packages = split_list(&v);
    }
    if let Some(v) = var("DATASET") {
        settings.dataset = v;
    }
    if let Some(v) = var("SODA_BASE_URL") {
        settings.soda_base_url = v;
    }
    if let Some(v) = var("OUTPUT_DIR") {
        settings.output_dir = PathBuf::from(v);
    }
    if let Some(v) = var("CHART_TARGETS") {
        settings.chart_targets = split_list(&v);
    }
    if let Some(v) = var("STATUS_LOG_CAPACITY") {
        if let Ok(parsed) = v.parse::<usize>() {
            settings.status_log_capacity = parsed;
        }
    }
    if let Some(v) = var("RICH_EXPORT") {
        settings.rich_export = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
