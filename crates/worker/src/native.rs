//! Native computation environment: fetches the draw history and computes the
//! dashboard figures in-process.

use std::{collections::BTreeSet, sync::Arc};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::json;
use shared::{domain::LogLevel, protocol::BuildResultPayload};
use url::Url;

use crate::{
    environment::{Environment, ScriptRuntime},
    figures,
    reporter::StatusReporter,
    source::DrawSource,
    stats,
};

pub const ACCELERATED_CATALOG: &[&str] = &["micropip", "numpy", "pandas"];
pub const PURE_SCRIPT_CATALOG: &[&str] = &["plotly", "vizro"];
/// Package that enables the rich document export.
pub const EXPORT_PACKAGE: &str = "vizro";
const PLOTTING_PACKAGE: &str = "plotly";

pub struct NativeRuntime {
    source: Arc<dyn DrawSource>,
    rich_export: bool,
}

impl NativeRuntime {
    pub fn new(source: Arc<dyn DrawSource>, rich_export: bool) -> Self {
        Self {
            source,
            rich_export,
        }
    }
}

#[async_trait]
impl ScriptRuntime for NativeRuntime {
    async fn bootstrap(
        &self,
        index_location: &Url,
        reporter: &StatusReporter,
    ) -> Result<Box<dyn Environment>> {
        match index_location.scheme() {
            "http" | "https" | "file" => {}
            other => bail!("unsupported environment index scheme '{other}'"),
        }
        reporter.log(
            LogLevel::Debug,
            "native runtime selected",
            Some(json!({ "rich_export": self.rich_export })),
        );
        Ok(Box::new(NativeEnvironment {
            source: self.source.clone(),
            rich_export: self.rich_export,
            packages: BTreeSet::new(),
        }))
    }
}

pub struct NativeEnvironment {
    source: Arc<dyn DrawSource>,
    rich_export: bool,
    packages: BTreeSet<String>,
}

impl NativeEnvironment {
    pub fn has_package(&self, name: &str) -> bool {
        self.packages.contains(name)
    }
}

#[async_trait]
impl Environment for NativeEnvironment {
    async fn load_accelerated(&mut self, package: &str) -> Result<()> {
        if !ACCELERATED_CATALOG.contains(&package) {
            bail!("no precompiled build of '{package}'");
        }
        self.packages.insert(package.to_string());
        Ok(())
    }

    async fn install_pure(&mut self, package: &str) -> Result<()> {
        if !PURE_SCRIPT_CATALOG.contains(&package) {
            bail!("'{package}' not found in package index");
        }
        if package == EXPORT_PACKAGE && !self.rich_export {
            bail!("dashboard export is disabled for this runtime");
        }
        self.packages.insert(package.to_string());
        Ok(())
    }

    async fn build(
        &mut self,
        dataset: &str,
        reporter: &StatusReporter,
    ) -> Result<BuildResultPayload> {
        if !self.has_package(PLOTTING_PACKAGE) {
            bail!("'{PLOTTING_PACKAGE}' is not installed; cannot build figures");
        }

        reporter.log(LogLevel::Info, "fetch begin", Some(json!({ "dataset": dataset })));
        let rows = self
            .source
            .fetch(dataset)
            .await
            .with_context(|| format!("fetch failed for dataset {dataset}"))?;
        reporter.log(LogLevel::Info, "fetch ok", Some(json!({ "rows": rows.len() })));

        let mut draws = Vec::with_capacity(rows.len());
        let mut skipped = 0usize;
        for row in &rows {
            match stats::parse_draw(row) {
                Ok(draw) => draws.push(draw),
                Err(err) => {
                    skipped += 1;
                    reporter.log(
                        LogLevel::Warning,
                        "skipping unreadable draw",
                        Some(json!({ "row": row, "error": err.to_string() })),
                    );
                }
            }
        }
        reporter.log(
            LogLevel::Info,
            "parse numbers done",
            Some(json!({
                "white_rows": draws.len() * stats::WHITE_BALLS,
                "skipped": skipped,
            })),
        );

        let Some(summary) = stats::summarize(&draws) else {
            bail!("dataset {dataset} has no readable draws");
        };
        let figures = figures::build_figures(&summary);

        if self.has_package(EXPORT_PACKAGE) {
            reporter.log(LogLevel::Info, "rich export", None);
            let html = figures::render_document("Powerball Explorer", &figures);
            return Ok(BuildResultPayload::rich(html));
        }

        reporter.log(
            LogLevel::Info,
            "dashboard export unavailable -> fallback figures",
            None,
        );
        Ok(BuildResultPayload::figures(figures::keyed_by_name(figures)))
    }
}

#[cfg(test)]
#[path = "tests/native_tests.rs"]
mod tests;
