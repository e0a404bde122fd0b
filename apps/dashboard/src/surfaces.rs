//! File-system render surfaces: the rich document lands in `index.html`,
//! fallback charts in `charts/<target>.json`.

use std::{collections::BTreeSet, path::PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use controller::{ChartSurface, DocumentSurface};
use shared::{domain::ChartName, protocol::FigureSpec};

pub struct FsSurfaces {
    out_dir: PathBuf,
    targets: BTreeSet<ChartName>,
}

impl FsSurfaces {
    pub fn new(out_dir: PathBuf, targets: BTreeSet<ChartName>) -> Self {
        Self { out_dir, targets }
    }

    pub fn document_path(&self) -> PathBuf {
        self.out_dir.join("index.html")
    }

    pub fn charts_dir(&self) -> PathBuf {
        self.out_dir.join("charts")
    }

    pub fn chart_path(&self, chart: ChartName) -> PathBuf {
        self.charts_dir().join(format!("{chart}.json"))
    }
}

#[async_trait]
impl DocumentSurface for FsSurfaces {
    async fn embed(&self, content: &str) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.out_dir)
            .await
            .with_context(|| format!("failed to create '{}'", self.out_dir.display()))?;
        let path = self.document_path();
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("failed to write '{}'", path.display()))?;
        tracing::info!(path = %path.display(), "rich document written");
        Ok(())
    }

    async fn hide_fallback(&self) -> anyhow::Result<()> {
        let charts_dir = self.charts_dir();
        if tokio::fs::try_exists(&charts_dir).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(&charts_dir)
                .await
                .with_context(|| format!("failed to clear '{}'", charts_dir.display()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl ChartSurface for FsSurfaces {
    fn has_target(&self, chart: ChartName) -> bool {
        self.targets.contains(&chart)
    }

    async fn plot(&self, chart: ChartName, figure: &FigureSpec) -> anyhow::Result<()> {
        let charts_dir = self.charts_dir();
        tokio::fs::create_dir_all(&charts_dir)
            .await
            .with_context(|| format!("failed to create '{}'", charts_dir.display()))?;
        let body = serde_json::to_vec_pretty(figure)?;
        let path = self.chart_path(chart);
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("failed to write '{}'", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/surfaces_tests.rs"]
mod tests;
