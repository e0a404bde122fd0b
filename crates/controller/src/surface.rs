//! Render surfaces the controller hands results to.

use anyhow::Result;
use async_trait::async_trait;
use shared::{domain::ChartName, protocol::FigureSpec};

/// Region that embeds a self-contained rich document.
#[async_trait]
pub trait DocumentSurface: Send + Sync {
    async fn embed(&self, content: &str) -> Result<()>;
    /// Hide the fallback chart area once the rich document is shown.
    async fn hide_fallback(&self) -> Result<()>;
}

/// Charting surface with one named target per chart.
#[async_trait]
pub trait ChartSurface: Send + Sync {
    fn has_target(&self, chart: ChartName) -> bool;
    async fn plot(&self, chart: ChartName, figure: &FigureSpec) -> Result<()>;
}
