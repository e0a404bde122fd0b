//! Boot sequence for the dashboard: initialize the worker environment, build
//! the dashboard, then hand the result to the matching render path.

use std::{collections::BTreeMap, sync::Arc};

use serde_json::json;
use shared::{
    domain::{ChartName, LogLevel},
    error::ProtocolError,
    protocol::{BuildOutcome, BuildPayload, FigureSpec, InitPayload},
};
use thiserror::Error;
use tracing::{info, warn};
use worker_channel::{CallError, StatusSink, WorkerChannel};

pub mod surface;

pub use surface::{ChartSurface, DocumentSurface};

pub const NO_PAYLOAD_STATUS: &str = "Nothing to render: the build returned no dashboard payload";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootPlan {
    pub init: InitPayload,
    pub dataset: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootStage {
    Init,
    Build,
    Render,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootState {
    Idle,
    Initializing,
    Building,
    RenderedRich,
    RenderedFallback {
        rendered: Vec<ChartName>,
        skipped: Vec<ChartName>,
    },
    NoPayload,
    Failed {
        stage: BootStage,
        message: String,
    },
}

impl BootState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BootState::RenderedRich
                | BootState::RenderedFallback { .. }
                | BootState::NoPayload
                | BootState::Failed { .. }
        )
    }

    fn label(&self) -> &'static str {
        match self {
            BootState::Idle => "idle",
            BootState::Initializing => "initializing",
            BootState::Building => "building",
            BootState::RenderedRich => "rendered_rich",
            BootState::RenderedFallback { .. } => "rendered_fallback",
            BootState::NoPayload => "no_payload",
            BootState::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("initialization failed: {0}")]
    Init(CallError),
    #[error("build failed: {0}")]
    Build(CallError),
    #[error("build failed: {0}")]
    Outcome(#[from] ProtocolError),
    #[error("rendering failed: {0}")]
    Render(anyhow::Error),
}

impl ControllerError {
    fn stage(&self) -> BootStage {
        match self {
            ControllerError::Init(_) => BootStage::Init,
            ControllerError::Build(_) | ControllerError::Outcome(_) => BootStage::Build,
            ControllerError::Render(_) => BootStage::Render,
        }
    }
}

pub struct Controller {
    channel: WorkerChannel,
    plan: BootPlan,
    document: Arc<dyn DocumentSurface>,
    charts: Arc<dyn ChartSurface>,
    sink: Arc<dyn StatusSink>,
    state: BootState,
}

impl Controller {
    pub fn new(
        channel: WorkerChannel,
        plan: BootPlan,
        document: Arc<dyn DocumentSurface>,
        charts: Arc<dyn ChartSurface>,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            channel,
            plan,
            document,
            charts,
            sink,
            state: BootState::Idle,
        }
    }

    pub fn state(&self) -> &BootState {
        &self.state
    }

    pub fn channel(&self) -> &WorkerChannel {
        &self.channel
    }

    /// Runs the whole boot sequence once. Later calls return the state
    /// reached by the first run without issuing any request.
    pub async fn run(&mut self) -> &BootState {
        if self.state != BootState::Idle {
            warn!(state = self.state.label(), "boot sequence already ran");
            return &self.state;
        }

        if let Err(err) = self.boot().await {
            self.fail(err);
        }
        &self.state
    }

    async fn boot(&mut self) -> Result<(), ControllerError> {
        self.transition(BootState::Initializing);
        self.sink.set_status("Initializing environment...");
        let ack = self
            .channel
            .init(self.plan.init.clone())
            .await
            .map_err(ControllerError::Init)?;
        if !ack.ok {
            return Err(ControllerError::Init(CallError::Remote(
                "worker did not acknowledge initialization".to_string(),
            )));
        }
        let failed: Vec<&str> = ack
            .failed_packages()
            .map(|outcome| outcome.name.as_str())
            .collect();
        self.sink.log(
            LogLevel::Info,
            "environment ready",
            Some(json!({
                "packages": ack.packages.len(),
                "failed": failed,
            })),
        );

        self.transition(BootState::Building);
        self.sink.set_status("Building dashboard...");
        let payload = self
            .channel
            .build(BuildPayload {
                dataset: self.plan.dataset.clone(),
            })
            .await
            .map_err(ControllerError::Build)?;
        let outcome = BuildOutcome::from_payload(payload)?;
        self.dispatch(outcome).await
    }

    /// Maps a build outcome to its render path. The rich export is checked
    /// before the figure set.
    pub async fn dispatch(&mut self, outcome: BuildOutcome) -> Result<(), ControllerError> {
        info!(outcome = outcome.kind(), "dispatching build outcome");
        match outcome {
            BuildOutcome::RichExport { content } => {
                self.document
                    .embed(&content)
                    .await
                    .map_err(ControllerError::Render)?;
                self.document
                    .hide_fallback()
                    .await
                    .map_err(ControllerError::Render)?;
                self.transition(BootState::RenderedRich);
                self.sink.set_status("Dashboard ready");
            }
            BuildOutcome::FigureSet { figures } => {
                let (rendered, skipped) = self.render_figures(&figures).await;
                self.sink.set_status(&format!(
                    "Rendered {} of {} charts",
                    rendered.len(),
                    ChartName::ALL.len()
                ));
                self.transition(BootState::RenderedFallback { rendered, skipped });
            }
            BuildOutcome::Empty => {
                self.sink.set_status(NO_PAYLOAD_STATUS);
                self.transition(BootState::NoPayload);
            }
        }
        Ok(())
    }

    /// Charts go out one at a time; a chart that cannot be drawn is logged
    /// and skipped.
    async fn render_figures(
        &self,
        figures: &BTreeMap<String, FigureSpec>,
    ) -> (Vec<ChartName>, Vec<ChartName>) {
        for key in figures.keys() {
            if ChartName::parse(key).is_none() {
                self.sink.log(
                    LogLevel::Debug,
                    "ignoring unrecognized figure",
                    Some(json!({ "figure": key })),
                );
            }
        }

        let mut rendered = Vec::new();
        let mut skipped = Vec::new();
        for chart in ChartName::ALL {
            let Some(figure) = figures.get(chart.as_str()) else {
                self.skip(chart, "figure missing from build result", None);
                skipped.push(chart);
                continue;
            };
            if !self.charts.has_target(chart) {
                self.skip(chart, "render target missing; skipping chart", None);
                skipped.push(chart);
                continue;
            }
            match self.charts.plot(chart, figure).await {
                Ok(()) => {
                    self.sink.log(
                        LogLevel::Debug,
                        "chart rendered",
                        Some(json!({ "chart": chart.as_str() })),
                    );
                    rendered.push(chart);
                }
                Err(err) => {
                    self.skip(chart, "chart render failed", Some(format!("{err:#}")));
                    skipped.push(chart);
                }
            }
        }
        (rendered, skipped)
    }

    fn skip(&self, chart: ChartName, reason: &str, error: Option<String>) {
        warn!(chart = chart.as_str(), error = error.as_deref(), "{reason}");
        let mut extra = json!({ "chart": chart.as_str() });
        if let Some(error) = error {
            extra["error"] = json!(error);
        }
        self.sink.log(LogLevel::Warning, reason, Some(extra));
    }

    fn fail(&mut self, err: ControllerError) {
        let message = err.to_string();
        let stage = err.stage();
        self.sink.set_status(&message);
        self.sink.log(
            LogLevel::Error,
            &message,
            Some(json!({ "stage": format!("{stage:?}").to_ascii_lowercase() })),
        );
        self.transition(BootState::Failed { stage, message });
    }

    fn transition(&mut self, next: BootState) {
        info!(from = self.state.label(), to = next.label(), "boot state");
        self.state = next;
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
