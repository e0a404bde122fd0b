use super::*;

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use serde_json::Value;
use shared::protocol::{CallResult, ControllerMessage, WorkerMessage};
use worker_channel::{boundary, BoundaryEvent, StatusLog, WorkerPort};

#[derive(Default)]
struct RecordingSurface {
    embedded: Mutex<Vec<String>>,
    fallback_hidden: AtomicBool,
    plotted: Mutex<Vec<ChartName>>,
    missing_targets: HashSet<ChartName>,
    failing: HashSet<ChartName>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingSurface {
    fn plotted(&self) -> Vec<ChartName> {
        self.plotted.lock().expect("plotted").clone()
    }

    fn embedded(&self) -> Vec<String> {
        self.embedded.lock().expect("embedded").clone()
    }
}

#[async_trait]
impl DocumentSurface for RecordingSurface {
    async fn embed(&self, content: &str) -> anyhow::Result<()> {
        self.embedded.lock().expect("embedded").push(content.to_string());
        Ok(())
    }

    async fn hide_fallback(&self) -> anyhow::Result<()> {
        self.fallback_hidden.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl ChartSurface for RecordingSurface {
    fn has_target(&self, chart: ChartName) -> bool {
        !self.missing_targets.contains(&chart)
    }

    async fn plot(&self, chart: ChartName, _figure: &FigureSpec) -> anyhow::Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&chart) {
            anyhow::bail!("plotting library rejected {chart}");
        }
        self.plotted.lock().expect("plotted").push(chart);
        Ok(())
    }
}

fn plan() -> BootPlan {
    BootPlan {
        init: InitPayload {
            environment_index_location: "https://cdn.example/full/".into(),
            accelerated_packages: vec!["numpy".into()],
            pure_script_packages: vec![],
        },
        dataset: "d6yy-54nr".into(),
    }
}

fn controller_with(surface: Arc<RecordingSurface>) -> (Controller, WorkerPort, Arc<StatusLog>) {
    let (controller_port, worker_port) = boundary();
    let log = Arc::new(StatusLog::default());
    let channel = WorkerChannel::spawn(controller_port, log.clone());
    let controller = Controller::new(channel, plan(), surface.clone(), surface, log.clone());
    (controller, worker_port, log)
}

fn figure() -> FigureSpec {
    FigureSpec {
        data: vec![json!({"type": "bar"})],
        layout: Some(json!({})),
    }
}

fn all_figures() -> BTreeMap<String, FigureSpec> {
    ChartName::ALL
        .into_iter()
        .map(|chart| (chart.as_str().to_string(), figure()))
        .collect()
}

/// Answers every request with `respond` and counts requests by kind.
fn spawn_worker(
    mut port: WorkerPort,
    respond: impl Fn(&ControllerMessage) -> CallResult + Send + 'static,
) -> Arc<Mutex<Vec<&'static str>>> {
    let kinds = Arc::new(Mutex::new(Vec::new()));
    let seen = kinds.clone();
    tokio::spawn(async move {
        while let Some(frame) = port.inbound.recv().await {
            let request: ControllerMessage = serde_json::from_str(&frame).expect("request");
            seen.lock().expect("kinds").push(request.kind());
            let reply = WorkerMessage::Result(respond(&request));
            let frame = serde_json::to_string(&reply).expect("encode");
            if port.outbound.send(BoundaryEvent::Frame(frame)).is_err() {
                break;
            }
        }
    });
    kinds
}

#[tokio::test]
async fn rich_export_skips_chart_renderer() {
    let surface = Arc::new(RecordingSurface::default());
    let (mut controller, _port, log) = controller_with(surface.clone());

    let outcome = BuildOutcome::from_payload(json!({
        "html": "<main>dash</main>",
        "figures": {"dow": {"data": []}}
    }))
    .expect("outcome");
    controller.dispatch(outcome).await.expect("dispatch");

    assert_eq!(controller.state(), &BootState::RenderedRich);
    assert_eq!(surface.embedded(), vec!["<main>dash</main>".to_string()]);
    assert!(surface.fallback_hidden.load(Ordering::SeqCst));
    assert!(surface.plotted().is_empty());
    assert_eq!(log.headline(), "Dashboard ready");
}

#[tokio::test]
async fn missing_target_skips_only_that_chart() {
    let surface = Arc::new(RecordingSurface {
        missing_targets: HashSet::from([ChartName::Overdue]),
        ..Default::default()
    });
    let (mut controller, _port, log) = controller_with(surface.clone());

    controller
        .dispatch(BuildOutcome::FigureSet {
            figures: all_figures(),
        })
        .await
        .expect("dispatch");

    let plotted = surface.plotted();
    assert_eq!(plotted.len(), 6);
    assert!(!plotted.contains(&ChartName::Overdue));
    assert_eq!(
        controller.state(),
        &BootState::RenderedFallback {
            rendered: plotted,
            skipped: vec![ChartName::Overdue],
        }
    );
    assert!(log.entries().iter().any(|entry| {
        entry.level == LogLevel::Warning
            && entry.extra.as_ref().and_then(|extra| extra["chart"].as_str()) == Some("overdue")
    }));
}

#[tokio::test]
async fn plot_failure_and_absent_figure_do_not_abort_remaining_charts() {
    let surface = Arc::new(RecordingSurface {
        failing: HashSet::from([ChartName::WhiteHist]),
        ..Default::default()
    });
    let (mut controller, _port, _log) = controller_with(surface.clone());

    let mut figures = all_figures();
    figures.remove(ChartName::SumSpread.as_str());
    figures.insert("extra_chart".into(), figure());

    controller
        .dispatch(BuildOutcome::FigureSet { figures })
        .await
        .expect("dispatch");

    let BootState::RenderedFallback { rendered, skipped } = controller.state() else {
        panic!("expected fallback render, got {:?}", controller.state());
    };
    assert_eq!(rendered.len(), 5);
    assert_eq!(skipped, &vec![ChartName::WhiteHist, ChartName::SumSpread]);
}

#[tokio::test]
async fn charts_render_one_at_a_time_in_fixed_order() {
    let surface = Arc::new(RecordingSurface::default());
    let (mut controller, _port, _log) = controller_with(surface.clone());

    controller
        .dispatch(BuildOutcome::FigureSet {
            figures: all_figures(),
        })
        .await
        .expect("dispatch");

    assert_eq!(surface.plotted(), ChartName::ALL.to_vec());
    assert_eq!(surface.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_outcome_reports_no_payload_without_rendering() {
    let surface = Arc::new(RecordingSurface::default());
    let (mut controller, _port, log) = controller_with(surface.clone());

    controller
        .dispatch(BuildOutcome::Empty)
        .await
        .expect("dispatch");

    assert_eq!(controller.state(), &BootState::NoPayload);
    assert_eq!(log.headline(), NO_PAYLOAD_STATUS);
    assert!(surface.embedded().is_empty());
    assert!(surface.plotted().is_empty());
}

#[tokio::test]
async fn unacknowledged_init_fails_before_build() {
    let surface = Arc::new(RecordingSurface::default());
    let (mut controller, port, _log) = controller_with(surface);
    let kinds = spawn_worker(port, |request| {
        CallResult::ok(request.id(), json!({"ok": false}))
    });

    let state = controller.run().await.clone();

    assert!(matches!(
        state,
        BootState::Failed {
            stage: BootStage::Init,
            ..
        }
    ));
    assert_eq!(*kinds.lock().expect("kinds"), vec!["init"]);
}

#[tokio::test]
async fn malformed_build_payload_fails_the_build_stage() {
    let surface = Arc::new(RecordingSurface::default());
    let (mut controller, port, _log) = controller_with(surface);
    spawn_worker(port, |request| match request {
        ControllerMessage::Init { id, .. } => CallResult::ok(*id, json!({"ok": true})),
        ControllerMessage::Build { id, .. } => CallResult::ok(*id, json!({"html": ["nope"]})),
    });

    let state = controller.run().await.clone();
    let BootState::Failed { stage, message } = state else {
        panic!("expected failure");
    };
    assert_eq!(stage, BootStage::Build);
    assert!(message.starts_with("build failed"));
}

#[tokio::test]
async fn second_run_issues_no_further_calls() {
    let surface = Arc::new(RecordingSurface::default());
    let (mut controller, port, _log) = controller_with(surface);
    let kinds = spawn_worker(port, |request| match request {
        ControllerMessage::Init { id, .. } => CallResult::ok(*id, json!({"ok": true})),
        ControllerMessage::Build { id, .. } => CallResult::ok(*id, Value::Null),
    });

    assert_eq!(controller.run().await, &BootState::NoPayload);
    assert_eq!(controller.run().await, &BootState::NoPayload);
    assert_eq!(*kinds.lock().expect("kinds"), vec!["init", "build"]);
}
