use super::*;

use shared::protocol::{StatusEvent, WorkerMessage};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use worker_channel::BoundaryEvent;

use crate::source::{RawDraw, StaticSource};

fn rows() -> Vec<RawDraw> {
    vec![
        RawDraw {
            draw_date: "2024-01-01T00:00:00.000".into(),
            winning_numbers: "03 14 15 26 65 09".into(),
            multiplier: Some("2".into()),
        },
        RawDraw {
            draw_date: "2024-01-03T00:00:00.000".into(),
            winning_numbers: "03 07 15 33 68 21".into(),
            multiplier: Some("3".into()),
        },
        RawDraw {
            draw_date: "2024-01-06T00:00:00.000".into(),
            winning_numbers: "bad row".into(),
            multiplier: None,
        },
    ]
}

fn reporter() -> (StatusReporter, UnboundedReceiver<BoundaryEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (StatusReporter::new(tx), rx)
}

fn events(rx: &mut UnboundedReceiver<BoundaryEvent>) -> Vec<StatusEvent> {
    let mut events = Vec::new();
    while let Ok(BoundaryEvent::Frame(frame)) = rx.try_recv() {
        if let WorkerMessage::Status(event) = serde_json::from_str(&frame).expect("frame") {
            events.push(event);
        }
    }
    events
}

async fn environment(rich_export: bool, rows: Vec<RawDraw>) -> Box<dyn Environment> {
    let runtime = NativeRuntime::new(Arc::new(StaticSource::new(rows)), rich_export);
    let (reporter, _rx) = reporter();
    let index = Url::parse("https://cdn.example/full/").expect("url");
    runtime.bootstrap(&index, &reporter).await.expect("bootstrap")
}

#[tokio::test]
async fn bootstrap_rejects_unsupported_scheme() {
    let runtime = NativeRuntime::new(Arc::new(StaticSource::new(vec![])), false);
    let (reporter, _rx) = reporter();
    let index = Url::parse("ftp://mirror.example/full/").expect("url");

    let err = runtime
        .bootstrap(&index, &reporter)
        .await
        .err()
        .expect("unsupported scheme");
    assert!(err.to_string().contains("ftp"));
}

#[tokio::test]
async fn catalog_decides_which_packages_install() {
    let mut env = environment(false, rows()).await;

    env.load_accelerated("numpy").await.expect("numpy");
    assert!(env.load_accelerated("scipy").await.is_err());
    env.install_pure("plotly").await.expect("plotly");
    assert!(env.install_pure("left-pad").await.is_err());

    let err = env.install_pure(EXPORT_PACKAGE).await.expect_err("export disabled");
    assert!(err.to_string().contains("export is disabled"));

    let mut rich = environment(true, rows()).await;
    rich.install_pure(EXPORT_PACKAGE).await.expect("export enabled");
}

#[tokio::test]
async fn build_requires_plotting_package() {
    let mut env = environment(false, rows()).await;
    let (reporter, _rx) = reporter();

    let err = env.build("d6yy-54nr", &reporter).await.expect_err("no plotly");
    assert!(err.to_string().contains("plotly"));
}

#[tokio::test]
async fn fallback_build_returns_all_figures_and_reports_skipped_rows() {
    let mut env = environment(false, rows()).await;
    env.install_pure("plotly").await.expect("plotly");
    let (reporter, mut rx) = reporter();

    let payload = env.build("d6yy-54nr", &reporter).await.expect("build");

    assert_eq!(payload.engine.as_deref(), Some("plotly"));
    assert!(payload.html.is_none());
    let figures = payload.figures.expect("figures");
    for chart in shared::domain::ChartName::ALL {
        assert!(figures.contains_key(chart.as_str()), "missing {chart}");
    }

    let events = events(&mut rx);
    let messages: Vec<&str> = events.iter().map(|event| event.message.as_str()).collect();
    assert_eq!(messages[0], "fetch begin");
    assert_eq!(messages[1], "fetch ok");
    assert!(events.iter().any(|event| {
        event.level == Some(LogLevel::Warning) && event.message == "skipping unreadable draw"
    }));
    let parsed = events
        .iter()
        .find(|event| event.message == "parse numbers done")
        .expect("parse summary");
    assert_eq!(
        parsed.extra,
        Some(json!({"white_rows": 10, "skipped": 1}))
    );
}

#[tokio::test]
async fn export_package_switches_to_rich_document() {
    let mut env = environment(true, rows()).await;
    env.install_pure("plotly").await.expect("plotly");
    env.install_pure(EXPORT_PACKAGE).await.expect("vizro");
    let (reporter, _rx) = reporter();

    let payload = env.build("d6yy-54nr", &reporter).await.expect("build");

    assert_eq!(payload.engine.as_deref(), Some("vizro"));
    assert!(payload.figures.is_none());
    assert!(payload
        .html
        .as_deref()
        .is_some_and(|html| html.contains("Plotly.newPlot(\"pairs_heatmap\"")));
}

#[tokio::test]
async fn dataset_without_readable_draws_fails() {
    let bad = vec![RawDraw {
        draw_date: "never".into(),
        winning_numbers: "1 2 3 4 5 6".into(),
        multiplier: None,
    }];
    let mut env = environment(false, bad).await;
    env.install_pure("plotly").await.expect("plotly");
    let (reporter, _rx) = reporter();

    let err = env.build("d6yy-54nr", &reporter).await.expect_err("no draws");
    assert!(err.to_string().contains("no readable draws"));
}
