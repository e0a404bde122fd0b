use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::json;

use super::*;

fn temp_out_dir(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    std::env::temp_dir().join(format!("dashboard-surfaces-{tag}-{nanos}"))
}

fn figure() -> FigureSpec {
    FigureSpec {
        data: vec![json!({ "type": "bar", "x": [1, 2], "y": [3, 4] })],
        layout: Some(json!({ "title": "t" })),
    }
}

#[tokio::test]
async fn plot_writes_chart_json_under_charts_dir() {
    let out = temp_out_dir("plot");
    let surfaces = FsSurfaces::new(out.clone(), BTreeSet::from([ChartName::Dow]));

    surfaces.plot(ChartName::Dow, &figure()).await.expect("plot");

    let written = std::fs::read_to_string(surfaces.chart_path(ChartName::Dow)).expect("chart file");
    let parsed: FigureSpec = serde_json::from_str(&written).expect("figure json");
    assert_eq!(parsed, figure());
    let _ = std::fs::remove_dir_all(&out);
}

#[tokio::test]
async fn has_target_follows_configured_set() {
    let surfaces = FsSurfaces::new(temp_out_dir("targets"), BTreeSet::from([ChartName::Overdue]));
    assert!(surfaces.has_target(ChartName::Overdue));
    assert!(!surfaces.has_target(ChartName::PairsHeatmap));
}

#[tokio::test]
async fn embed_writes_document_and_hide_fallback_clears_charts() {
    let out = temp_out_dir("embed");
    let surfaces = FsSurfaces::new(out.clone(), BTreeSet::from([ChartName::WhiteHist]));
    surfaces.plot(ChartName::WhiteHist, &figure()).await.expect("plot");

    surfaces.embed("<html>rich</html>").await.expect("embed");
    surfaces.hide_fallback().await.expect("hide");

    let document = std::fs::read_to_string(surfaces.document_path()).expect("document");
    assert_eq!(document, "<html>rich</html>");
    assert!(!surfaces.charts_dir().exists());
    let _ = std::fs::remove_dir_all(&out);
}

#[tokio::test]
async fn hide_fallback_without_charts_is_fine() {
    let surfaces = FsSurfaces::new(temp_out_dir("empty"), BTreeSet::new());
    surfaces.hide_fallback().await.expect("hide");
}
