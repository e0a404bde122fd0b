//! Chart figures for the draw summary, plus the rich HTML export.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{json, Value};
use shared::{domain::ChartName, protocol::FigureSpec};

use crate::stats::DrawSummary;

const PLOTLY_BUNDLE: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

fn layout(title: &str, x_title: &str, y_title: &str) -> Value {
    json!({
        "title": { "text": title },
        "xaxis": { "title": { "text": x_title } },
        "yaxis": { "title": { "text": y_title } },
    })
}

fn histogram(values: &[u8], bins: u32, name: &str, title: &str) -> FigureSpec {
    FigureSpec {
        data: vec![json!({
            "type": "histogram",
            "name": name,
            "x": values,
            "nbinsx": bins,
        })],
        layout: Some(layout(title, name, "count")),
    }
}

pub fn build_figures(summary: &DrawSummary) -> BTreeMap<ChartName, FigureSpec> {
    let mut figures = BTreeMap::new();

    figures.insert(
        ChartName::WhiteHist,
        histogram(&summary.white_balls, 69, "white_ball", "White-ball Frequency (1–69)"),
    );
    figures.insert(
        ChartName::PbHist,
        histogram(&summary.powerballs, 26, "powerball", "Powerball Frequency (1–26)"),
    );

    let (balls, days): (Vec<u8>, Vec<i64>) = summary.overdue.iter().copied().unzip();
    figures.insert(
        ChartName::Overdue,
        FigureSpec {
            data: vec![json!({ "type": "bar", "x": balls, "y": days, "name": "days" })],
            layout: Some(json!({
                "title": { "text": format!("Overdue (days) as of {}", summary.latest.date_naive()) },
                "xaxis": { "title": { "text": "white_ball" }, "type": "category" },
                "yaxis": { "title": { "text": "days" } },
            })),
        },
    );

    figures.insert(ChartName::PpYear, power_play_figure(summary));

    let (days_of_week, counts): (Vec<&str>, Vec<u64>) = summary
        .day_of_week
        .iter()
        .map(|(day, count)| (day.as_str(), *count))
        .unzip();
    figures.insert(
        ChartName::Dow,
        FigureSpec {
            data: vec![json!({ "type": "bar", "x": days_of_week, "y": counts })],
            layout: Some(layout("Draws by Day of Week", "dow", "count")),
        },
    );

    figures.insert(ChartName::PairsHeatmap, pairs_heatmap(summary));

    let dates: Vec<String> = summary
        .trend
        .iter()
        .map(|point| point.date.to_rfc3339())
        .collect();
    let sums: Vec<u32> = summary.trend.iter().map(|point| point.sum).collect();
    let spreads: Vec<u8> = summary.trend.iter().map(|point| point.spread).collect();
    figures.insert(
        ChartName::SumSpread,
        FigureSpec {
            data: vec![
                json!({ "type": "scatter", "mode": "lines", "name": "sum(whites)", "x": dates, "y": sums }),
                json!({ "type": "scatter", "mode": "lines", "name": "spread(max-min)", "x": dates, "y": spreads }),
            ],
            layout: Some(json!({ "title": { "text": "Sum & Spread over Time" } })),
        },
    );

    figures
}

/// One stacked bar trace per multiplier value.
fn power_play_figure(summary: &DrawSummary) -> FigureSpec {
    let mut by_multiplier: BTreeMap<u8, (Vec<i32>, Vec<u64>)> = BTreeMap::new();
    for ((year, multiplier), count) in &summary.power_play_by_year {
        let (years, counts) = by_multiplier.entry(*multiplier).or_default();
        years.push(*year);
        counts.push(*count);
    }

    let data = by_multiplier
        .into_iter()
        .map(|(multiplier, (years, counts))| {
            json!({
                "type": "bar",
                "name": multiplier.to_string(),
                "x": years,
                "y": counts,
            })
        })
        .collect();

    let mut layout = layout("Power Play usage by year", "year", "count");
    layout["barmode"] = json!("stack");
    layout["legend"] = json!({ "title": { "text": "multiplier" } });
    FigureSpec {
        data,
        layout: Some(layout),
    }
}

/// Pivot of the top pairs: rows are the low ball, columns the high ball,
/// absent pairs read as zero.
fn pairs_heatmap(summary: &DrawSummary) -> FigureSpec {
    let rows: Vec<u8> = summary
        .top_pairs
        .iter()
        .map(|(low, _, _)| *low)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let columns: Vec<u8> = summary
        .top_pairs
        .iter()
        .map(|(_, high, _)| *high)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut z = vec![vec![0u64; columns.len()]; rows.len()];
    for (low, high, count) in &summary.top_pairs {
        if let (Ok(row), Ok(column)) = (rows.binary_search(low), columns.binary_search(high)) {
            z[row][column] = *count;
        }
    }

    FigureSpec {
        data: vec![json!({
            "type": "heatmap",
            "z": z,
            "x": columns,
            "y": rows,
            "colorbar": { "title": { "text": "count" } },
        })],
        layout: Some(json!({ "title": { "text": "Top Pair Combinations (counts)" } })),
    }
}

/// Figures keyed by chart name, as the fallback payload carries them.
pub fn keyed_by_name(figures: BTreeMap<ChartName, FigureSpec>) -> BTreeMap<String, FigureSpec> {
    figures
        .into_iter()
        .map(|(chart, figure)| (chart.as_str().to_string(), figure))
        .collect()
}

/// Single HTML page carrying every figure's data inline. The plotting
/// library itself is loaded from `PLOTLY_BUNDLE` on the CDN, so the page only
/// draws its charts when that URL is reachable.
pub fn render_document(title: &str, figures: &BTreeMap<ChartName, FigureSpec>) -> String {
    let mut body = String::new();
    let mut script = String::new();
    for (chart, figure) in figures {
        body.push_str(&format!(
            "<section class=\"chart\"><div id=\"{chart}\"></div></section>\n"
        ));
        let data = script_json(&json!(figure.data));
        let layout = script_json(figure.layout.as_ref().unwrap_or(&json!({})));
        script.push_str(&format!("Plotly.newPlot(\"{chart}\", {data}, {layout});\n"));
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n\
         <script src=\"{PLOTLY_BUNDLE}\"></script>\n</head>\n<body>\n<h1>{title}</h1>\n{body}\
         <script>\n{script}</script>\n</body>\n</html>\n",
        title = escape_html(title),
    )
}

fn script_json(value: &Value) -> String {
    value.to_string().replace("</", "<\\/")
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
#[path = "tests/figures_tests.rs"]
mod tests;
