//! Descriptive statistics over the draw history.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

use crate::source::RawDraw;

pub const WHITE_BALLS: usize = 5;
pub const TOP_PAIRS: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draw {
    pub date: DateTime<Utc>,
    pub whites: [u8; WHITE_BALLS],
    pub powerball: u8,
    pub multiplier: Option<u8>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseDrawError {
    #[error("unrecognized draw date '{0}'")]
    Date(String),
    #[error("expected 6 numbers in '{0}'")]
    NumberCount(String),
    #[error("invalid number '{0}'")]
    Number(String),
}

pub fn parse_draw(raw: &RawDraw) -> Result<Draw, ParseDrawError> {
    let date = parse_date(&raw.draw_date)?;

    let numbers = raw
        .winning_numbers
        .split_whitespace()
        .map(|part| {
            part.parse::<u8>()
                .map_err(|_| ParseDrawError::Number(part.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let [a, b, c, d, e, powerball] = numbers[..] else {
        return Err(ParseDrawError::NumberCount(raw.winning_numbers.clone()));
    };

    let multiplier = raw
        .multiplier
        .as_deref()
        .and_then(|value| value.trim().parse::<u8>().ok());

    Ok(Draw {
        date,
        whites: [a, b, c, d, e],
        powerball,
        multiplier,
    })
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>, ParseDrawError> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    // SODA floating timestamps carry no offset; they are read as UTC.
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ParseDrawError::Date(raw.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendPoint {
    pub date: DateTime<Utc>,
    pub sum: u32,
    pub spread: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawSummary {
    pub latest: DateTime<Utc>,
    pub white_balls: Vec<u8>,
    pub powerballs: Vec<u8>,
    /// Days since each white ball last appeared, most overdue first.
    pub overdue: Vec<(u8, i64)>,
    /// Draw counts keyed by (year, multiplier); draws without a multiplier are left out.
    pub power_play_by_year: BTreeMap<(i32, u8), u64>,
    /// Draw counts keyed by weekday name, in name order.
    pub day_of_week: BTreeMap<String, u64>,
    /// Most frequent white-ball pairs `(low, high, count)`, most frequent first.
    pub top_pairs: Vec<(u8, u8, u64)>,
    pub trend: Vec<TrendPoint>,
}

/// Returns `None` when there are no draws to summarize.
pub fn summarize(draws: &[Draw]) -> Option<DrawSummary> {
    let latest = draws.iter().map(|draw| draw.date).max()?;

    let mut white_balls = Vec::with_capacity(draws.len() * WHITE_BALLS);
    let mut last_seen: BTreeMap<u8, DateTime<Utc>> = BTreeMap::new();
    let mut power_play_by_year = BTreeMap::new();
    let mut day_of_week = BTreeMap::new();
    let mut pair_counts: BTreeMap<(u8, u8), u64> = BTreeMap::new();
    let mut trend = Vec::with_capacity(draws.len());

    for draw in draws {
        white_balls.extend_from_slice(&draw.whites);
        for ball in draw.whites {
            let seen = last_seen.entry(ball).or_insert(draw.date);
            if draw.date > *seen {
                *seen = draw.date;
            }
        }

        if let Some(multiplier) = draw.multiplier {
            *power_play_by_year
                .entry((draw.date.year(), multiplier))
                .or_insert(0) += 1;
        }
        *day_of_week
            .entry(draw.date.format("%A").to_string())
            .or_insert(0) += 1;

        let mut sorted = draw.whites;
        sorted.sort_unstable();
        for (i, low) in sorted.iter().enumerate() {
            for high in &sorted[i + 1..] {
                *pair_counts.entry((*low, *high)).or_insert(0) += 1;
            }
        }

        trend.push(TrendPoint {
            date: draw.date,
            sum: draw.whites.iter().map(|ball| u32::from(*ball)).sum(),
            spread: sorted[WHITE_BALLS - 1] - sorted[0],
        });
    }

    let mut overdue: Vec<(u8, i64)> = last_seen
        .into_iter()
        .map(|(ball, seen)| (ball, (latest - seen).num_days()))
        .collect();
    overdue.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut top_pairs: Vec<(u8, u8, u64)> = pair_counts
        .into_iter()
        .map(|((low, high), count)| (low, high, count))
        .collect();
    top_pairs.sort_by(|a, b| b.2.cmp(&a.2).then((a.0, a.1).cmp(&(b.0, b.1))));
    top_pairs.truncate(TOP_PAIRS);

    Some(DrawSummary {
        latest,
        white_balls,
        powerballs: draws.iter().map(|draw| draw.powerball).collect(),
        overdue,
        power_play_by_year,
        day_of_week,
        top_pairs,
        trend,
    })
}

#[cfg(test)]
#[path = "tests/stats_tests.rs"]
mod tests;
