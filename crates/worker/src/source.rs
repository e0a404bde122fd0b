//! Remote draw records from the public SODA tabular-data API.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_SODA_BASE: &str = "https://data.ny.gov/";
const SODA_SELECT: &str = "draw_date,winning_numbers,multiplier";
const SODA_ORDER: &str = "draw_date ASC";
const SODA_LIMIT: u32 = 50_000;

/// One row as the API returns it; every field is a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDraw {
    pub draw_date: String,
    pub winning_numbers: String,
    #[serde(default)]
    pub multiplier: Option<String>,
}

#[async_trait]
pub trait DrawSource: Send + Sync {
    async fn fetch(&self, dataset: &str) -> Result<Vec<RawDraw>>;
}

pub struct SodaSource {
    client: reqwest::Client,
    base_url: Url,
}

impl SodaSource {
    pub fn new(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }
}

pub fn query_url(base_url: &Url, dataset: &str) -> Result<Url> {
    if dataset.is_empty()
        || !dataset
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        bail!("invalid dataset identifier '{dataset}'");
    }

    let mut url = base_url
        .join(&format!("resource/{dataset}.json"))
        .with_context(|| format!("failed to build query url from '{base_url}'"))?;
    url.query_pairs_mut()
        .append_pair("$select", SODA_SELECT)
        .append_pair("$order", SODA_ORDER)
        .append_pair("$limit", &SODA_LIMIT.to_string());
    Ok(url)
}

#[async_trait]
impl DrawSource for SodaSource {
    async fn fetch(&self, dataset: &str) -> Result<Vec<RawDraw>> {
        let url = query_url(&self.base_url, dataset)?;
        tracing::info!(%url, "fetching draws");
        let rows = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?
            .error_for_status()
            .with_context(|| format!("dataset query {url} was rejected"))?
            .json::<Vec<RawDraw>>()
            .await
            .context("dataset response was not a list of draw records")?;
        Ok(rows)
    }
}

/// Fixed set of rows, for offline runs and tests.
pub struct StaticSource {
    rows: Vec<RawDraw>,
}

impl StaticSource {
    pub fn new(rows: Vec<RawDraw>) -> Self {
        Self { rows }
    }
}

#[async_trait]
impl DrawSource for StaticSource {
    async fn fetch(&self, _dataset: &str) -> Result<Vec<RawDraw>> {
        Ok(self.rows.clone())
    }
}

#[cfg(test)]
#[path = "tests/source_tests.rs"]
mod tests;
