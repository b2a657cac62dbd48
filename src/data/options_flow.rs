use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, warn};
use crate::config::SourcesConfig;
use crate::data::types::{FlowMetrics, MarketTide, TickerSymbol};

/// Options-flow collaborator. Never fails: unavailable data is all-zero flow.
#[async_trait]
pub trait FlowSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_flow(&self, ticker: &TickerSymbol) -> FlowMetrics;

    /// Market-wide context, if the source offers it.
    async fn market_tide(&self) -> Option<MarketTide> {
        None
    }
}

/// Used when no Unusual Whales key is configured.
#[derive(Debug, Clone, Default)]
pub struct FallbackFlowSource;

#[async_trait]
impl FlowSource for FallbackFlowSource {
    fn name(&self) -> &'static str {
        "fallback-flow"
    }

    async fn fetch_flow(&self, ticker: &TickerSymbol) -> FlowMetrics {
        debug!("No options-flow source configured; zero flow for {}", ticker);
        FlowMetrics::default()
    }
}

pub struct UnusualWhalesClient {
    client: Client,
    base_url: String,
    api_key: String,
    limit: usize,
}

impl UnusualWhalesClient {
    pub fn new(api_key: String, config: &SourcesConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build Unusual Whales HTTP client")?;

        Ok(Self {
            client,
            base_url: config.uw_base_url.trim_end_matches('/').to_string(),
            api_key,
            limit: config.flow_limit,
        })
    }

    /// Fetch recent flow entries for a symbol
    async fn fetch_recent_flow(&self, ticker: &TickerSymbol) -> Result<Vec<Value>> {
        let url = format!("{}/stock/flow/recent", self.base_url);
        let limit = self.limit.to_string();

        let body: Value = self.client
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(&[("symbol", ticker.as_str()), ("limit", limit.as_str())])
            .send()
            .await
            .context("Failed to fetch options flow")?
            .error_for_status()
            .context("Options flow request rejected")?
            .json()
            .await
            .context("Failed to parse options flow response")?;

        extract_flow_entries(body)
    }

    async fn fetch_tide(&self) -> Result<MarketTide> {
        let url = format!("{}/market/tide", self.base_url);

        let body: Value = self.client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("Failed to fetch market tide")?
            .error_for_status()
            .context("Market tide request rejected")?
            .json()
            .await
            .context("Failed to parse market tide response")?;

        Ok(parse_market_tide(&body))
    }
}

#[async_trait]
impl FlowSource for UnusualWhalesClient {
    fn name(&self) -> &'static str {
        "unusual-whales"
    }

    async fn fetch_flow(&self, ticker: &TickerSymbol) -> FlowMetrics {
        match self.fetch_recent_flow(ticker).await {
            Ok(entries) => aggregate_flow(&entries),
            Err(e) => {
                error!("Failed to fetch flow data for {}: {:#}", ticker, e);
                FlowMetrics::default()
            }
        }
    }

    async fn market_tide(&self) -> Option<MarketTide> {
        match self.fetch_tide().await {
            Ok(tide) => Some(tide),
            Err(e) => {
                error!("Failed to fetch market tide data: {:#}", e);
                None
            }
        }
    }
}

/// The API answers with either `{"data": [...]}` or a bare list.
fn extract_flow_entries(body: Value) -> Result<Vec<Value>> {
    match body {
        Value::Array(entries) => Ok(entries),
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(entries)) => Ok(entries),
            _ => bail!("Unexpected flow response format"),
        },
        _ => bail!("Unexpected flow response format"),
    }
}

/// Numbers sometimes arrive as strings ("12500.00").
fn numeric(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Sum call/put contract volume and premium over raw flow entries.
///
/// Entries without a call/put `type` are ignored. Missing volume counts as
/// one contract. Volumes saturate at `u64::MAX`; non-finite premiums are
/// dropped and a non-finite ratio becomes 0.0.
pub fn aggregate_flow(entries: &[Value]) -> FlowMetrics {
    let mut call_volume = 0u64;
    let mut put_volume = 0u64;
    let mut call_premium = 0.0;
    let mut put_premium = 0.0;

    for entry in entries {
        let Some(kind) = entry.get("type").and_then(Value::as_str) else {
            continue;
        };
        let kind = kind.to_lowercase();

        let volume = numeric(entry.get("volume"))
            .or_else(|| numeric(entry.get("size")))
            .filter(|v| *v >= 0.0)
            .map(|v| v as u64)
            .unwrap_or(1);
        let premium = numeric(entry.get("premium"))
            .filter(|p| p.is_finite() && *p >= 0.0)
            .unwrap_or(0.0);

        if kind.contains("call") {
            call_volume = call_volume.saturating_add(volume);
            call_premium += premium;
        } else if kind.contains("put") {
            put_volume = put_volume.saturating_add(volume);
            put_premium += premium;
        }
    }

    let premium_ratio = if put_premium > 0.0 {
        call_premium / put_premium
    } else {
        0.0
    };
    // Premium sums can still overflow to infinity.
    let premium_ratio = if premium_ratio.is_finite() { premium_ratio } else { 0.0 };

    FlowMetrics::new(call_volume, put_volume, premium_ratio)
}

fn parse_market_tide(body: &Value) -> MarketTide {
    let root = body.get("data").unwrap_or(body);
    let tide = numeric(root.get("tide"));
    if tide.is_none() {
        warn!("Market tide response has no numeric tide field");
    }

    MarketTide {
        tide,
        updated: root.get("updated").and_then(Value::as_str).map(str::to_string),
    }
}
