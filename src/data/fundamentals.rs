use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, warn};
use crate::config::SourcesConfig;
use crate::data::types::{FundamentalMetrics, TickerSymbol};

/// Fundamentals collaborator. Never fails; non-positive earnings surface as
/// an undefined P/E rather than a number.
#[async_trait]
pub trait FundamentalsSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_fundamentals(&self, ticker: &TickerSymbol) -> FundamentalMetrics;
}

#[derive(Debug, Clone, Default)]
pub struct FallbackFundamentalsSource;

#[async_trait]
impl FundamentalsSource for FallbackFundamentalsSource {
    fn name(&self) -> &'static str {
        "fallback-fundamentals"
    }

    async fn fetch_fundamentals(&self, ticker: &TickerSymbol) -> FundamentalMetrics {
        debug!("Fundamentals source disabled; no valuation data for {}", ticker);
        FundamentalMetrics::default()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteEnvelope {
    #[serde(default)]
    quote_response: QuoteResponse,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteResponse {
    #[serde(default)]
    result: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Quote {
    regular_market_price: Option<f64>,
    market_cap: Option<f64>,
    #[serde(rename = "trailingPE")]
    trailing_pe: Option<f64>,
    #[serde(rename = "forwardPE")]
    forward_pe: Option<f64>,
    eps_trailing_twelve_months: Option<f64>,
}

impl Quote {
    /// Trailing P/E, else forward. Undefined when trailing EPS is not positive.
    fn pe_ratio(&self) -> Option<f64> {
        if matches!(self.eps_trailing_twelve_months, Some(eps) if eps <= 0.0) {
            return None;
        }

        let positive = |pe: &f64| pe.is_finite() && *pe > 0.0;
        self.trailing_pe
            .filter(positive)
            .or_else(|| self.forward_pe.filter(positive))
    }

    fn into_metrics(self) -> FundamentalMetrics {
        let non_negative = |v: Option<f64>| v.filter(|v| v.is_finite() && *v >= 0.0).unwrap_or(0.0);

        FundamentalMetrics {
            pe_ratio: self.pe_ratio(),
            price: non_negative(self.regular_market_price),
            market_cap: non_negative(self.market_cap),
        }
    }
}

pub struct YahooFundamentalsClient {
    client: Client,
    quote_url: String,
}

impl YahooFundamentalsClient {
    pub fn new(config: &SourcesConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build Yahoo Finance HTTP client")?;

        Ok(Self {
            client,
            quote_url: config.yahoo_quote_url.clone(),
        })
    }

    async fn fetch_quote(&self, ticker: &TickerSymbol) -> Result<Option<Quote>> {
        let envelope: QuoteEnvelope = self.client
            .get(&self.quote_url)
            .query(&[("symbols", ticker.as_str())])
            .send()
            .await
            .context("Failed to fetch quote")?
            .error_for_status()
            .context("Quote request rejected")?
            .json()
            .await
            .context("Failed to parse quote response")?;

        Ok(first_quote(envelope))
    }
}

fn first_quote(envelope: QuoteEnvelope) -> Option<Quote> {
    envelope.quote_response.result.into_iter().next()
}

#[async_trait]
impl FundamentalsSource for YahooFundamentalsClient {
    fn name(&self) -> &'static str {
        "yahoo-finance"
    }

    async fn fetch_fundamentals(&self, ticker: &TickerSymbol) -> FundamentalMetrics {
        match self.fetch_quote(ticker).await {
            Ok(Some(quote)) => quote.into_metrics(),
            Ok(None) => {
                warn!("No quote returned for {}", ticker);
                FundamentalMetrics::default()
            }
            Err(e) => {
                error!("Failed to fetch fundamentals for {}: {:#}", ticker, e);
                FundamentalMetrics::default()
            }
        }
    }
}
