use serde::{Deserialize, Serialize};
use std::fmt;
use crate::error::{check_non_negative, check_range, ValidationError};

const MAX_TICKER_LEN: usize = 10;

/// Uppercase ticker symbol used to correlate all per-ticker data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TickerSymbol(String);

impl TickerSymbol {
    /// Normalise user input ("$aapl ", "brk.b") into a symbol.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        let stripped = trimmed.strip_prefix('$').unwrap_or(trimmed);
        let symbol = stripped.to_ascii_uppercase();

        let valid_chars = symbol
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '.' || c == '-');

        if symbol.is_empty() || symbol.len() > MAX_TICKER_LEN || !valid_chars {
            return Err(ValidationError::InvalidTicker(raw.to_string()));
        }

        Ok(Self(symbol))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TickerSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TickerSymbol {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TickerSymbol> for String {
    fn from(symbol: TickerSymbol) -> Self {
        symbol.0
    }
}

/// Aggregate options activity for a symbol over the current polling window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowMetrics {
    pub call_volume: u64,
    pub put_volume: u64,
    /// Call premium over put premium; 0.0 when no put premium was seen.
    pub premium_ratio: f64,
}

impl FlowMetrics {
    pub fn new(call_volume: u64, put_volume: u64, premium_ratio: f64) -> Self {
        Self {
            call_volume,
            put_volume,
            premium_ratio,
        }
    }

    /// No options activity at all (also the no-credential fallback).
    pub fn is_empty(&self) -> bool {
        self.call_volume == 0 && self.put_volume == 0
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_non_negative("premium_ratio", self.premium_ratio)
    }
}

/// Keyword lean in [-1.0, 1.0]; 0.0 is neutral.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct SentimentScore(pub f64);

impl SentimentScore {
    pub const NEUTRAL: SentimentScore = SentimentScore(0.0);

    /// (bullish - bearish) / total, neutral when nothing was found.
    pub fn from_tally(bullish_hits: usize, bearish_hits: usize) -> Self {
        let total = bullish_hits + bearish_hits;
        if total == 0 {
            return Self::NEUTRAL;
        }
        let raw = (bullish_hits as f64 - bearish_hits as f64) / total as f64;
        Self(raw.clamp(-1.0, 1.0))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_range("sentiment", self.0, -1.0, 1.0)
    }
}

impl fmt::Display for SentimentScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+.2}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FundamentalMetrics {
    pub price: f64,
    /// `None` when earnings are non-positive or no P/E was reported.
    pub pe_ratio: Option<f64>,
    pub market_cap: f64,
}

impl FundamentalMetrics {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_non_negative("price", self.price)?;
        check_non_negative("market_cap", self.market_cap)?;

        if let Some(pe) = self.pe_ratio {
            if !pe.is_finite() {
                return Err(ValidationError::NotFinite { field: "pe_ratio", value: pe });
            }
            if pe <= 0.0 {
                return Err(ValidationError::NonPositive { field: "pe_ratio", value: pe });
            }
        }

        Ok(())
    }
}

/// Market-wide options sentiment; context only, never a fusion input.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketTide {
    pub tide: Option<f64>,
    pub updated: Option<String>,
}
