use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{info, warn};
use crate::data::types::TickerSymbol;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub watchlist: WatchlistConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub sentiment: SentimentConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    #[serde(default = "default_true")]
    pub dry_run: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self { dry_run: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchlistConfig {
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
}

impl Default for WatchlistConfig {
    fn default() -> Self {
        Self { symbols: default_symbols() }
    }
}

/// Thresholds for the fusion rule table.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct StrategyConfig {
    #[serde(default = "default_flow_multiple")]
    pub flow_multiple: f64,
    #[serde(default = "default_sentiment_threshold")]
    pub sentiment_threshold: f64,
    #[serde(default = "default_pe_ceiling")]
    pub pe_ceiling: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            flow_multiple: default_flow_multiple(),
            sentiment_threshold: default_sentiment_threshold(),
            pe_ceiling: default_pe_ceiling(),
        }
    }
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.flow_multiple.is_finite() || self.flow_multiple < 1.0 {
            bail!("strategy.flow_multiple must be >= 1.0, got {}", self.flow_multiple);
        }
        if !(0.0..=1.0).contains(&self.sentiment_threshold) {
            bail!(
                "strategy.sentiment_threshold must be within [0, 1], got {}",
                self.sentiment_threshold
            );
        }
        if !self.pe_ceiling.is_finite() || self.pe_ceiling <= 0.0 {
            bail!("strategy.pe_ceiling must be positive, got {}", self.pe_ceiling);
        }
        Ok(())
    }
}

/// Per-source settings handed to each collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_flow_limit")]
    pub flow_limit: usize,
    #[serde(default = "default_post_limit")]
    pub post_limit: usize,
    #[serde(default = "default_true")]
    pub sentiment_enabled: bool,
    #[serde(default = "default_true")]
    pub fundamentals_enabled: bool,
    #[serde(default = "default_uw_base_url")]
    pub uw_base_url: String,
    #[serde(default = "default_reddit_search_url")]
    pub reddit_search_url: String,
    #[serde(default = "default_yahoo_quote_url")]
    pub yahoo_quote_url: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_timeout(),
            flow_limit: default_flow_limit(),
            post_limit: default_post_limit(),
            sentiment_enabled: true,
            fundamentals_enabled: true,
            uw_base_url: default_uw_base_url(),
            reddit_search_url: default_reddit_search_url(),
            yahoo_quote_url: default_yahoo_quote_url(),
        }
    }
}

/// Keyword lexicons for social sentiment scoring.
#[derive(Debug, Clone, Deserialize)]
pub struct SentimentConfig {
    #[serde(default = "default_bullish_keywords")]
    pub bullish_keywords: Vec<String>,
    #[serde(default = "default_bearish_keywords")]
    pub bearish_keywords: Vec<String>,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            bullish_keywords: default_bullish_keywords(),
            bearish_keywords: default_bearish_keywords(),
        }
    }
}

fn default_true() -> bool { true }
fn default_symbols() -> Vec<String> {
    vec!["AAPL".to_string(), "MSFT".to_string(), "TSLA".to_string()]
}
fn default_flow_multiple() -> f64 { 1.5 }
fn default_sentiment_threshold() -> f64 { 0.2 }
fn default_pe_ceiling() -> f64 { 40.0 }
fn default_timeout() -> u64 { 10 }
fn default_flow_limit() -> usize { 20 }
fn default_post_limit() -> usize { 50 }
fn default_uw_base_url() -> String {
    "https://api.unusualwhales.com".to_string()
}
fn default_reddit_search_url() -> String {
    "https://www.reddit.com/r/wallstreetbets+stocks+options+investing/search.json".to_string()
}
fn default_yahoo_quote_url() -> String {
    "https://query1.finance.yahoo.com/v7/finance/quote".to_string()
}
fn default_bullish_keywords() -> Vec<String> {
    ["call", "calls", "bull", "bullish", "long", "yolo", "moon", "rocket", "green", "buy", "pump"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_bearish_keywords() -> Vec<String> {
    ["put", "puts", "bear", "bearish", "short", "down", "dump", "red", "sell", "crash"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        config.strategy.validate()
            .with_context(|| format!("Invalid strategy thresholds in {}", path))?;

        Ok(config)
    }

    /// Load `path` if it exists, otherwise run on built-in defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            info!("No config file at {}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Fold environment overrides into the file config.
    pub fn apply_env(&mut self, env: &EnvConfig) -> Result<()> {
        if let Some(symbols) = &env.watchlist {
            self.watchlist.symbols = symbols.clone();
        }
        if let Some(threshold) = env.sentiment_threshold {
            self.strategy.sentiment_threshold = threshold;
        }
        self.strategy.validate().context("Invalid strategy thresholds after env overrides")
    }

    /// Resolve the watchlist: CLI override first, then config. Input order is kept.
    pub fn resolve_watchlist(&self, cli_symbols: Option<&str>) -> Vec<TickerSymbol> {
        match cli_symbols {
            Some(raw) => parse_watchlist(&split_symbols(raw)),
            None => parse_watchlist(&self.watchlist.symbols),
        }
    }
}

fn split_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse symbols in order, skipping invalid entries.
pub fn parse_watchlist(raw: &[String]) -> Vec<TickerSymbol> {
    raw.iter()
        .filter_map(|s| match TickerSymbol::parse(s) {
            Ok(symbol) => Some(symbol),
            Err(e) => {
                warn!("Skipping watchlist entry: {}", e);
                None
            }
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub uw_api_key: Option<String>,
    pub broker_api_key: Option<String>,
    pub broker_api_secret: Option<String>,
    pub broker_paper: bool,
    pub watchlist: Option<Vec<String>>,
    pub sentiment_threshold: Option<f64>,
}

impl EnvConfig {
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let sentiment_threshold = match get("SENTIMENT_THRESHOLD") {
            Some(raw) => Some(
                raw.trim()
                    .parse::<f64>()
                    .with_context(|| format!("SENTIMENT_THRESHOLD is not a number: {}", raw))?,
            ),
            None => None,
        };

        let broker_paper = lookup("BROKER_PAPER")
            .map(|v| !matches!(v.as_str(), "" | "0" | "false" | "False"))
            .unwrap_or(true);

        Ok(Self {
            uw_api_key: get("UW_API_KEY"),
            broker_api_key: get("BROKER_API_KEY"),
            broker_api_secret: get("BROKER_API_SECRET"),
            broker_paper,
            watchlist: get("WATCHLIST").map(|raw| split_symbols(&raw)),
            sentiment_threshold,
        })
    }

    /// Both broker credentials are present.
    pub fn broker_configured(&self) -> bool {
        self.broker_api_key.is_some() && self.broker_api_secret.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env_from(pairs: &[(&str, &str)]) -> EnvConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EnvConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.system.dry_run);
        assert_eq!(config.watchlist.symbols, vec!["AAPL", "MSFT", "TSLA"]);
        assert_eq!(config.strategy, StrategyConfig::default());
        assert_eq!(config.sources.request_timeout_secs, 10);
        assert!(config.sentiment.bullish_keywords.contains(&"yolo".to_string()));
    }

    #[test]
    fn test_partial_sections() {
        let config: Config = toml::from_str(
            r#"
            [strategy]
            pe_ceiling = 30.0

            [sources]
            fundamentals_enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.strategy.pe_ceiling, 30.0);
        assert_eq!(config.strategy.flow_multiple, 1.5);
        assert!(!config.sources.fundamentals_enabled);
        assert!(config.sources.sentiment_enabled);
    }

    #[test]
    fn test_strategy_validation() {
        assert!(StrategyConfig::default().validate().is_ok());

        let low_multiple = StrategyConfig { flow_multiple: 0.5, ..Default::default() };
        assert!(low_multiple.validate().is_err());

        let wide_threshold = StrategyConfig { sentiment_threshold: 1.5, ..Default::default() };
        assert!(wide_threshold.validate().is_err());

        let zero_ceiling = StrategyConfig { pe_ceiling: 0.0, ..Default::default() };
        assert!(zero_ceiling.validate().is_err());
    }

    #[test]
    fn test_env_empty_strings_are_unset() {
        let env = env_from(&[("UW_API_KEY", ""), ("BROKER_API_KEY", "key")]);
        assert_eq!(env.uw_api_key, None);
        assert_eq!(env.broker_api_key.as_deref(), Some("key"));
        assert!(!env.broker_configured());
        assert!(env.broker_paper);
    }

    #[test]
    fn test_env_broker_paper_flags() {
        for off in ["0", "false", "False", ""] {
            assert!(!env_from(&[("BROKER_PAPER", off)]).broker_paper, "{off:?}");
        }
        assert!(env_from(&[("BROKER_PAPER", "1")]).broker_paper);
    }

    #[test]
    fn test_env_overrides_config() {
        let env = env_from(&[("WATCHLIST", "nvda, amd,,"), ("SENTIMENT_THRESHOLD", "0.3")]);
        let mut config = Config::default();
        config.apply_env(&env).unwrap();

        assert_eq!(config.watchlist.symbols, vec!["nvda", "amd"]);
        assert_eq!(config.strategy.sentiment_threshold, 0.3);

        let symbols: Vec<String> = config
            .resolve_watchlist(None)
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(symbols, vec!["NVDA", "AMD"]);
    }

    #[test]
    fn test_bad_threshold_env_is_an_error() {
        let result = EnvConfig::from_lookup(|key| {
            (key == "SENTIMENT_THRESHOLD").then(|| "lots".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_symbols_win_and_keep_order() {
        let config = Config::default();
        let symbols: Vec<String> = config
            .resolve_watchlist(Some("tsla,$gme, bad ticker ,aapl"))
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(symbols, vec!["TSLA", "GME", "AAPL"]);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("absent.toml");

        let config = Config::load_or_default(path.to_str().unwrap()).unwrap();
        assert_eq!(config.strategy, StrategyConfig::default());
        assert_eq!(config.watchlist.symbols, vec!["AAPL", "MSFT", "TSLA"]);
        assert!(Config::load(path.to_str().unwrap()).is_err());
    }

    #[test]
    fn test_load_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
            [watchlist]
            symbols = ["NVDA"]

            [strategy]
            flow_multiple = 2.0
            "#,
        )
        .unwrap();

        let config = Config::load_or_default(path.to_str().unwrap()).unwrap();
        assert_eq!(config.watchlist.symbols, vec!["NVDA"]);
        assert_eq!(config.strategy.flow_multiple, 2.0);
        assert_eq!(config.strategy.pe_ceiling, 40.0);
    }

    #[test]
    fn test_unparsable_file_is_an_error() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[strategy\nflow_multiple = ").unwrap();

        let err = Config::load_or_default(path.to_str().unwrap()).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config file"));
    }

    #[test]
    fn test_out_of_range_file_thresholds_rejected() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[strategy]\nflow_multiple = 0.5\n").unwrap();

        let err = Config::load_or_default(path.to_str().unwrap()).unwrap_err();
        assert!(format!("{:#}", err).contains("flow_multiple"));
    }
}
