use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info, warn};
use crate::config::{Config, EnvConfig};
use crate::data::fundamentals::{FallbackFundamentalsSource, FundamentalsSource, YahooFundamentalsClient};
use crate::data::options_flow::{FallbackFlowSource, FlowSource, UnusualWhalesClient};
use crate::data::sentiment::{FallbackSentimentSource, RedditSentimentClient, SentimentSource};
use crate::data::types::TickerSymbol;
use crate::execution::sink::TradeSink;
use crate::monitoring::logger::RunSummary;
use crate::strategies::fusion::FusionEngine;
use crate::strategies::types::{Signal, SignalInputs};

/// The three data collaborators, chosen once at startup.
pub struct Sources {
    pub flow: Box<dyn FlowSource>,
    pub sentiment: Box<dyn SentimentSource>,
    pub fundamentals: Box<dyn FundamentalsSource>,
}

impl Sources {
    pub fn fallback() -> Self {
        Self {
            flow: Box::new(FallbackFlowSource),
            sentiment: Box::new(FallbackSentimentSource),
            fundamentals: Box::new(FallbackFundamentalsSource),
        }
    }

    /// Live where configured, fallback everywhere else.
    pub fn select(config: &Config, env: &EnvConfig, offline: bool) -> Result<Self> {
        if offline {
            return Ok(Self::fallback());
        }

        let flow: Box<dyn FlowSource> = match &env.uw_api_key {
            Some(key) => Box::new(UnusualWhalesClient::new(key.clone(), &config.sources)?),
            None => {
                info!("UW_API_KEY not set; options flow will be zero");
                Box::new(FallbackFlowSource)
            }
        };

        let sentiment: Box<dyn SentimentSource> = if config.sources.sentiment_enabled {
            Box::new(RedditSentimentClient::new(&config.sources, &config.sentiment)?)
        } else {
            Box::new(FallbackSentimentSource)
        };

        let fundamentals: Box<dyn FundamentalsSource> = if config.sources.fundamentals_enabled {
            Box::new(YahooFundamentalsClient::new(&config.sources)?)
        } else {
            Box::new(FallbackFundamentalsSource)
        };

        Ok(Self {
            flow,
            sentiment,
            fundamentals,
        })
    }
}

/// Sequential watchlist loop: fetch, fuse, record.
pub struct Orchestrator<S: TradeSink> {
    sources: Sources,
    engine: FusionEngine,
    sink: S,
}

impl<S: TradeSink> Orchestrator<S> {
    pub fn new(sources: Sources, engine: FusionEngine, sink: S) -> Self {
        info!(
            "Sources: flow={}, sentiment={}, fundamentals={}",
            sources.flow.name(),
            sources.sentiment.name(),
            sources.fundamentals.name()
        );

        Self {
            sources,
            engine,
            sink,
        }
    }

    #[cfg(test)]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Evaluate one ticker. Never fails; bad inputs become an insufficient-data HOLD.
    pub async fn process_symbol(&self, ticker: &TickerSymbol) -> (Signal, bool) {
        info!("Processing {}", ticker);

        let flow = self.sources.flow.fetch_flow(ticker).await;
        let sentiment = self.sources.sentiment.fetch_sentiment(ticker).await;
        let fundamentals = self.sources.fundamentals.fetch_fundamentals(ticker).await;

        debug!(
            "{} inputs: calls={} puts={} premium_ratio={:.2} sentiment={} pe={:?} price={:.2} market_cap={:.0}",
            ticker,
            flow.call_volume,
            flow.put_volume,
            flow.premium_ratio,
            sentiment,
            fundamentals.pe_ratio,
            fundamentals.price,
            fundamentals.market_cap
        );

        match self.engine.fuse(ticker, flow, sentiment, fundamentals) {
            Ok(signal) => (signal, false),
            Err(e) => {
                warn!(
                    "Rejected {} for {}: {}",
                    e.field().unwrap_or("inputs"),
                    ticker,
                    e
                );
                let inputs = SignalInputs {
                    flow,
                    sentiment,
                    fundamentals,
                };
                (self.engine.hold_on_error(ticker, inputs, &e), true)
            }
        }
    }

    /// Process every ticker in watchlist order.
    pub async fn run(&self, watchlist: &[TickerSymbol]) -> RunSummary {
        let mut summary = RunSummary::start();

        let symbols: Vec<&str> = watchlist.iter().map(TickerSymbol::as_str).collect();
        info!("Starting signal fusion for symbols: {}", symbols.join(", "));

        if let Some(tide) = self.sources.flow.market_tide().await {
            info!("Market tide: {:?} (updated {:?})", tide.tide, tide.updated);
        }

        for ticker in watchlist {
            let (signal, failed) = self.process_symbol(ticker).await;
            if failed {
                summary.record_failure();
            }
            summary.record(&signal);
            self.sink.record(&signal);
        }

        summary.log(Utc::now());
        info!("All symbols processed");
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use crate::config::StrategyConfig;
    use crate::data::types::{FlowMetrics, FundamentalMetrics, SentimentScore};
    use crate::strategies::fusion::INSUFFICIENT_DATA;
    use crate::strategies::types::Action;

    #[derive(Default)]
    struct RecordingSink {
        signals: RefCell<Vec<Signal>>,
    }

    impl TradeSink for RecordingSink {
        fn record(&self, signal: &Signal) {
            self.signals.borrow_mut().push(signal.clone());
        }
    }

    struct FixedFlow(HashMap<String, FlowMetrics>);

    #[async_trait]
    impl FlowSource for FixedFlow {
        fn name(&self) -> &'static str {
            "fixed-flow"
        }

        async fn fetch_flow(&self, ticker: &TickerSymbol) -> FlowMetrics {
            self.0.get(ticker.as_str()).copied().unwrap_or_default()
        }
    }

    struct FixedSentiment(HashMap<String, f64>);

    #[async_trait]
    impl SentimentSource for FixedSentiment {
        fn name(&self) -> &'static str {
            "fixed-sentiment"
        }

        async fn fetch_sentiment(&self, ticker: &TickerSymbol) -> SentimentScore {
            SentimentScore(self.0.get(ticker.as_str()).copied().unwrap_or(0.0))
        }
    }

    struct FixedFundamentals(HashMap<String, FundamentalMetrics>);

    #[async_trait]
    impl FundamentalsSource for FixedFundamentals {
        fn name(&self) -> &'static str {
            "fixed-fundamentals"
        }

        async fn fetch_fundamentals(&self, ticker: &TickerSymbol) -> FundamentalMetrics {
            self.0.get(ticker.as_str()).copied().unwrap_or_default()
        }
    }

    fn tickers(symbols: &[&str]) -> Vec<TickerSymbol> {
        symbols.iter().map(|s| TickerSymbol::parse(s).unwrap()).collect()
    }

    fn scenario_sources() -> Sources {
        let flow = HashMap::from([
            ("AAPL".to_string(), FlowMetrics::new(300, 100, 1.2)),
            ("TSLA".to_string(), FlowMetrics::new(50, 400, 0.3)),
            ("MSFT".to_string(), FlowMetrics::new(100, 100, 1.0)),
            ("BAD".to_string(), FlowMetrics::new(10, 10, 1.0)),
        ]);
        let sentiment = HashMap::from([
            ("AAPL".to_string(), 0.4),
            ("TSLA".to_string(), -0.5),
            // out of range: caller contract violation
            ("BAD".to_string(), 3.0),
        ]);
        let pe = |ratio| FundamentalMetrics { price: 50.0, pe_ratio: ratio, market_cap: 1e9 };
        let fundamentals = HashMap::from([
            ("AAPL".to_string(), pe(Some(25.0))),
            ("TSLA".to_string(), pe(Some(18.0))),
            ("MSFT".to_string(), pe(None)),
        ]);

        Sources {
            flow: Box::new(FixedFlow(flow)),
            sentiment: Box::new(FixedSentiment(sentiment)),
            fundamentals: Box::new(FixedFundamentals(fundamentals)),
        }
    }

    fn orchestrator(sources: Sources) -> Orchestrator<RecordingSink> {
        Orchestrator::new(
            sources,
            FusionEngine::new(StrategyConfig::default()),
            RecordingSink::default(),
        )
    }

    #[tokio::test]
    async fn test_run_keeps_watchlist_order() {
        let orchestrator = orchestrator(scenario_sources());
        let summary = orchestrator.run(&tickers(&["TSLA", "AAPL", "MSFT", "NVDA"])).await;

        let signals = orchestrator.sink().signals.borrow();
        let seen: Vec<(&str, Action)> = signals
            .iter()
            .map(|s| (s.ticker().as_str(), s.action()))
            .collect();
        assert_eq!(
            seen,
            vec![
                ("TSLA", Action::Sell),
                ("AAPL", Action::Buy),
                ("MSFT", Action::Hold),
                ("NVDA", Action::Hold),
            ]
        );

        // NVDA has no data from any source
        assert!(signals[3].rationale().starts_with(INSUFFICIENT_DATA));

        assert_eq!((summary.buys, summary.sells, summary.holds, summary.failed), (1, 1, 2, 0));
    }

    #[tokio::test]
    async fn test_invalid_input_does_not_abort_run() {
        let orchestrator = orchestrator(scenario_sources());
        let summary = orchestrator.run(&tickers(&["BAD", "AAPL"])).await;

        let signals = orchestrator.sink().signals.borrow();
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].action(), Action::Hold);
        assert!(signals[0].rationale().starts_with(INSUFFICIENT_DATA));
        assert!(signals[0].rationale().contains("sentiment"));
        assert_eq!(signals[1].action(), Action::Buy);
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn test_fallback_sources_hold_everything() {
        let orchestrator = orchestrator(Sources::fallback());
        let summary = orchestrator.run(&tickers(&["AAPL", "MSFT"])).await;

        let signals = orchestrator.sink().signals.borrow();
        assert!(signals.iter().all(|s| s.action() == Action::Hold));
        assert!(signals.iter().all(|s| s.rationale().starts_with(INSUFFICIENT_DATA)));
        assert_eq!(summary.holds, 2);
    }

    #[tokio::test]
    async fn test_same_inputs_same_signals() {
        let first = orchestrator(scenario_sources());
        let second = orchestrator(scenario_sources());
        let watchlist = tickers(&["AAPL", "TSLA", "MSFT"]);

        first.run(&watchlist).await;
        second.run(&watchlist).await;

        assert_eq!(*first.sink().signals.borrow(), *second.sink().signals.borrow());
    }

    #[tokio::test]
    async fn test_empty_watchlist() {
        let orchestrator = orchestrator(Sources::fallback());
        let summary = orchestrator.run(&[]).await;
        assert_eq!(summary.total(), 0);
        assert!(orchestrator.sink().signals.borrow().is_empty());
    }

    #[test]
    fn test_offline_selects_fallbacks() {
        let env = EnvConfig {
            uw_api_key: Some("key".to_string()),
            ..Default::default()
        };
        let sources = Sources::select(&Config::default(), &env, true).unwrap();
        assert_eq!(sources.flow.name(), "fallback-flow");
        assert_eq!(sources.sentiment.name(), "fallback-sentiment");
        assert_eq!(sources.fundamentals.name(), "fallback-fundamentals");
    }

    #[test]
    fn test_live_selection_follows_config() {
        let mut config = Config::default();
        config.sources.fundamentals_enabled = false;

        let sources = Sources::select(&config, &EnvConfig::default(), false).unwrap();
        assert_eq!(sources.flow.name(), "fallback-flow");
        assert_eq!(sources.sentiment.name(), "reddit");
        assert_eq!(sources.fundamentals.name(), "fallback-fundamentals");

        let env = EnvConfig {
            uw_api_key: Some("key".to_string()),
            ..Default::default()
        };
        let sources = Sources::select(&config, &env, false).unwrap();
        assert_eq!(sources.flow.name(), "unusual-whales");
    }
}
