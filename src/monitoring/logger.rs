use chrono::{DateTime, Utc};
use tracing::info;
use tracing_subscriber::EnvFilter;
use crate::strategies::types::{Action, Signal};

/// Install the global fmt subscriber. `RUST_LOG` wins when set.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// Per-run tally of outcomes.
#[derive(Debug, Clone)]
pub struct RunSummary {
    started_at: DateTime<Utc>,
    pub buys: usize,
    pub sells: usize,
    pub holds: usize,
    /// Tickers whose inputs failed validation (counted as holds too).
    pub failed: usize,
}

impl RunSummary {
    pub fn start() -> Self {
        Self::started_at(Utc::now())
    }

    pub fn started_at(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            buys: 0,
            sells: 0,
            holds: 0,
            failed: 0,
        }
    }

    pub fn record(&mut self, signal: &Signal) {
        match signal.action() {
            Action::Buy => self.buys += 1,
            Action::Sell => self.sells += 1,
            Action::Hold => self.holds += 1,
        }
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    pub fn total(&self) -> usize {
        self.buys + self.sells + self.holds
    }

    pub fn log(&self, finished_at: DateTime<Utc>) {
        let elapsed = finished_at - self.started_at;
        info!(
            "Processed {} symbols in {}ms: {} buy, {} sell, {} hold ({} failed validation)",
            self.total(),
            elapsed.num_milliseconds(),
            self.buys,
            self.sells,
            self.holds,
            self.failed
        );
    }
}
