use tracing::{debug, info, warn};
use crate::execution::types::OrderIntent;
use crate::strategies::types::Signal;

/// Default order size for a recommendation.
pub const DEFAULT_QUANTITY: u32 = 1;

/// Receives every signal produced by a run.
pub trait TradeSink {
    fn record(&self, signal: &Signal);
}

/// What the sink did with a signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkOutcome {
    NoTrade,
    DryRun(OrderIntent),
    /// Broker credentials are present but execution is not implemented.
    NotPlaced(OrderIntent),
}

/// Logs signals and the orders they imply. Never contacts a broker.
#[derive(Debug, Clone)]
pub struct LoggingSink {
    dry_run: bool,
    broker_configured: bool,
    broker_paper: bool,
    quantity: u32,
}

impl LoggingSink {
    pub fn new(dry_run: bool, broker_configured: bool, broker_paper: bool) -> Self {
        Self {
            dry_run,
            broker_configured,
            broker_paper,
            quantity: DEFAULT_QUANTITY,
        }
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn outcome(&self, signal: &Signal) -> SinkOutcome {
        match OrderIntent::from_signal(signal, self.quantity) {
            None => SinkOutcome::NoTrade,
            Some(intent) if self.dry_run || !self.broker_configured => SinkOutcome::DryRun(intent),
            Some(intent) => SinkOutcome::NotPlaced(intent),
        }
    }
}

impl TradeSink for LoggingSink {
    fn record(&self, signal: &Signal) {
        info!(
            "Signal for {}: {} (sentiment {})",
            signal.ticker(),
            signal.action(),
            signal.inputs().sentiment
        );
        info!("Reason: {}", signal.rationale());
        match signal.to_json() {
            Ok(record) => debug!("Signal record: {}", record),
            Err(e) => warn!("Failed to serialize signal for {}: {}", signal.ticker(), e),
        }

        match self.outcome(signal) {
            SinkOutcome::NoTrade => info!("No trade for {}", signal.ticker()),
            SinkOutcome::DryRun(intent) => info!("DRY RUN: would {}", intent),
            SinkOutcome::NotPlaced(intent) => warn!(
                "Order execution is not implemented (paper={}); no order was placed to {}",
                self.broker_paper, intent
            ),
        }
    }
}
