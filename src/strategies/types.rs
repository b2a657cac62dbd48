use serde::Serialize;
use std::fmt;
use crate::data::types::{FlowMetrics, FundamentalMetrics, SentimentScore, TickerSymbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Buy => "BUY",
            Action::Sell => "SELL",
            Action::Hold => "HOLD",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three per-ticker feeds a decision was made from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SignalInputs {
    pub flow: FlowMetrics,
    pub sentiment: SentimentScore,
    pub fundamentals: FundamentalMetrics,
}

/// One recommendation. Built once per fusion call and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    ticker: TickerSymbol,
    action: Action,
    rationale: String,
    inputs: SignalInputs,
}

impl Signal {
    pub(crate) fn new(
        ticker: TickerSymbol,
        action: Action,
        rationale: String,
        inputs: SignalInputs,
    ) -> Self {
        Self {
            ticker,
            action,
            rationale,
            inputs,
        }
    }

    pub fn ticker(&self) -> &TickerSymbol {
        &self.ticker
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn rationale(&self) -> &str {
        &self.rationale
    }

    pub fn inputs(&self) -> &SignalInputs {
        &self.inputs
    }

    /// One-line JSON record of the signal and the inputs behind it.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
