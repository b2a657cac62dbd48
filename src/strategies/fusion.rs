use crate::config::StrategyConfig;
use crate::data::types::{FlowMetrics, FundamentalMetrics, SentimentScore, TickerSymbol};
use crate::error::ValidationError;
use crate::strategies::types::{Action, Signal, SignalInputs};
use std::fmt;
use tracing::debug;

pub const INSUFFICIENT_DATA: &str = "insufficient data";

/// One threshold check, as cited in a rationale.
#[derive(Debug, Clone, PartialEq)]
pub struct Criterion {
    pub label: String,
    pub met: bool,
}

impl Criterion {
    fn new(label: String, met: bool) -> Self {
        Self { label, met }
    }

    fn render(&self) -> String {
        format!("{} ({})", self.label, if self.met { "met" } else { "missed" })
    }
}

type CriteriaFn = fn(&StrategyConfig, &SignalInputs) -> Vec<Criterion>;

/// Entry in the ordered rule table. Matches when every criterion is met.
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub action: Action,
    pub criteria: CriteriaFn,
    /// Rationale prefix used when this rule fires.
    pub summary: &'static str,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("action", &self.action)
            .field("summary", &self.summary)
            .finish()
    }
}

impl Rule {
    fn evaluate(&self, config: &StrategyConfig, inputs: &SignalInputs) -> (bool, Vec<Criterion>) {
        let criteria = (self.criteria)(config, inputs);
        let matched = !criteria.is_empty() && criteria.iter().all(|c| c.met);
        (matched, criteria)
    }
}

/// Rules in evaluation order; first match wins.
pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule {
            name: "no_data",
            action: Action::Hold,
            criteria: no_data_criteria,
            summary: INSUFFICIENT_DATA,
        },
        Rule {
            name: "bullish_confluence",
            action: Action::Buy,
            criteria: bullish_criteria,
            summary: "bullish flow and sentiment at acceptable valuation",
        },
        Rule {
            name: "bearish_confluence",
            action: Action::Sell,
            criteria: bearish_criteria,
            summary: "bearish flow and sentiment",
        },
    ]
}

fn no_data_criteria(_config: &StrategyConfig, inputs: &SignalInputs) -> Vec<Criterion> {
    vec![
        Criterion::new("no options volume".to_string(), inputs.flow.is_empty()),
        Criterion::new("no sentiment mentions".to_string(), inputs.sentiment.value() == 0.0),
    ]
}

fn bullish_criteria(config: &StrategyConfig, inputs: &SignalInputs) -> Vec<Criterion> {
    let flow = &inputs.flow;
    vec![
        dominance("call/put", flow.call_volume, flow.put_volume, config.flow_multiple),
        Criterion::new(
            format!("sentiment {} >= {:+.2}", inputs.sentiment, config.sentiment_threshold),
            inputs.sentiment.value() >= config.sentiment_threshold,
        ),
        valuation(&inputs.fundamentals, config.pe_ceiling),
    ]
}

fn bearish_criteria(config: &StrategyConfig, inputs: &SignalInputs) -> Vec<Criterion> {
    let flow = &inputs.flow;
    vec![
        dominance("put/call", flow.put_volume, flow.call_volume, config.flow_multiple),
        Criterion::new(
            format!("sentiment {} <= {:+.2}", inputs.sentiment, -config.sentiment_threshold),
            inputs.sentiment.value() <= -config.sentiment_threshold,
        ),
    ]
}

/// `lead` must exceed `lag` and reach `multiple` times it.
fn dominance(label: &str, lead: u64, lag: u64, multiple: f64) -> Criterion {
    let ratio = match (lead, lag) {
        (0, 0) => "n/a".to_string(),
        (_, 0) => "inf".to_string(),
        _ => format!("{:.2}x", lead as f64 / lag as f64),
    };
    let met = lead > lag && lead as f64 >= multiple * lag as f64;

    Criterion::new(
        format!("{} ratio {} ({} vs {}) >= {:.2}x", label, ratio, lead, lag, multiple),
        met,
    )
}

/// Undefined P/E passes; valuation alone never blocks a buy on missing earnings.
fn valuation(fundamentals: &FundamentalMetrics, ceiling: f64) -> Criterion {
    match fundamentals.pe_ratio {
        Some(pe) => Criterion::new(format!("P/E {:.1} <= {:.1}", pe, ceiling), pe <= ceiling),
        None => Criterion::new("P/E undefined".to_string(), true),
    }
}

/// Outcome of the rule table before it is bound to a ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub action: Action,
    pub rule: Option<&'static str>,
    pub rationale: String,
}

/// Pure reduction of (flow, sentiment, fundamentals) to a recommendation.
#[derive(Debug, Clone)]
pub struct FusionEngine {
    config: StrategyConfig,
    rules: Vec<Rule>,
}

impl FusionEngine {
    pub fn new(config: StrategyConfig) -> Self {
        Self::with_rules(config, default_rules())
    }

    pub fn with_rules(config: StrategyConfig, rules: Vec<Rule>) -> Self {
        Self { config, rules }
    }

    /// Validate inputs and produce a signal.
    pub fn fuse(
        &self,
        ticker: &TickerSymbol,
        flow: FlowMetrics,
        sentiment: SentimentScore,
        fundamentals: FundamentalMetrics,
    ) -> Result<Signal, ValidationError> {
        flow.validate()?;
        sentiment.validate()?;
        fundamentals.validate()?;

        let inputs = SignalInputs {
            flow,
            sentiment,
            fundamentals,
        };
        let decision = self.evaluate(&inputs);
        debug!("{}: rule {:?} -> {}", ticker, decision.rule, decision.action);

        Ok(Signal::new(ticker.clone(), decision.action, decision.rationale, inputs))
    }

    /// Walk the rule table; HOLD with every cited check when nothing matches.
    pub fn evaluate(&self, inputs: &SignalInputs) -> Decision {
        let mut unmatched = Vec::new();

        for rule in &self.rules {
            let (matched, criteria) = rule.evaluate(&self.config, inputs);
            if matched {
                return Decision {
                    action: rule.action,
                    rule: Some(rule.name),
                    rationale: format!("{}: {}", rule.summary, render_all(&criteria)),
                };
            }
            // The no-data check only matters when it fires.
            if rule.action != Action::Hold {
                unmatched.push(format!("{} [{}]", rule.action, render_all(&criteria)));
            }
        }

        Decision {
            action: Action::Hold,
            rule: None,
            rationale: format!("mixed signals, no rule matched: {}", unmatched.join("; ")),
        }
    }

    /// HOLD used when a ticker cannot be evaluated at all.
    pub fn hold_on_error(
        &self,
        ticker: &TickerSymbol,
        inputs: SignalInputs,
        error: &ValidationError,
    ) -> Signal {
        Signal::new(
            ticker.clone(),
            Action::Hold,
            format!("{}: {}", INSUFFICIENT_DATA, error),
            inputs,
        )
    }
}

fn render_all(criteria: &[Criterion]) -> String {
    criteria.iter().map(Criterion::render).collect::<Vec<_>>().join(", ")
}
