use std::fmt;
use crate::data::types::TickerSymbol;
use crate::strategies::types::{Action, Signal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => f.write_str("buy"),
            OrderSide::Sell => f.write_str("sell"),
        }
    }
}

/// What would be sent to a broker. Only ever logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderIntent {
    pub ticker: TickerSymbol,
    pub side: OrderSide,
    pub quantity: u32,
}

impl OrderIntent {
    /// `None` for HOLD or a zero quantity.
    pub fn from_signal(signal: &Signal, quantity: u32) -> Option<Self> {
        if quantity == 0 {
            return None;
        }

        let side = match signal.action() {
            Action::Buy => OrderSide::Buy,
            Action::Sell => OrderSide::Sell,
            Action::Hold => return None,
        };

        Some(Self {
            ticker: signal.ticker().clone(),
            side,
            quantity,
        })
    }
}

impl fmt::Display for OrderIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = if self.quantity == 1 { "share" } else { "shares" };
        write!(f, "{} {} {} of {}", self.side, self.quantity, unit, self.ticker)
    }
}
