use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV candlestick data as returned by the venue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Order side, also the direction of an incoming signal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The side that closes a position opened with `self`
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl std::str::FromStr for Side {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            _ => Err(()),
        }
    }
}

/// Direction of an open position
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl From<Side> for Direction {
    fn from(side: Side) -> Self {
        match side {
            Side::Buy => Direction::Long,
            Side::Sell => Direction::Short,
        }
    }
}

impl Direction {
    /// Order side that closes a position in this direction
    pub fn closing_side(self) -> Side {
        match self {
            Direction::Long => Side::Sell,
            Direction::Short => Side::Buy,
        }
    }
}

/// External trading signal, consumed once by the envelope engine
#[derive(Debug, Clone)]
pub struct Signal {
    pub side: Side,
    pub symbol: String,
    pub quantity: f64,
}

/// Why the monitor closed a position
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
}

/// An open position with its take-profit / stop-loss envelope.
///
/// The registry holds exactly one of these per symbol. The quantity is the
/// size the entry order was filled with, and the closing order reuses it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub quantity: f64,
    pub take_profit: f64,
    pub stop_loss: f64,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    /// Check the direction-specific closure condition against a price.
    ///
    /// Either bound triggers; they cannot both be true since take-profit and
    /// stop-loss straddle the entry on opposite sides.
    pub fn exit_reason(&self, price: f64) -> Option<ExitReason> {
        match self.direction {
            Direction::Long => {
                if price >= self.take_profit {
                    Some(ExitReason::TakeProfit)
                } else if price <= self.stop_loss {
                    Some(ExitReason::StopLoss)
                } else {
                    None
                }
            }
            Direction::Short => {
                if price <= self.take_profit {
                    Some(ExitReason::TakeProfit)
                } else if price >= self.stop_loss {
                    Some(ExitReason::StopLoss)
                } else {
                    None
                }
            }
        }
    }
}

/// Venue acknowledgement of a submitted market order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderConfirmation {
    pub order_id: String,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}
