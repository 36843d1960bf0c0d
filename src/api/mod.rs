// Venue access: price quotes, candle history, order execution
pub mod binance;
pub mod paper;

use async_trait::async_trait;

use crate::models::{Candle, OrderConfirmation, Side};
use crate::Result;

/// Capability interface to the trading venue.
///
/// Everything the engine needs from the outside world goes through this
/// trait, so the envelope engine and the monitor can both run against the
/// paper venue in tests without live network access.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Latest traded price for a symbol
    async fn current_price(&self, symbol: &str) -> Result<f64>;

    /// Historical candles, ordered oldest-to-newest
    async fn historical_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>>;

    /// Submit a market order and wait for the venue acknowledgement
    async fn submit_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: f64,
    ) -> Result<OrderConfirmation>;
}

pub use binance::BinanceClient;
pub use paper::PaperGateway;
