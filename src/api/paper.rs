use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::OrderGateway;
use crate::error::BotError;
use crate::models::{Candle, OrderConfirmation, Side};
use crate::Result;

/// In-memory simulated venue.
///
/// Used as the live gateway when no API credentials are configured (paper
/// trading) and as the venue double in engine tests: prices and candle
/// history are set explicitly, submitted orders are recorded, and rejection
/// can be forced to exercise failure paths.
#[derive(Default)]
pub struct PaperGateway {
    state: Mutex<PaperState>,
}

#[derive(Default)]
struct PaperState {
    prices: HashMap<String, f64>,
    candles: HashMap<String, Vec<Candle>>,
    orders: Vec<OrderConfirmation>,
    reject_orders: bool,
}

impl PaperGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&self, symbol: &str, price: f64) {
        let mut state = self.state.lock().unwrap();
        state.prices.insert(symbol.to_string(), price);
    }

    pub fn set_candles(&self, symbol: &str, candles: Vec<Candle>) {
        let mut state = self.state.lock().unwrap();
        state.candles.insert(symbol.to_string(), candles);
    }

    /// Seed `count` synthetic candles around a base price with the given bar
    /// range, so ATR over the history equals `range`
    pub fn seed_history(&self, symbol: &str, base_price: f64, range: f64, count: usize) {
        let start = Utc::now() - chrono::Duration::hours(count as i64);
        let candles = (0..count)
            .map(|i| Candle {
                timestamp: start + chrono::Duration::hours(i as i64),
                open: base_price,
                high: base_price + range / 2.0,
                low: base_price - range / 2.0,
                close: base_price,
                volume: 1000.0,
            })
            .collect();
        self.set_candles(symbol, candles);
        self.set_price(symbol, base_price);
    }

    /// Make all subsequent order submissions fail with `OrderRejected`
    pub fn set_reject_orders(&self, reject: bool) {
        self.state.lock().unwrap().reject_orders = reject;
    }

    /// Orders submitted so far, in submission order
    pub fn orders(&self) -> Vec<OrderConfirmation> {
        self.state.lock().unwrap().orders.clone()
    }
}

#[async_trait]
impl OrderGateway for PaperGateway {
    async fn current_price(&self, symbol: &str) -> Result<f64> {
        let state = self.state.lock().unwrap();
        state
            .prices
            .get(symbol)
            .copied()
            .ok_or_else(|| BotError::VenueUnavailable(format!("no price for {}", symbol)))
    }

    async fn historical_candles(
        &self,
        symbol: &str,
        _interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let state = self.state.lock().unwrap();
        let candles = state
            .candles
            .get(symbol)
            .ok_or_else(|| BotError::VenueUnavailable(format!("no history for {}", symbol)))?;

        let start = candles.len().saturating_sub(limit);
        Ok(candles[start..].to_vec())
    }

    async fn submit_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: f64,
    ) -> Result<OrderConfirmation> {
        let mut state = self.state.lock().unwrap();

        if state.reject_orders {
            return Err(BotError::OrderRejected("rejected by paper venue".to_string()));
        }

        let price = state
            .prices
            .get(symbol)
            .copied()
            .ok_or_else(|| BotError::VenueUnavailable(format!("no price for {}", symbol)))?;

        let confirmation = OrderConfirmation {
            order_id: Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            side,
            quantity,
            price,
            timestamp: Utc::now(),
        };
        state.orders.push(confirmation.clone());

        tracing::info!(
            symbol,
            side = side.as_str(),
            quantity,
            price,
            "Paper order filled"
        );

        Ok(confirmation)
    }
}
