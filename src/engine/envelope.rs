use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::api::OrderGateway;
use crate::error::BotError;
use crate::indicators::calculate_atr;
use crate::models::{Position, Side, Signal};
use crate::position::PositionRegistry;
use crate::Result;

/// ATR envelope tuning, fixed for the process lifetime
#[derive(Debug, Clone)]
pub struct EnvelopeParams {
    pub atr_period: usize,
    /// Take-profit distance in ATR multiples
    pub k_tp: f64,
    /// Stop-loss distance in ATR multiples
    pub k_sl: f64,
    pub candle_interval: String,
}

impl Default for EnvelopeParams {
    fn default() -> Self {
        Self {
            atr_period: 14,
            k_tp: 2.0,
            k_sl: 1.0,
            candle_interval: "1h".to_string(),
        }
    }
}

/// Turns a signal into an entry order with a volatility-adaptive
/// take-profit / stop-loss envelope, and registers the resulting position.
///
/// Order placement and registration are one logical unit: a rejected order
/// never leaves a position behind, and a symbol with an open position is
/// rejected before any order goes out.
pub struct EnvelopeCalculator {
    gateway: Arc<dyn OrderGateway>,
    registry: Arc<PositionRegistry>,
    params: EnvelopeParams,
    // Serializes open() per symbol so the duplicate check, the entry order,
    // and the registry insert are atomic with respect to concurrent signals
    // for the same instrument. Distinct symbols proceed in parallel.
    open_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl EnvelopeCalculator {
    pub fn new(
        gateway: Arc<dyn OrderGateway>,
        registry: Arc<PositionRegistry>,
        params: EnvelopeParams,
    ) -> Self {
        Self {
            gateway,
            registry,
            params,
            open_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Open a position for a signal: fetch price and history, compute the
    /// ATR envelope, submit the entry order, register the position.
    pub async fn open(&self, signal: Signal) -> Result<Position> {
        let lock = self.symbol_lock(&signal.symbol).await;
        let _guard = lock.lock().await;

        if self.registry.contains(&signal.symbol) {
            return Err(BotError::DuplicatePosition(signal.symbol));
        }

        let entry_price = self.gateway.current_price(&signal.symbol).await?;
        let candles = self
            .gateway
            .historical_candles(
                &signal.symbol,
                &self.params.candle_interval,
                self.params.atr_period + 1,
            )
            .await?;
        let atr = calculate_atr(&candles, self.params.atr_period)?;

        // A zero-range history gives a degenerate envelope that could not
        // straddle the entry price
        if atr <= 0.0 {
            return Err(BotError::InsufficientData(format!(
                "history for {} has zero range",
                signal.symbol
            )));
        }

        let (take_profit, stop_loss) = match signal.side {
            Side::Buy => (
                entry_price + self.params.k_tp * atr,
                entry_price - self.params.k_sl * atr,
            ),
            Side::Sell => (
                entry_price - self.params.k_tp * atr,
                entry_price + self.params.k_sl * atr,
            ),
        };

        let confirmation = self
            .gateway
            .submit_market_order(&signal.symbol, signal.side, signal.quantity)
            .await?;

        let position = Position {
            symbol: signal.symbol,
            direction: signal.side.into(),
            entry_price,
            quantity: signal.quantity,
            take_profit,
            stop_loss,
            opened_at: Utc::now(),
        };
        self.registry.insert(position.clone())?;

        tracing::info!(
            symbol = %position.symbol,
            side = signal.side.as_str(),
            entry_price,
            atr,
            take_profit,
            stop_loss,
            order_id = %confirmation.order_id,
            "Position opened"
        );

        Ok(position)
    }

    async fn symbol_lock(&self, symbol: &str) -> Arc<Mutex<()>> {
        let mut locks = self.open_locks.lock().await;
        locks.entry(symbol.to_string()).or_default().clone()
    }
}
