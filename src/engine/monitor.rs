use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::api::OrderGateway;
use crate::models::ExitReason;
use crate::position::PositionRegistry;
use crate::Result;

/// Polls the venue for every open position and closes those whose price has
/// reached the take-profit or stop-loss bound.
///
/// Per-symbol failures (stale venue, rejected closing order) are logged and
/// the position stays registered, so the next tick re-evaluates it. The
/// closing order always goes out before the position is removed: a submitted
/// closure is never lost, a failed one is never recorded.
pub struct PositionMonitor {
    gateway: Arc<dyn OrderGateway>,
    registry: Arc<PositionRegistry>,
    poll_interval: Duration,
}

impl PositionMonitor {
    pub fn new(
        gateway: Arc<dyn OrderGateway>,
        registry: Arc<PositionRegistry>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            gateway,
            registry,
            poll_interval,
        }
    }

    /// Run until the shutdown channel fires. Cancellation is checked between
    /// ticks; a tick in progress finishes its current symbol first.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval_secs = self.poll_interval.as_secs(), "Position monitor started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown.changed() => {
                    tracing::info!("Position monitor stopping");
                    break;
                }
            }
        }
    }

    /// One evaluation pass over a snapshot of the tracked symbols.
    ///
    /// Returns the closures performed this tick.
    pub async fn tick(&self) -> Vec<(String, ExitReason)> {
        let mut closed = Vec::new();

        for symbol in self.registry.snapshot_symbols() {
            match self.evaluate(&symbol).await {
                Ok(Some(reason)) => closed.push((symbol, reason)),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(
                        symbol = %symbol,
                        error = %err,
                        "Monitor pass failed; position stays open for next tick"
                    );
                }
            }
        }

        closed
    }

    async fn evaluate(&self, symbol: &str) -> Result<Option<ExitReason>> {
        // The position may have been closed between the snapshot and now
        let Some(position) = self.registry.get(symbol) else {
            return Ok(None);
        };

        let price = self.gateway.current_price(symbol).await?;
        let Some(reason) = position.exit_reason(price) else {
            return Ok(None);
        };

        // Close with the originally opened size, opposite side
        self.gateway
            .submit_market_order(symbol, position.direction.closing_side(), position.quantity)
            .await?;
        self.registry.remove(symbol)?;

        tracing::info!(
            symbol,
            price,
            entry_price = position.entry_price,
            reason = ?reason,
            "Position closed"
        );

        Ok(Some(reason))
    }
}
