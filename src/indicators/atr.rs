/// Average True Range (ATR) indicator
///
/// Measures market volatility by averaging true ranges over a period.
/// True Range is the greatest of:
/// - Current High - Current Low
/// - Abs(Current High - Previous Close)
/// - Abs(Current Low - Previous Close)
///
/// The first candle has no previous close and is excluded from true-range
/// computation, so `period + 1` candles is the minimum input.
use crate::error::BotError;
use crate::models::Candle;
use crate::Result;

/// Calculate ATR for the given candles
///
/// Candles must be ordered oldest-to-newest. Returns the arithmetic mean of
/// the trailing `period` true ranges ending at the most recent candle, or
/// `InsufficientData` when fewer than `period + 1` candles are available.
pub fn calculate_atr(candles: &[Candle], period: usize) -> Result<f64> {
    if candles.len() < period + 1 {
        return Err(BotError::InsufficientData(format!(
            "have {} candles, need {}",
            candles.len(),
            period + 1
        )));
    }

    // Calculate true ranges, skipping the first candle
    let mut true_ranges = Vec::with_capacity(candles.len() - 1);
    for i in 1..candles.len() {
        let high = candles[i].high;
        let low = candles[i].low;
        let prev_close = candles[i - 1].close;

        let tr = (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs());

        true_ranges.push(tr);
    }

    // Mean of the trailing `period` true ranges
    let tail = &true_ranges[true_ranges.len() - period..];
    let atr = tail.iter().sum::<f64>() / period as f64;

    Ok(atr)
}
