use std::time::Duration;

use anyhow::Context;

use crate::engine::EnvelopeParams;

/// Binance API credentials; absent means the process runs against the paper
/// venue
#[derive(Debug, Clone)]
pub struct BinanceCredentials {
    pub api_key: String,
    pub api_secret: String,
    /// Override for the spot testnet
    pub base_url: Option<String>,
}

/// Process configuration, read from the environment once at startup and
/// immutable afterwards. A malformed value here is the only thing allowed to
/// terminate the process.
#[derive(Debug, Clone)]
pub struct Config {
    pub envelope: EnvelopeParams,
    pub monitor_interval: Duration,
    pub default_quantity: f64,
    pub listen_port: u16,
    pub binance: Option<BinanceCredentials>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let envelope = EnvelopeParams {
            atr_period: parse_env("ATR_PERIOD", 14)?,
            k_tp: parse_env("ATR_MULTIPLIER_TP", 2.0)?,
            k_sl: parse_env("ATR_MULTIPLIER_SL", 1.0)?,
            candle_interval: std::env::var("CANDLE_INTERVAL").unwrap_or_else(|_| "1h".to_string()),
        };
        anyhow::ensure!(envelope.atr_period > 0, "ATR_PERIOD must be positive");
        anyhow::ensure!(
            envelope.k_tp > 0.0 && envelope.k_sl > 0.0,
            "ATR multipliers must be positive"
        );

        let monitor_interval = Duration::from_secs(parse_env("MONITOR_INTERVAL_SECS", 10u64)?);
        let default_quantity = parse_env("DEFAULT_QUANTITY", 0.001)?;
        anyhow::ensure!(default_quantity > 0.0, "DEFAULT_QUANTITY must be positive");
        let listen_port = parse_env("LISTEN_PORT", 5000u16)?;

        let binance = match (
            std::env::var("BINANCE_API_KEY"),
            std::env::var("BINANCE_API_SECRET"),
        ) {
            (Ok(api_key), Ok(api_secret)) => Some(BinanceCredentials {
                api_key,
                api_secret,
                base_url: std::env::var("BINANCE_BASE_URL").ok(),
            }),
            _ => None,
        };

        Ok(Self {
            envelope,
            monitor_interval,
            default_quantity,
            listen_port,
            binance,
        })
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("invalid value for {}: {}", name, value)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        // Environment is shared across the test binary, so only assert on
        // variables no other test touches
        let config = Config::from_env().unwrap();

        assert_eq!(config.envelope.atr_period, 14);
        assert_eq!(config.envelope.k_tp, 2.0);
        assert_eq!(config.envelope.k_sl, 1.0);
        assert_eq!(config.monitor_interval, Duration::from_secs(10));
        assert_eq!(config.default_quantity, 0.001);
    }
}
