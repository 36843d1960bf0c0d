use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;

use super::OrderGateway;
use crate::error::BotError;
use crate::models::{Candle, OrderConfirmation, Side};
use crate::Result;

// Binance Spot REST API
// Docs: https://binance-docs.github.io/apidocs/spot/en/
const BINANCE_API_BASE: &str = "https://api.binance.com";

type HmacSha256 = Hmac<Sha256>;

/// Client for the Binance spot API
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    #[allow(dead_code)]
    symbol: String,
    price: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_id: i64,
    symbol: String,
    #[allow(dead_code)]
    status: String,
    #[serde(default)]
    fills: Vec<FillData>,
}

#[derive(Debug, Deserialize)]
struct FillData {
    price: String,
    qty: String,
}

impl BinanceClient {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self::with_base_url(BINANCE_API_BASE, api_key, api_secret)
    }

    /// Create a client against a non-default base URL (spot testnet, tests)
    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// HMAC-SHA256 signature over the query string, hex encoded
    fn sign(&self, query: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .expect("HMAC accepts keys of any size");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn parse_kline_row(row: &[serde_json::Value]) -> Result<Candle> {
        let open_time = row
            .first()
            .and_then(|v| v.as_i64())
            .ok_or_else(|| BotError::VenueUnavailable("malformed kline row".to_string()))?;
        let timestamp = Utc
            .timestamp_millis_opt(open_time)
            .single()
            .ok_or_else(|| BotError::VenueUnavailable("kline timestamp out of range".to_string()))?;

        Ok(Candle {
            timestamp,
            open: parse_field(row, 1)?,
            high: parse_field(row, 2)?,
            low: parse_field(row, 3)?,
            close: parse_field(row, 4)?,
            volume: parse_field(row, 5)?,
        })
    }
}

/// Klines encode prices as decimal strings inside positional arrays
fn parse_field(row: &[serde_json::Value], index: usize) -> Result<f64> {
    row.get(index)
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| BotError::VenueUnavailable(format!("malformed kline field {}", index)))
}

#[async_trait]
impl OrderGateway for BinanceClient {
    async fn current_price(&self, symbol: &str) -> Result<f64> {
        let url = format!("{}/api/v3/ticker/price?symbol={}", self.base_url, symbol);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(BotError::VenueUnavailable(format!(
                "ticker request failed with status {}",
                response.status()
            )));
        }

        let ticker: TickerResponse = response.json().await?;
        ticker
            .price
            .parse::<f64>()
            .map_err(|_| BotError::VenueUnavailable(format!("unparseable price: {}", ticker.price)))
    }

    async fn historical_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url, symbol, interval, limit
        );

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(BotError::VenueUnavailable(format!(
                "klines request failed with status {}",
                response.status()
            )));
        }

        let rows: Vec<Vec<serde_json::Value>> = response.json().await?;
        rows.iter().map(|row| Self::parse_kline_row(row)).collect()
    }

    async fn submit_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: f64,
    ) -> Result<OrderConfirmation> {
        let side_param = match side {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        };
        let timestamp = Utc::now().timestamp_millis();

        let query = format!(
            "symbol={}&side={}&type=MARKET&quantity={}&timestamp={}",
            symbol, side_param, quantity, timestamp
        );
        let signature = self.sign(&query);
        let url = format!(
            "{}/api/v3/order?{}&signature={}",
            self.base_url, query, signature
        );

        let response = self
            .client
            .post(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // 4xx means the venue understood and declined; everything else is
            // a transport-level failure worth retrying
            if status.is_client_error() {
                return Err(BotError::OrderRejected(body));
            }
            return Err(BotError::VenueUnavailable(format!(
                "order request failed with status {}: {}",
                status, body
            )));
        }

        let order: OrderResponse = response.json().await?;

        // Average fill price; fall back to 0.0 when the venue omits fills
        let fill_price = if order.fills.is_empty() {
            0.0
        } else {
            let (total_quote, total_qty) = order.fills.iter().fold((0.0, 0.0), |(quote, qty), f| {
                let price = f.price.parse::<f64>().unwrap_or(0.0);
                let fill_qty = f.qty.parse::<f64>().unwrap_or(0.0);
                (quote + price * fill_qty, qty + fill_qty)
            });
            if total_qty > 0.0 {
                total_quote / total_qty
            } else {
                0.0
            }
        };

        tracing::info!(
            symbol = %order.symbol,
            side = side.as_str(),
            quantity,
            order_id = order.order_id,
            "Market order accepted by venue"
        );

        Ok(OrderConfirmation {
            order_id: order.order_id.to_string(),
            symbol: order.symbol,
            side,
            quantity,
            price: fill_price,
            timestamp: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(server: &mockito::ServerGuard) -> BinanceClient {
        BinanceClient::with_base_url(server.url(), "test-key", "test-secret")
    }

    #[tokio::test]
    async fn test_current_price() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/api/v3/ticker/price?symbol=BTCUSDT")
            .with_status(200)
            .with_body(r#"{"symbol":"BTCUSDT","price":"43210.50"}"#)
            .create_async()
            .await;

        let client = test_client(&server);
        let price = client.current_price("BTCUSDT").await.unwrap();

        assert_eq!(price, 43210.50);
    }

    #[tokio::test]
    async fn test_current_price_venue_down() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/api/v3/ticker/price?symbol=BTCUSDT")
            .with_status(502)
            .create_async()
            .await;

        let client = test_client(&server);
        let result = client.current_price("BTCUSDT").await;

        assert!(matches!(result, Err(BotError::VenueUnavailable(_))));
    }

    #[tokio::test]
    async fn test_historical_candles() {
        let mut server = mockito::Server::new_async().await;
        let body = r#"[
            [1700000000000,"100.0","105.0","95.0","102.0","1234.5",1700003599999,"0",10,"0","0","0"],
            [1700003600000,"102.0","110.0","98.0","105.0","2345.6",1700007199999,"0",12,"0","0","0"]
        ]"#;
        let _m = server
            .mock("GET", "/api/v3/klines?symbol=BTCUSDT&interval=1h&limit=2")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let client = test_client(&server);
        let candles = client
            .historical_candles("BTCUSDT", "1h", 2)
            .await
            .unwrap();

        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].open, 100.0);
        assert_eq!(candles[0].high, 105.0);
        assert_eq!(candles[1].close, 105.0);
        assert!(candles[0].timestamp < candles[1].timestamp);
    }

    #[tokio::test]
    async fn test_order_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", mockito::Matcher::Regex("^/api/v3/order".to_string()))
            .with_status(400)
            .with_body(r#"{"code":-2010,"msg":"Account has insufficient balance"}"#)
            .create_async()
            .await;

        let client = test_client(&server);
        let result = client.submit_market_order("BTCUSDT", Side::Buy, 0.001).await;

        match result {
            Err(BotError::OrderRejected(msg)) => assert!(msg.contains("insufficient balance")),
            other => panic!("expected OrderRejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_order_accepted() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", mockito::Matcher::Regex("^/api/v3/order".to_string()))
            .with_status(200)
            .with_body(
                r#"{"orderId":12345,"symbol":"BTCUSDT","status":"FILLED",
                    "fills":[{"price":"43000.0","qty":"0.001","commission":"0","commissionAsset":"BTC"}]}"#,
            )
            .create_async()
            .await;

        let client = test_client(&server);
        let confirmation = client
            .submit_market_order("BTCUSDT", Side::Buy, 0.001)
            .await
            .unwrap();

        assert_eq!(confirmation.order_id, "12345");
        assert_eq!(confirmation.price, 43000.0);
        assert_eq!(confirmation.side, Side::Buy);
    }

    #[test]
    fn test_signature_is_deterministic() {
        let client = BinanceClient::new("key", "secret");
        let a = client.sign("symbol=BTCUSDT&side=BUY");
        let b = client.sign("symbol=BTCUSDT&side=BUY");

        assert_eq!(a, b);
        assert_eq!(a.len(), 64); // hex-encoded SHA-256
    }
}
