use std::sync::Arc;

use signalbot::api::{BinanceClient, OrderGateway, PaperGateway};
use signalbot::config::Config;
use signalbot::engine::{EnvelopeCalculator, PositionMonitor};
use signalbot::position::PositionRegistry;
use signalbot::server::{run_server, AppState};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    tracing::info!("🚀 SignalBot starting");

    let config = Config::from_env()?;
    tracing::info!("\n📊 Configuration:");
    tracing::info!("  ATR period: {}", config.envelope.atr_period);
    tracing::info!(
        "  Envelope: +{}×ATR take-profit / -{}×ATR stop-loss",
        config.envelope.k_tp,
        config.envelope.k_sl
    );
    tracing::info!("  Candle interval: {}", config.envelope.candle_interval);
    tracing::info!("  Monitor interval: {:?}", config.monitor_interval);
    tracing::info!("  Default quantity: {}", config.default_quantity);
    tracing::info!("  Listen port: {}", config.listen_port);

    let gateway: Arc<dyn OrderGateway> = match &config.binance {
        Some(creds) => {
            tracing::info!("  Venue: Binance (live)");
            match &creds.base_url {
                Some(base) => Arc::new(BinanceClient::with_base_url(
                    base,
                    &creds.api_key,
                    &creds.api_secret,
                )),
                None => Arc::new(BinanceClient::new(&creds.api_key, &creds.api_secret)),
            }
        }
        None => {
            tracing::warn!("  Venue: paper (no BINANCE_API_KEY/SECRET configured)");
            Arc::new(PaperGateway::new())
        }
    };

    let registry = Arc::new(PositionRegistry::new());
    let engine = Arc::new(EnvelopeCalculator::new(
        gateway.clone(),
        registry.clone(),
        config.envelope.clone(),
    ));
    let monitor = PositionMonitor::new(gateway, registry.clone(), config.monitor_interval);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let monitor_task = {
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { monitor.run(shutdown).await })
    };

    let server_task = {
        let state = AppState {
            engine,
            registry,
            default_quantity: config.default_quantity,
        };
        let port = config.listen_port;
        let shutdown = shutdown_rx;
        tokio::spawn(async move { run_server(state, port, shutdown).await })
    };

    tracing::info!("✅ Monitor and webhook server running. Press Ctrl+C to stop...\n");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("\n⚠️  Received Ctrl+C, shutting down...");
        }
        result = server_task => {
            tracing::error!("Webhook server exited: {:?}", result);
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = monitor_task.await;

    tracing::info!("👋 SignalBot stopped");
    Ok(())
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signalbot=info".into()),
        )
        .init();
}
