//! Ticker Stream Binary
//!
//! Connects to the CryptoCompare streamer, subscribes to the configured
//! tickers and logs every price update until interrupted.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin ticker-stream            # stream prices
//! cargo run --bin ticker-stream -- catalog # print the symbol catalog
//! ```
//!
//! # Environment Variables
//!
//! - `CRYPTOCOMPARE_API_KEY`: streamer API key (default: empty)
//! - `TICKER_STREAM_URL`: streamer URL (default: wss://streamer.cryptocompare.com/v2)
//! - `TICKER_STREAM_CATALOG_URL`: coin list URL
//! - `TICKER_STREAM_QUOTE`: quote currency (default: USD)
//! - `TICKER_STREAM_SYMBOLS`: comma separated tickers (default: BTC,ETH)
//! - `TICKER_STREAM_EVENT_CAPACITY`: broadcast capacity (default: 1024)
//! - `TICKER_STREAM_HTTP_TIMEOUT_SECS`: catalog timeout (default: 30)
//! - `TICKER_STREAM_METRICS_PORT`: Prometheus port, 0 disables (default: 0)
//! - `OTEL_ENABLED`: export spans over OTLP (default: false)
//! - `RUST_LOG`: log filter (default adds `ticker_stream=info`)

use anyhow::Context;
use ticker_stream::{ClientConfig, StreamClient, init_telemetry, install_metrics_exporter};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();

    let _telemetry_guard = init_telemetry().context("failed to initialize telemetry")?;

    let config = ClientConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    if config.metrics_port != 0 {
        let addr = install_metrics_exporter(config.metrics_port)
            .context("failed to start Prometheus exporter")?;
        tracing::info!(%addr, "Prometheus exporter listening");
    }

    let client = StreamClient::from_config(&config)?;

    if std::env::args().nth(1).as_deref() == Some("catalog") {
        return print_catalog(&client).await;
    }

    stream_prices(&client, &config).await
}

/// Fetch the symbol catalog once and print it.
async fn print_catalog(client: &StreamClient) -> anyhow::Result<()> {
    let entries = client.fetch_symbol_catalog().await?;
    for entry in &entries {
        println!("{}\t{}", entry.symbol, entry.full_name);
    }
    tracing::info!(count = entries.len(), "Catalog printed");
    Ok(())
}

/// Stream prices until Ctrl+C, SIGTERM or the streamer closes the session.
async fn stream_prices(client: &StreamClient, config: &ClientConfig) -> anyhow::Result<()> {
    let shutdown_token = CancellationToken::new();

    client.on_connection(|authenticated| {
        if authenticated {
            tracing::info!("Streamer session authenticated");
        } else {
            tracing::error!("Streamer rejected the API key");
        }
        Ok(())
    });

    client.on_price(|tick| {
        tracing::info!(symbol = %tick.symbol, price = %tick.price, "Price");
        Ok(())
    });

    let closed = shutdown_token.clone();
    client.on_close(move || {
        tracing::warn!("Streamer session closed");
        closed.cancel();
        Ok(())
    });

    tracing::info!("Starting ticker stream");
    client.connect().await.context("failed to connect to streamer")?;

    for symbol in &config.symbols {
        client.subscribe(symbol)?;
    }
    tracing::info!(
        symbols = ?config.symbols,
        quote = client.quote(),
        "Subscriptions requested"
    );

    tokio::select! {
        () = await_shutdown() => {}
        () = shutdown_token.cancelled() => {}
    }

    client.close();
    let stats = client.stats();
    tracing::info!(
        frames = stats.frames_received,
        prices = stats.prices_relayed,
        requests = stats.requests_sent,
        "Ticker stream stopped"
    );
    Ok(())
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &ClientConfig) {
    tracing::info!(
        stream_url = %config.stream_url,
        quote = %config.quote,
        symbols = config.symbols.len(),
        metrics_port = config.metrics_port,
        api_key_set = !config.api_key.is_empty(),
        "Configuration loaded"
    );
    tracing::debug!(catalog_url = %config.catalog_url, "Catalog endpoint");
}

/// Wait for SIGTERM or SIGINT.
async fn await_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
