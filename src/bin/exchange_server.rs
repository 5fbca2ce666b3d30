//! Demo Exchange Server
//!
//! Drives the matching engine with simulated traders and reports live
//! metrics. Transport is out of scope for the core; this binary exists to
//! exercise the full pipeline end to end.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info};

use spot_exchange_engine::engine::{AssetHolding, Exchange, OrderRequest, Side, UserInit};
use spot_exchange_engine::metrics::MetricsReporter;

const ASSETS: [&str; 3] = ["COIN", "GAME", "BOLT"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Starting demo exchange server...");

    if let Err(e) = start_metrics_exporter() {
        error!("Failed to start metrics exporter: {}", e);
    }

    let exchange = Arc::new(Exchange::new());

    // Two funded traders per asset
    let mut users = Vec::new();
    for asset in &ASSETS {
        for role in ["maker", "taker"] {
            users.push(UserInit {
                user_id: format!("{}-{}", role, asset.to_lowercase()),
                cash: 10_000_000,
                assets: vec![AssetHolding {
                    asset_id: asset.to_string(),
                    size: 10_000,
                }],
            });
        }
    }
    exchange.init_users(users);
    info!("Initialized {} traders across {} assets", ASSETS.len() * 2, ASSETS.len());

    let reporter = MetricsReporter::new(exchange.metrics(), Duration::from_secs(5));
    tokio::spawn(async move {
        reporter.run().await;
    });

    let mut producers = Vec::new();
    for asset in &ASSETS {
        let exchange = Arc::clone(&exchange);
        let asset = asset.to_string();
        producers.push(tokio::spawn(async move {
            simulate_market_activity(exchange, asset).await;
        }));
    }

    let stats_exchange = Arc::clone(&exchange);
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(10));
        loop {
            interval.tick().await;
            for asset in &ASSETS {
                let asset = asset.to_string();
                let (bids, asks) = stats_exchange.resting_orders(&asset);
                info!("{} | resting bids: {} | resting asks: {}", asset, bids, asks);
            }
        }
    });

    info!("Exchange server is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down exchange server...");
    for producer in producers {
        producer.abort();
    }
    exchange.close().await;

    let metrics = exchange.metrics();
    info!(
        "Final totals: {} orders submitted, {} trades, {} units",
        metrics.orders_submitted(),
        metrics.trades_executed(),
        metrics.total_volume()
    );

    Ok(())
}

/// Submit a steady mix of crossing and resting limit orders for one asset.
async fn simulate_market_activity(exchange: Arc<Exchange>, asset: String) {
    let maker = format!("maker-{}", asset.to_lowercase());
    let taker = format!("taker-{}", asset.to_lowercase());
    let base_price: u64 = 10_000;

    let mut interval = interval(Duration::from_millis(10));
    let mut tick: u64 = 0;

    loop {
        interval.tick().await;
        tick += 1;

        let offset = tick % 20;
        let (user, request) = match tick % 4 {
            // resting ask above the market
            0 => (
                &maker,
                OrderRequest {
                    asset_id: asset.clone(),
                    side: Side::Sell,
                    limit: base_price + offset,
                    size: 5 + tick % 10,
                },
            ),
            // resting bid below the market
            1 => (
                &maker,
                OrderRequest {
                    asset_id: asset.clone(),
                    side: Side::Buy,
                    limit: base_price - offset - 1,
                    size: 5 + tick % 10,
                },
            ),
            // crossing buy: sweeps the cheapest asks
            2 => (
                &taker,
                OrderRequest {
                    asset_id: asset.clone(),
                    side: Side::Buy,
                    limit: base_price + offset,
                    size: 3 + tick % 7,
                },
            ),
            // crossing sell: hits the best bids
            _ => (
                &taker,
                OrderRequest {
                    asset_id: asset.clone(),
                    side: Side::Sell,
                    limit: base_price - offset - 1,
                    size: 3 + tick % 7,
                },
            ),
        };

        if let Err(e) = exchange.submit_order(user, request).await {
            // simulated traders eventually run out of one side; slow down
            error!("{}: submission rejected: {}", asset, e);
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }
}

/// Install the Prometheus recorder with its scrape endpoint.
fn start_metrics_exporter() -> Result<(), Box<dyn std::error::Error>> {
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::net::SocketAddr;

    let addr: SocketAddr = "0.0.0.0:9090".parse()?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Prometheus metrics available at http://{}/metrics", addr);
    Ok(())
}
