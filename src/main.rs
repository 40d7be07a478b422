use actix_web::{web, App, HttpServer};
use std::env;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

use kraken_agent_rs::api;
use kraken_agent_rs::config::Settings;
use kraken_agent_rs::decision::HttpDecisionClient;
use kraken_agent_rs::exchange::{KrakenFuturesClient, RequestDispatcher, ReqwestTransport};
use kraken_agent_rs::orchestrator::CycleOrchestrator;

fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    if env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load environment variables
    dotenv::dotenv().ok();
    init_tracing();

    let settings = Settings::new()?;
    let base_url = settings.exchange.resolved_base_url();
    info!(
        base_url = %base_url,
        symbol = %settings.agent.symbol,
        interval_secs = settings.agent.interval_secs,
        "Starting Kraken futures decision agent"
    );

    let credentials = settings.exchange.credentials()?;
    let mut dispatcher =
        RequestDispatcher::new(base_url, credentials, Arc::new(ReqwestTransport::new()))?;
    if let Some(limiter) = settings.exchange.rate_limiter() {
        dispatcher = dispatcher.with_rate_limit(limiter);
    }
    let client = Arc::new(KrakenFuturesClient::new(dispatcher));
    let decision = Arc::new(HttpDecisionClient::new(&settings.decision)?);

    let mut orchestrator = CycleOrchestrator::new(
        client,
        decision,
        settings.agent.symbol.clone(),
        settings.agent.interval(),
    );

    // --- Status API ---
    let server_handle = match settings.agent.port {
        Some(port) => {
            let bind_address = format!("0.0.0.0:{}", port);
            info!("Starting status API on {}", bind_address);
            let history = orchestrator.history();
            let server = HttpServer::new(move || {
                App::new()
                    .app_data(web::Data::new(history.clone()))
                    .configure(api::config)
            })
            .disable_signals()
            .bind(&bind_address)?
            .run();
            let handle = server.handle();
            tokio::spawn(async move {
                if let Err(e) = server.await {
                    error!("Status API stopped: {}", e);
                }
            });
            Some(handle)
        }
        None => None,
    };

    // --- Shutdown ---
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received, finishing current cycle"),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    let cycles = orchestrator
        .run_until(async {
            let _ = shutdown_rx.await;
        })
        .await;

    if let Some(handle) = server_handle {
        handle.stop(true).await;
    }
    info!(cycles, "Agent stopped");
    Ok(())
}
