use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use voxbridge::application::{IdentifierOnlySource, SessionRunner, SessionTimeouts};
use voxbridge::config::Config;
use voxbridge::domain::SessionRegistry;
use voxbridge::infrastructure::ai::{AiLegConfig, RealtimeConnector};
use voxbridge::infrastructure::directory::HttpDirectoryClient;
use voxbridge::infrastructure::telephony::TelephonyServer;
use voxbridge::interface::api::build_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!("Starting voxbridge");

    // Load configuration
    let config_path = std::env::args().nth(1);
    let config = match &config_path {
        Some(path) => Config::load(Path::new(path))?,
        None => Config::from_env(),
    };
    if config.ai.api_key.is_empty() {
        warn!("No AI API key configured; AI leg handshakes will fail");
    }

    let registry = SessionRegistry::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Per-call orchestrator shared across trunk connections
    let runner = Arc::new(SessionRunner::new(
        registry.clone(),
        Arc::new(HttpDirectoryClient::new(config.directory.base_url.clone())),
        Arc::new(IdentifierOnlySource),
        Arc::new(RealtimeConnector::new(AiLegConfig {
            url: config.ai.url.clone(),
            api_key: config.ai.api_key.clone(),
            connect_attempts: config.ai.connect_attempts,
            voice: config.ai.voice.clone(),
        })),
        SessionTimeouts {
            setup: std::time::Duration::from_secs(config.session.setup_timeout_secs),
            idle: std::time::Duration::from_secs(config.session.idle_timeout_secs),
        },
        shutdown_rx.clone(),
    ));

    // Trunk listener
    let telephony_addr = format!(
        "{}:{}",
        config.telephony.bind_address, config.telephony.bind_port
    )
    .parse()?;
    let telephony = TelephonyServer::new(telephony_addr, runner);
    let telephony_task = tokio::spawn(async move { telephony.run(shutdown_rx).await });

    // Monitoring API
    let api_addr = format!("{}:{}", config.server.host, config.server.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("Monitoring API listening on {}", api_addr);
    let api_registry = registry.clone();
    let api_task = tokio::spawn(async move {
        axum::serve(api_listener, build_router(api_registry)).await
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    let _ = shutdown_tx.send(true);
    let _ = telephony_task.await?;

    // Bridges hang up their trunks on the shutdown signal; give them a
    // bounded window to drain before exiting
    let drain = async {
        while registry.active_count().await > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    };
    if tokio::time::timeout(std::time::Duration::from_secs(5), drain)
        .await
        .is_err()
    {
        warn!(
            "Exiting with {} session(s) still draining",
            registry.active_count().await
        );
    }
    api_task.abort();

    Ok(())
}
