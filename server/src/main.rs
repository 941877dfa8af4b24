use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use relay_server::config::{generate_config_template, Config};
use relay_server::relay::{retention, RelayService};
use relay_server::{routes, state};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("relay_server=info"));
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(env_filter)
            .init();
    }

    tracing::info!("Relay server v{} starting", env!("CARGO_PKG_VERSION"));

    let relay = Arc::new(RelayService::new(
        config.retention.max_messages_per_channel,
    ));

    retention::spawn_retention_cleanup(
        relay.clone(),
        config.retention.max_age_secs,
        config.retention.cleanup_interval_secs,
    );

    let app_state = state::AppState::new(relay, config.connections.clone());
    let app = routes::build_router(app_state);

    // Bind and serve
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("WebSocket server running on ws://{}", addr);
    tracing::info!("Health check available at http://{}/health", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
