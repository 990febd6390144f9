use memkana::prelude::*;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "memkana=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting memkana v{}", env!("CARGO_PKG_VERSION"));

    let server = match start().await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to start: {}", e);
            std::process::exit(1);
        }
    };

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                std::process::exit(1);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }
}

/// Loads configuration, connects to Postgres and binds the listener.
async fn start() -> Result<MemkanaServer<PgStore, JsonCodec>, MemkanaError> {
    let config = ServerConfig::from_env()?;
    let store_config = StoreConfig::from_env()?;

    let store = PgStore::connect(&store_config, config.retry).await?;
    store.ensure_schema().await?;

    let server = MemkanaServerBuilder::new().config(&config).build(store).await?;
    info!("Listening on {}", config.bind);
    Ok(server)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    // docker stop sends SIGTERM
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
