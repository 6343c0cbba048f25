use anyhow::{Context, Result};
use connector_hub::api::{create_router, ApiState};
use connector_hub::{ConnectorContext, ConnectorPool};
use std::sync::Arc;
use toolgate::config::{apply_env_overrides, load_config};
use toolgate::credentials::{CredentialStore, ProcessEnv, SqliteCredentialStore};
use toolgate::http::build_http_client;
use toolgate::token::TokenOptions;
use toolgate::{CredentialResolver, GatewayConfig};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "connector_hub=info,toolgate=info".into()),
        )
        .init();

    info!("Connector Hub starting...");

    // Config file is optional; environment variables override it
    let mut config = match std::env::var("TOOLGATE_CONFIG") {
        Ok(path) => load_config(&path)?,
        Err(_) => GatewayConfig::default(),
    };
    apply_env_overrides(&mut config, &ProcessEnv);

    let encryption_key = std::env::var("TOOLGATE_ENCRYPTION_KEY").ok();
    if encryption_key.is_none() {
        if config.credentials.encrypt_at_rest {
            anyhow::bail!(
                "credentials.encrypt_at_rest is enabled but TOOLGATE_ENCRYPTION_KEY is not set"
            );
        }
        warn!("TOOLGATE_ENCRYPTION_KEY not set; encrypted credentials cannot be read");
    }

    info!(
        strict = config.credentials.strict,
        credentials_db = %config.credentials.db_path,
        api_port = config.api.port,
        "Configuration loaded"
    );

    let store: Arc<dyn CredentialStore> = Arc::new(
        SqliteCredentialStore::new(&config.credentials.db_path, encryption_key.as_deref())
            .context("Failed to initialize credential store")?,
    );
    info!("Credential store initialized");

    let http = build_http_client(&config.http)?;
    let resolver = CredentialResolver::new(
        Arc::clone(&store),
        config.source_mode(),
        Arc::new(ProcessEnv),
    );
    let context = ConnectorContext::new(http, Arc::clone(&store), TokenOptions::from(&config));
    let pool = Arc::new(ConnectorPool::new(resolver, context));

    // Start HTTP API server
    let router = create_router(ApiState { pool, store });
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.api.port))
        .await
        .context("Failed to bind connector API port")?;
    info!(port = config.api.port, "Connector API listening");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "Connector API server error");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    server_handle.abort();
    info!("Connector Hub stopped");

    Ok(())
}
