use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::{net::TcpListener, signal};
use tracing_subscriber::EnvFilter;

use papertext::{
    acl::DatabaseAccessControl, auth::jwt::JwtService, config::AppConfig, db, routes,
    state::AppState, storage::S3Storage,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "server",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        s3_bucket = %config.s3_bucket,
        auto_parsing_delay = %config.auto_parsing_delay,
        "loaded backend configuration"
    );
    db::warn_on_unsupported_backend(&config);

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    db::run_migrations(&pool)?;

    let storage = Arc::new(S3Storage::from_config(&config).await?);
    let acl = Arc::new(DatabaseAccessControl::new(pool.clone()));
    let jwt = JwtService::from_config(&config)?;

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port)
        .parse()
        .context("invalid SERVER_HOST/SERVER_PORT")?;

    let state = AppState::new(pool, config, storage, acl, jwt);
    let app = routes::create_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
    tracing::info!("server received shutdown signal");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
