use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use snip_crypto::{AesGcmCryptographer, IdentityCodec};
use snip_generator::HashGenerator;
use snip_gateway::config::Cli;
use snip_gateway::{App, AppState};
use snip_shortener::ShortenerService;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Cli::parse().into_settings()?;
    snip_telemetry::init(settings.log_format)?;

    if settings.ephemeral_key {
        warn!("no encryption key configured, identities will not survive a restart");
    }

    let repository = snip_storage::open(&settings.storage)
        .await
        .context("failed to open storage")?;
    let shortener = ShortenerService::new(Arc::clone(&repository), HashGenerator, &settings.base_url);
    let identity = IdentityCodec::new(AesGcmCryptographer::new(&settings.encryption_key));
    let app = App::router(AppState::new(Arc::new(shortener), identity));

    let listener = tokio::net::TcpListener::bind(&settings.server_address)
        .await
        .with_context(|| format!("failed to bind {}", settings.server_address))?;
    info!(
        listen_addr = %listener.local_addr()?,
        base_url = %settings.base_url,
        "starting gateway server"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down, closing storage");
    repository.close().await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
