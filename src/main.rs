use anyhow::Result;
use image_relay::config::Config;
use image_relay::orchestrator::Orchestrator;
use image_relay::server::{router, AppState};
use image_relay::storage::{S3BlobStore, Uploader};
use image_relay::transform::{CodecRegistry, TransformEngine};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "image_relay=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load();
    info!("Starting image-relay");

    if let Err(e) = run(config).await {
        error!("Server failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(config: Config) -> Result<()> {
    let engine = TransformEngine::new(&config.transform_config(), &CodecRegistry::default())?;

    let store = S3BlobStore::new(config.s3_config()).await?;
    let uploader = Uploader::new(Arc::new(store), &config.bucket_config())?;
    let orchestrator = Orchestrator::new(engine, uploader, config.max_concurrent_requests())?;

    let app = router(
        AppState {
            orchestrator,
            request_timeout: config.request_timeout(),
        },
        config.max_upload_bytes,
    );

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(
        "Listening on {} (images: {}, thumbnails: {}, thumbnail bounds: {}x{})",
        address, config.image_bucket, config.thumbnail_bucket, config.max_width, config.max_height
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
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
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
