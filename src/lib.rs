pub mod api;
pub mod config;
pub mod messaging;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::api::ApiContext;
use crate::config::{AppConfig, ConfigError};
use crate::messaging::{MessagingError, TwilioClient};
use crate::pipeline::batch::{BatchCoordinator, BatchDispatcher};
use crate::pipeline::processor::{build_processor, ProcessingError};

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Pipeline setup failed: {0}")]
    Processing(#[from] ProcessingError),

    #[error("Messaging setup failed: {0}")]
    Messaging(#[from] MessagingError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub fn run() -> Result<(), StartupError> {
    // Before tracing init so RUST_LOG may come from .env
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    match dotenv {
        Ok(path) => tracing::info!(path = %path.display(), "Loaded environment file"),
        Err(e) if e.not_found() => tracing::debug!("No .env file, using process environment"),
        Err(e) => tracing::warn!(error = %e, "Ignoring unreadable .env file"),
    }

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = AppConfig::from_env()?;
    std::fs::create_dir_all(&config.temp_dir)?;

    // Blocking HTTP clients must be built outside the async runtime.
    let ctx = build_context(&config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(serve(ctx.clone(), &config));
    runtime.shutdown_timeout(config.http_timeout);
    drop(ctx);

    result
}

/// Wire configured services into the shared API context.
pub fn build_context(config: &AppConfig) -> Result<ApiContext, StartupError> {
    let twilio = Arc::new(TwilioClient::new(&config.twilio, config.http_timeout)?);
    let processor = Arc::new(build_processor(config)?);
    let coordinator = Arc::new(BatchCoordinator::new(twilio.clone()));

    let dispatcher = BatchDispatcher::new(
        coordinator,
        processor,
        twilio.clone(),
        twilio,
        config.temp_dir.clone(),
    );
    Ok(ApiContext::new(Arc::new(dispatcher)))
}

async fn serve(ctx: ApiContext, config: &AppConfig) -> Result<(), StartupError> {
    let mut server = api::start_server(ctx.clone(), config.bind_addr).await?;
    tracing::info!(addr = %server.addr, "Listening for Twilio webhooks");

    shutdown_signal().await;
    server.shutdown();
    server.stopped().await;

    drain_batches(&ctx, config.http_timeout).await;
    Ok(())
}

/// Give running batches a chance to finish and send their summaries.
async fn drain_batches(ctx: &ApiContext, grace: Duration) {
    let deadline = Instant::now() + grace;
    loop {
        let pending = ctx.coordinator().in_flight();
        if pending == 0 {
            return;
        }
        if Instant::now() >= deadline {
            tracing::warn!(pending, "Shutting down with batches still in flight");
            return;
        }
        tracing::info!(pending, "Waiting for in-flight batches");
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl-C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
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
        _ = ctrl_c => tracing::info!("Ctrl-C received"),
        _ = terminate => tracing::info!("SIGTERM received"),
    }
}
