use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use charter_api::{app, worker, AppState, AuthConfig};
use charter_store::{Backends, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "charter_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Charter API on port {}", config.server.port);

    let backends = Backends::connect(&config)
        .await
        .context("Failed to connect backends")?;

    if config.auth.webhook_secret.is_none() {
        tracing::warn!("auth.webhook_secret is not set; the payment webhook will answer 503");
    }

    let app_state = AppState::new(
        backends,
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            webhook_secret: config.auth.webhook_secret.clone(),
        },
        config.workflow.settings(),
        config.chat.settings(),
    );

    // Repair anything a crash left half-written before taking traffic
    worker::reconcile_once(&app_state.reconciler).await;
    if config.reconciliation.interval_seconds > 0 {
        tokio::spawn(worker::start_reconciliation_worker(
            app_state.reconciler.clone(),
            Duration::from_secs(config.reconciliation.interval_seconds),
        ));
    }

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}
