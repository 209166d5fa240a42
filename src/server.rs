use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Json, Router, http::StatusCode, response::IntoResponse};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::agent::CodexProvider;
use crate::api::{self, AppState};
use crate::config::Config;
use crate::preview::ShopifyPreview;
use crate::sessions::SessionRegistry;
use crate::tasks::BackgroundTasks;
use crate::theme::ShopifyCli;
use crate::webhook::WebhookNotifier;
use crate::workflow::{Orchestrator, WorkflowSettings};

/// Wire the production collaborators from `config`.
pub fn build_orchestrator(config: &Config) -> Result<Arc<Orchestrator>> {
    let cli = ShopifyCli::new(
        config.shopify_cmd.clone(),
        config.store.clone(),
        config.pull_timeout,
    );
    let provider = CodexProvider::new(config.codex_cmd.clone());
    let preview = ShopifyPreview::new(
        config.shopify_cmd.clone(),
        config.store.clone(),
        config.preview_port,
    );
    let notifier = WebhookNotifier::new(config.webhook.clone(), config.session_id.clone())
        .context("Failed to initialise webhook notifier")?;

    Ok(Arc::new(Orchestrator::new(
        Arc::new(cli),
        Arc::new(SessionRegistry::new(Arc::new(provider))),
        Arc::new(preview),
        Arc::new(notifier),
        BackgroundTasks::new(),
        WorkflowSettings::from_config(config),
    )))
}

/// Build the full application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    api::api_router()
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": "Not found"})),
    )
}

/// Serve until Ctrl+C, then wait for in-flight background work.
pub async fn start_server(port: u16, orchestrator: Arc<Orchestrator>) -> Result<()> {
    let state = Arc::new(AppState {
        orchestrator: orchestrator.clone(),
    });
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "theme-relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    let in_flight = orchestrator.tasks().in_flight();
    if in_flight > 0 {
        info!(in_flight, "waiting for background tasks");
    }
    orchestrator.tasks().wait_idle().await;
    info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
