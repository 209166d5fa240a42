//! Shared helpers for integration tests: a local webhook receiver and an
//! orchestrator wired to in-memory fakes.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path as UrlPath, State},
    http::{HeaderMap, StatusCode, header},
    routing::post,
};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};

use theme_relay::config::WebhookConfig;
use theme_relay::sessions::SessionRegistry;
use theme_relay::tasks::BackgroundTasks;
use theme_relay::testing::{FakeAgentProvider, FakePreview, FakeThemeCli};
use theme_relay::theme::RetryPolicy;
use theme_relay::webhook::WebhookNotifier;
use theme_relay::workflow::{Orchestrator, WorkflowSettings};

pub const SESSION_ID: &str = "sess-42";
pub const USERNAME: &str = "relay";
pub const PASSWORD: &str = "hunter2";
/// `Basic base64("relay:hunter2")`
pub const EXPECTED_AUTH: &str = "Basic cmVsYXk6aHVudGVyMg==";

/// One POST seen by the receiver.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub segment: String,
    pub session_id: String,
    pub authorization: Option<String>,
    pub body: serde_json::Value,
}

type Deliveries = Arc<Mutex<Vec<Delivery>>>;

/// Records every webhook POST to `/{segment}/{session_id}`.
pub struct WebhookReceiver {
    deliveries: Deliveries,
    shutdown_tx: Option<oneshot::Sender<()>>,
    addr: SocketAddr,
}

impl WebhookReceiver {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let deliveries: Deliveries = Arc::new(Mutex::new(Vec::new()));

        let app = Router::new()
            .route("/{segment}/{session_id}", post(record))
            .with_state(deliveries.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .unwrap();
        });

        Self {
            deliveries,
            shutdown_tx: Some(shutdown_tx),
            addr,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().await.clone()
    }
}

impl Drop for WebhookReceiver {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn record(
    State(deliveries): State<Deliveries>,
    UrlPath((segment, session_id)): UrlPath<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    deliveries.lock().await.push(Delivery {
        segment,
        session_id,
        authorization,
        body,
    });
    StatusCode::OK
}

pub struct Fixture {
    pub orchestrator: Arc<Orchestrator>,
    pub cli: Arc<FakeThemeCli>,
    pub provider: Arc<FakeAgentProvider>,
    pub preview: Arc<FakePreview>,
}

/// Orchestrator over fakes posting to `receiver`. Delays are shortened so
/// scenarios run in real time.
pub fn fixture(
    receiver: &WebhookReceiver,
    cli: FakeThemeCli,
    provider: FakeAgentProvider,
    download_root: &Path,
) -> Fixture {
    let cli = Arc::new(cli);
    let provider = Arc::new(provider);
    let preview = Arc::new(FakePreview::new());
    let notifier = WebhookNotifier::new(
        WebhookConfig {
            base_url: receiver.base_url(),
            username: USERNAME.into(),
            password: PASSWORD.into(),
        },
        SESSION_ID,
    )
    .unwrap();

    let orchestrator = Orchestrator::new(
        cli.clone(),
        Arc::new(SessionRegistry::new(provider.clone())),
        preview.clone(),
        Arc::new(notifier),
        BackgroundTasks::new(),
        WorkflowSettings {
            session_id: SESSION_ID.into(),
            duplicate_wait: Duration::ZERO,
            retry: RetryPolicy {
                max_retries: 3,
                retry_delay: Duration::from_millis(10),
            },
            download_root: download_root.to_path_buf(),
            default_model: "gpt-5-codex".into(),
        },
    );

    Fixture {
        orchestrator: Arc::new(orchestrator),
        cli,
        provider,
        preview,
    }
}
