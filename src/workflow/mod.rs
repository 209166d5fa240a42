//! Background operations triggered by inbound requests.
//!
//! `Orchestrator` owns every collaborator behind a capability trait and runs
//! each operation to a single terminal webhook. The `submit_*` methods hand
//! work to `BackgroundTasks` and return immediately; the `*_and_notify`
//! methods are the awaited bodies, used directly by tests.
//!
//! | Module     | Operation                                                |
//! |------------|----------------------------------------------------------|
//! | `download` | duplicate → wait → pull → provision → preview            |
//! | `chat`     | one-shot and streamed prompts against an environment     |

pub mod chat;
pub mod download;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::Config;
use crate::preview::PreviewLauncher;
use crate::sessions::SessionRegistry;
use crate::tasks::BackgroundTasks;
use crate::theme::{RetryPolicy, ThemeCli};
use crate::webhook::{SEGMENT_LIST_THEMES, ThemeListPayload, WebhookNotifier};

pub use chat::{ChatRequest, should_forward};
pub use download::Provisioned;

/// Tunables for the workflows, split out of `Config` so tests can build
/// them without any environment.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    /// Name given to duplicated themes.
    pub session_id: String,
    pub duplicate_wait: Duration,
    pub retry: RetryPolicy,
    pub download_root: PathBuf,
    pub default_model: String,
}

impl WorkflowSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            session_id: config.session_id.clone(),
            duplicate_wait: config.duplicate_wait,
            retry: RetryPolicy {
                max_retries: config.max_pull_retries,
                retry_delay: config.pull_retry_delay,
            },
            download_root: config.download_root.clone(),
            default_model: config.default_model.clone(),
        }
    }
}

pub struct Orchestrator {
    cli: Arc<dyn ThemeCli>,
    registry: Arc<SessionRegistry>,
    preview: Arc<dyn PreviewLauncher>,
    notifier: Arc<WebhookNotifier>,
    tasks: BackgroundTasks,
    settings: WorkflowSettings,
}

impl Orchestrator {
    pub fn new(
        cli: Arc<dyn ThemeCli>,
        registry: Arc<SessionRegistry>,
        preview: Arc<dyn PreviewLauncher>,
        notifier: Arc<WebhookNotifier>,
        tasks: BackgroundTasks,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            cli,
            registry,
            preview,
            notifier,
            tasks,
            settings,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn tasks(&self) -> &BackgroundTasks {
        &self.tasks
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// List remote themes and report them on `list-themes`.
    pub async fn list_themes_and_notify(&self) {
        let payload = match self.cli.list_themes().await {
            Ok(themes) => {
                info!(count = themes.len(), "themes listed");
                ThemeListPayload {
                    success: true,
                    themes,
                    error: None,
                }
            }
            Err(e) => {
                warn!(error = %e, "theme listing failed");
                ThemeListPayload {
                    success: false,
                    themes: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        };
        self.notifier.notify(SEGMENT_LIST_THEMES, &payload).await;
    }

    pub fn submit_list_themes(self: &Arc<Self>) {
        let this = Arc::clone(self);
        self.tasks.spawn("list-themes", async move {
            this.list_themes_and_notify().await;
        });
    }

    pub fn submit_download(self: &Arc<Self>, theme_id: String) {
        let this = Arc::clone(self);
        self.tasks.spawn("download-theme", async move {
            this.download_and_notify(&theme_id).await;
        });
    }

    pub fn submit_chat(self: &Arc<Self>, env_id: String, request: ChatRequest) {
        let this = Arc::clone(self);
        self.tasks.spawn("chat", async move {
            this.chat_and_notify(&env_id, &request).await;
        });
    }

    pub fn submit_chat_stream(self: &Arc<Self>, env_id: String, request: ChatRequest) {
        let this = Arc::clone(self);
        self.tasks.spawn("chat-stream", async move {
            this.chat_streamed_and_notify(&env_id, &request).await;
        });
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::WebhookConfig;
    use crate::testing::{FakeAgentProvider, FakePreview, FakeThemeCli};

    pub struct Harness {
        pub orchestrator: Arc<Orchestrator>,
        pub cli: Arc<FakeThemeCli>,
        pub provider: Arc<FakeAgentProvider>,
        pub preview: Arc<FakePreview>,
    }

    /// Orchestrator over fakes. Webhooks go to a closed port and are dropped.
    pub fn harness(
        cli: FakeThemeCli,
        provider: FakeAgentProvider,
        download_root: PathBuf,
    ) -> Harness {
        let cli = Arc::new(cli);
        let provider = Arc::new(provider);
        let preview = Arc::new(FakePreview::new());
        let notifier = WebhookNotifier::with_timeout(
            WebhookConfig {
                base_url: "http://127.0.0.1:1".into(),
                username: "u".into(),
                password: "p".into(),
            },
            "sess",
            Duration::from_millis(200),
        )
        .unwrap();
        let orchestrator = Orchestrator::new(
            cli.clone(),
            Arc::new(SessionRegistry::new(provider.clone())),
            preview.clone(),
            Arc::new(notifier),
            BackgroundTasks::new(),
            WorkflowSettings {
                session_id: "sess".into(),
                duplicate_wait: Duration::from_secs(10),
                retry: RetryPolicy {
                    max_retries: 3,
                    retry_delay: Duration::from_secs(5),
                },
                download_root,
                default_model: "gpt-5-codex".into(),
            },
        );
        Harness {
            orchestrator: Arc::new(orchestrator),
            cli,
            provider,
            preview,
        }
    }
}
