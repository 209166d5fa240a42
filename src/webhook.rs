//! Outbound webhook delivery.
//!
//! Every background operation reports its outcome by POSTing JSON to
//! `{base_url}/{segment}/{session_id}` with HTTP Basic credentials. Delivery
//! is best effort: one attempt, bounded by a 10 second timeout, failures are
//! logged and never reach the caller. Non-2xx responses are not inspected.
//!
//! ## Payload shapes
//!
//! | Segment          | Payload               |
//! |------------------|-----------------------|
//! | `list-themes`    | `ThemeListPayload`    |
//! | `download-theme` | `ThemeDownloadPayload`|
//! | `chat`           | `ChatPayload`         |
//! | `chat-stream`    | `StreamEventPayload` / `StreamFailurePayload` |

use std::time::Duration;

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::agent::{ThreadEvent, ThreadItem};
use crate::config::WebhookConfig;
use crate::theme::ThemeSummary;

pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

pub const SEGMENT_LIST_THEMES: &str = "list-themes";
pub const SEGMENT_DOWNLOAD_THEME: &str = "download-theme";
pub const SEGMENT_CHAT: &str = "chat";
pub const SEGMENT_CHAT_STREAM: &str = "chat-stream";

/// `{ success, themes, error? }`
#[derive(Debug, Clone, Serialize)]
pub struct ThemeListPayload {
    pub success: bool,
    pub themes: Vec<ThemeSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `{ success, theme_id?, env_id?, error? }`
#[derive(Debug, Clone, Serialize)]
pub struct ThemeDownloadPayload {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `{ success, env_id?, response?, items?, error? }`
#[derive(Debug, Clone, Serialize)]
pub struct ChatPayload {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<ThreadItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One forwarded agent event, with the event's own fields (including
/// `type`) flattened alongside the envelope.
#[derive(Debug, Clone, Serialize)]
pub struct StreamEventPayload<'a> {
    pub success: bool,
    pub env_id: &'a str,
    pub event_number: u64,
    pub timestamp: String,
    #[serde(flatten)]
    pub event: &'a ThreadEvent,
}

/// `{ success: false, env_id, error, timestamp }`
#[derive(Debug, Clone, Serialize)]
pub struct StreamFailurePayload<'a> {
    pub success: bool,
    pub env_id: &'a str,
    pub error: String,
    pub timestamp: String,
}

/// ISO-8601 capture time for stream payloads.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Build `{base_url}/{segment}/{session_id}`.
pub fn webhook_url(base_url: &str, segment: &str, session_id: &str) -> String {
    format!("{}/{}/{}", base_url.trim_end_matches('/'), segment, session_id)
}

/// Posts payloads for one session id.
pub struct WebhookNotifier {
    client: reqwest::Client,
    config: WebhookConfig,
    session_id: String,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig, session_id: impl Into<String>) -> anyhow::Result<Self> {
        Self::with_timeout(config, session_id, WEBHOOK_TIMEOUT)
    }

    pub fn with_timeout(
        config: WebhookConfig,
        session_id: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build webhook HTTP client")?;
        Ok(Self {
            client,
            config,
            session_id: session_id.into(),
        })
    }

    pub fn url_for(&self, segment: &str) -> String {
        webhook_url(&self.config.base_url, segment, &self.session_id)
    }

    /// Deliver `payload` once. Never fails.
    pub async fn notify<P>(&self, segment: &str, payload: &P)
    where
        P: Serialize + Sync + ?Sized,
    {
        let url = self.url_for(segment);
        let result = self
            .client
            .post(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(payload)
            .send()
            .await;

        match result {
            Ok(resp) => debug!(url = %url, status = %resp.status(), "webhook delivered"),
            Err(e) => warn!(url = %url, error = %e, "webhook delivery failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_url_joins_segments() {
        assert_eq!(
            webhook_url("https://hooks.example.com/api/", "download-theme", "sess-1"),
            "https://hooks.example.com/api/download-theme/sess-1"
        );
        assert_eq!(
            webhook_url("http://localhost:9000", "chat", "s"),
            "http://localhost:9000/chat/s"
        );
    }

    #[test]
    fn test_download_success_payload_shape() {
        let payload = ThemeDownloadPayload {
            success: true,
            theme_id: Some("999".into()),
            env_id: Some("_themes_999".into()),
            error: None,
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            serde_json::json!({"success": true, "theme_id": "999", "env_id": "_themes_999"})
        );
    }

    #[test]
    fn test_download_failure_payload_shape() {
        let payload = ThemeDownloadPayload {
            success: false,
            theme_id: None,
            env_id: None,
            error: Some("boom".into()),
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            serde_json::json!({"success": false, "error": "boom"})
        );
    }

    #[test]
    fn test_theme_list_failure_keeps_empty_themes() {
        let payload = ThemeListPayload {
            success: false,
            themes: vec![],
            error: Some("no output".into()),
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            serde_json::json!({"success": false, "themes": [], "error": "no output"})
        );
    }

    #[test]
    fn test_stream_event_payload_flattens_event_fields() {
        let event = ThreadEvent::ThreadStarted {
            thread_id: "t-1".into(),
        };
        let payload = StreamEventPayload {
            success: true,
            env_id: "_themes_1",
            event_number: 1,
            timestamp: "2026-01-01T00:00:00.000Z".into(),
            event: &event,
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            serde_json::json!({
                "success": true,
                "env_id": "_themes_1",
                "event_number": 1,
                "timestamp": "2026-01-01T00:00:00.000Z",
                "type": "thread.started",
                "thread_id": "t-1"
            })
        );
    }

    #[test]
    fn test_timestamp_is_rfc3339_utc() {
        let ts = timestamp_now();
        assert!(ts.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }

    #[tokio::test]
    async fn test_notify_swallows_connection_errors() {
        let notifier = WebhookNotifier::with_timeout(
            WebhookConfig {
                base_url: "http://127.0.0.1:1".into(),
                username: "u".into(),
                password: "p".into(),
            },
            "sess",
            Duration::from_millis(500),
        )
        .unwrap();
        notifier
            .notify(SEGMENT_CHAT, &serde_json::json!({"success": true}))
            .await;
    }
}
