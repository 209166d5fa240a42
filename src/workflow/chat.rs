use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::Orchestrator;
use crate::agent::{ThreadEvent, TurnOptions};
use crate::errors::WorkflowError;
use crate::sessions::ProvisionedEnvironment;
use crate::webhook::{
    ChatPayload, SEGMENT_CHAT, SEGMENT_CHAT_STREAM, StreamEventPayload, StreamFailurePayload,
    timestamp_now,
};

/// Body of both chat routes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub output_schema: Option<serde_json::Value>,
}

impl ChatRequest {
    fn turn_options(&self) -> TurnOptions {
        TurnOptions {
            model: self.model.clone(),
            output_schema: self.output_schema.clone(),
        }
    }
}

/// Which agent events are relayed to the stream webhook. Everything else is
/// dropped as noise.
pub fn should_forward(event: &ThreadEvent) -> bool {
    match event {
        ThreadEvent::ThreadStarted { .. } | ThreadEvent::TurnCompleted { .. } => true,
        ThreadEvent::ItemCompleted { item } => item.is_agent_message() || item.is_reasoning(),
        _ => false,
    }
}

impl Orchestrator {
    fn environment(&self, env_id: &str) -> Result<ProvisionedEnvironment, WorkflowError> {
        self.registry
            .get(env_id)
            .ok_or_else(|| WorkflowError::SessionNotFound {
                env_id: env_id.to_string(),
            })
    }

    /// Run one prompt to completion and report on `chat`.
    pub async fn chat_and_notify(&self, env_id: &str, request: &ChatRequest) {
        let result = async {
            let env = self.environment(env_id)?;
            info!(env_id, model = ?request.model, "running chat turn");
            let turn = env
                .session
                .run(&request.prompt, &request.turn_options())
                .await?;
            Ok::<_, WorkflowError>(turn)
        }
        .await;

        let payload = match result {
            Ok(turn) => {
                info!(env_id, items = turn.items.len(), "chat turn completed");
                ChatPayload {
                    success: true,
                    env_id: Some(env_id.to_string()),
                    response: Some(turn.final_response),
                    items: Some(turn.items),
                    error: None,
                }
            }
            Err(e) => {
                warn!(env_id, error = %e, "chat turn failed");
                ChatPayload {
                    success: false,
                    env_id: Some(env_id.to_string()),
                    response: None,
                    items: None,
                    error: Some(e.to_string()),
                }
            }
        };
        self.notifier.notify(SEGMENT_CHAT, &payload).await;
    }

    /// Stream one prompt, posting each relayed event to `chat-stream` in
    /// order. Returns the number of events forwarded.
    pub async fn chat_streamed_and_notify(&self, env_id: &str, request: &ChatRequest) -> u64 {
        let mut event_number = 0u64;
        if let Err(e) = self
            .forward_stream(env_id, request, &mut event_number)
            .await
        {
            warn!(env_id, forwarded = event_number, error = %e, "chat stream failed");
            let payload = StreamFailurePayload {
                success: false,
                env_id,
                error: e.to_string(),
                timestamp: timestamp_now(),
            };
            self.notifier.notify(SEGMENT_CHAT_STREAM, &payload).await;
        } else {
            info!(env_id, forwarded = event_number, "chat stream finished");
        }
        event_number
    }

    async fn forward_stream(
        &self,
        env_id: &str,
        request: &ChatRequest,
        event_number: &mut u64,
    ) -> Result<(), WorkflowError> {
        let env = self.environment(env_id)?;
        let mut stream = env
            .session
            .run_streamed(&request.prompt, &request.turn_options())
            .await?;

        while let Some(event) = stream.next().await {
            let event = event?;
            if !should_forward(&event) {
                debug!(env_id, event_type = event.type_tag(), "skipping agent event");
                continue;
            }
            *event_number += 1;
            let payload = StreamEventPayload {
                success: true,
                env_id,
                event_number: *event_number,
                timestamp: timestamp_now(),
                event: &event,
            };
            self.notifier.notify(SEGMENT_CHAT_STREAM, &payload).await;
        }
        Ok(())
    }
}
