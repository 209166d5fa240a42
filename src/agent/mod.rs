//! Coding-agent boundary.
//!
//! Business logic only sees the `AgentProvider` / `AgentSession` capability
//! traits and the `ThreadEvent` stream; `codex` holds the one concrete
//! implementation, which shells out to the Codex CLI.

pub mod codex;
pub mod events;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::Serialize;

use crate::errors::AgentError;

pub use codex::CodexProvider;
pub use events::{ThreadError, ThreadEvent, ThreadItem, Usage};

/// Lazily produced events of one turn.
pub type EventStream = BoxStream<'static, Result<ThreadEvent, AgentError>>;

/// How a session is bound to its directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub working_directory: PathBuf,
    pub model: String,
    /// No approval gate and unrestricted writes inside `working_directory`.
    pub full_access: bool,
}

/// Per-turn overrides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnOptions {
    pub model: Option<String>,
    pub output_schema: Option<serde_json::Value>,
}

/// Result of a completed, non-streamed turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Turn {
    pub final_response: String,
    pub items: Vec<ThreadItem>,
    pub usage: Option<Usage>,
}

/// A live conversation bound to one working directory.
#[async_trait]
pub trait AgentSession: Send + Sync {
    async fn run_streamed(
        &self,
        prompt: &str,
        options: &TurnOptions,
    ) -> Result<EventStream, AgentError>;

    async fn run(&self, prompt: &str, options: &TurnOptions) -> Result<Turn, AgentError> {
        let stream = self.run_streamed(prompt, options).await?;
        collect_turn(stream).await
    }
}

/// Factory for sessions.
pub trait AgentProvider: Send + Sync {
    fn start_session(&self, config: SessionConfig) -> Arc<dyn AgentSession>;
}

/// Fold a turn's events into a `Turn`. The last completed agent message is
/// the final response.
pub async fn collect_turn(mut stream: EventStream) -> Result<Turn, AgentError> {
    let mut turn = Turn::default();
    while let Some(event) = stream.next().await {
        match event? {
            ThreadEvent::ItemCompleted { item } => {
                if item.is_agent_message() {
                    turn.final_response = item.text().unwrap_or_default().to_string();
                }
                turn.items.push(item);
            }
            ThreadEvent::TurnCompleted { usage } => turn.usage = usage,
            ThreadEvent::TurnFailed { error } => return Err(AgentError::TurnFailed(error.message)),
            ThreadEvent::Error { message } => return Err(AgentError::Stream(message)),
            _ => {}
        }
    }
    Ok(turn)
}
