//! `AgentProvider` backed by the Codex CLI (`codex exec --json`).
//!
//! Each turn spawns one process. The prompt goes in on stdin, JSONL thread
//! events come back on stdout, and the thread id from `thread.started` is
//! kept so the next turn resumes the same conversation.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{AgentProvider, AgentSession, EventStream, SessionConfig, ThreadEvent, TurnOptions};
use crate::errors::AgentError;
use crate::util::truncate_for_log;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Starts `CodexSession`s that invoke `program`.
pub struct CodexProvider {
    program: String,
    schema_dir: PathBuf,
}

impl CodexProvider {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            schema_dir: std::env::temp_dir(),
        }
    }

    /// Directory for per-turn output schema files. Defaults to the system
    /// temp directory.
    pub fn with_schema_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.schema_dir = dir.into();
        self
    }
}

impl AgentProvider for CodexProvider {
    fn start_session(&self, config: SessionConfig) -> Arc<dyn AgentSession> {
        Arc::new(CodexSession {
            program: self.program.clone(),
            schema_dir: self.schema_dir.clone(),
            config,
            thread_id: Arc::new(Mutex::new(None)),
        })
    }
}

pub struct CodexSession {
    program: String,
    schema_dir: PathBuf,
    config: SessionConfig,
    thread_id: Arc<Mutex<Option<String>>>,
}

impl CodexSession {
    fn build_command(&self, options: &TurnOptions, schema_path: Option<&Path>) -> Command {
        let mut command = Command::new(&self.program);
        if self.config.full_access {
            command
                .arg("--sandbox")
                .arg("danger-full-access")
                .arg("--ask-for-approval")
                .arg("never");
        } else {
            command.arg("--sandbox").arg("workspace-write");
        }
        command
            .arg("exec")
            .arg("--json")
            .arg("--skip-git-repo-check")
            .arg("-C")
            .arg(&self.config.working_directory);

        let model = options.model.as_deref().unwrap_or(&self.config.model);
        command.arg("--model").arg(model);

        if let Some(path) = schema_path {
            command.arg("--output-schema").arg(path);
        }

        let thread_id = self
            .thread_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(thread_id) = thread_id {
            command.arg("resume").arg(thread_id);
        }
        command.arg("-");

        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl AgentSession for CodexSession {
    async fn run_streamed(
        &self,
        prompt: &str,
        options: &TurnOptions,
    ) -> Result<EventStream, AgentError> {
        // Removed when dropped, so every early return cleans up.
        let schema_file = match &options.output_schema {
            Some(schema) => {
                let bytes = serde_json::to_vec(schema).map_err(AgentError::InvalidSchema)?;
                let file = tempfile::Builder::new()
                    .prefix("theme-relay-schema-")
                    .suffix(".json")
                    .tempfile_in(&self.schema_dir)?;
                tokio::fs::write(file.path(), bytes).await?;
                Some(file.into_temp_path())
            }
            None => None,
        };

        let mut child = self
            .build_command(options, schema_file.as_deref())
            .spawn()
            .map_err(|source| AgentError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(prompt.as_bytes()).await?;
            // stdin is dropped here, closing the pipe
        }
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::Stream("agent stdout unavailable".into()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| AgentError::Stream("agent stderr unavailable".into()))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let thread_slot = Arc::clone(&self.thread_id);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            let mut delivered = 0usize;
            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        let _ = tx.send(Err(AgentError::Io(e))).await;
                        break;
                    }
                };
                match parse_codex_line(&line) {
                    CodexLine::Event(event) => {
                        if let ThreadEvent::ThreadStarted { thread_id } = &*event {
                            *thread_slot.lock().unwrap_or_else(PoisonError::into_inner) =
                                Some(thread_id.clone());
                        }
                        delivered += 1;
                        // A dropped receiver still needs stdout drained.
                        let _ = tx.send(Ok(*event)).await;
                    }
                    CodexLine::Noise(message) => {
                        if !message.is_empty() {
                            debug!(line = %truncate_for_log(&message, 200), "codex stdout noise");
                        }
                    }
                }
            }

            let status = child.wait().await;
            let stderr = stderr_task.await.unwrap_or_default();
            match status {
                Ok(status) if status.success() => {}
                Ok(status) => {
                    let stderr = truncate_for_log(&stderr, 400);
                    warn!(
                        code = ?status.code(),
                        delivered,
                        stderr = %stderr,
                        "codex exited unsuccessfully"
                    );
                    let _ = tx
                        .send(Err(AgentError::ProcessFailed {
                            code: status.code(),
                            stderr,
                        }))
                        .await;
                }
                Err(e) => {
                    let _ = tx.send(Err(AgentError::Io(e))).await;
                }
            }

            if let Some(path) = schema_file
                && let Err(e) = path.close()
            {
                debug!(error = %e, "failed to remove schema file");
            }
        });

        Ok(futures::stream::unfold(rx, |mut rx| async move {
            let event = rx.recv().await?;
            Some((event, rx))
        })
        .boxed())
    }
}

enum CodexLine {
    Event(Box<ThreadEvent>),
    Noise(String),
}

fn parse_codex_line(line: &str) -> CodexLine {
    let trimmed = line.trim();
    if !trimmed.starts_with('{') {
        return CodexLine::Noise(trimmed.to_string());
    }
    match serde_json::from_str::<ThreadEvent>(trimmed) {
        Ok(event) => CodexLine::Event(Box::new(event)),
        Err(e) => CodexLine::Noise(format!("unparsed codex event ({}): {}", e, trimmed)),
    }
}
