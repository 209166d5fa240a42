//! In-memory fakes for the external boundaries: theme CLI, coding agent and
//! preview launcher. Used by unit tests and the integration suite.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::StreamExt;

use crate::agent::{
    AgentProvider, AgentSession, EventStream, SessionConfig, ThreadEvent, TurnOptions,
};
use crate::errors::{AgentError, CliError};
use crate::preview::PreviewLauncher;
use crate::theme::ThemeSummary;
use crate::theme::cli::{ThemeCli, parse_duplicated_theme_id, parse_theme_list};

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scripted `ThemeCli`. List and duplicate feed canned raw output through
/// the real parsers; pull writes a file once the configured attempt is
/// reached.
pub struct FakeThemeCli {
    list_output: String,
    duplicate_output: String,
    populate_on_attempt: Option<usize>,
    failing_pulls: bool,
    list_calls: AtomicUsize,
    duplicate_calls: AtomicUsize,
    pull_calls: AtomicUsize,
    duplicated: Mutex<Vec<(String, String)>>,
    pulled: Mutex<Vec<(String, PathBuf)>>,
}

impl Default for FakeThemeCli {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeThemeCli {
    /// Empty list output, empty duplicate output, pulls that never populate.
    pub fn new() -> Self {
        Self {
            list_output: String::new(),
            duplicate_output: String::new(),
            populate_on_attempt: None,
            failing_pulls: false,
            list_calls: AtomicUsize::new(0),
            duplicate_calls: AtomicUsize::new(0),
            pull_calls: AtomicUsize::new(0),
            duplicated: Mutex::new(Vec::new()),
            pulled: Mutex::new(Vec::new()),
        }
    }

    pub fn with_list_output(mut self, stdout: impl Into<String>) -> Self {
        self.list_output = stdout.into();
        self
    }

    pub fn with_duplicate_output(mut self, stdout: impl Into<String>) -> Self {
        self.duplicate_output = stdout.into();
        self
    }

    /// Zero-based attempt from which pulls write content.
    pub fn populate_on_attempt(mut self, attempt: usize) -> Self {
        self.populate_on_attempt = Some(attempt);
        self
    }

    /// Every pull reports an error, whether or not it wrote files.
    pub fn failing_pulls(mut self) -> Self {
        self.failing_pulls = true;
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn duplicate_calls(&self) -> usize {
        self.duplicate_calls.load(Ordering::SeqCst)
    }

    pub fn pull_calls(&self) -> usize {
        self.pull_calls.load(Ordering::SeqCst)
    }

    /// `(source theme id, requested name)` for each duplicate call.
    pub fn duplicated(&self) -> Vec<(String, String)> {
        lock(&self.duplicated).clone()
    }

    /// `(theme id, path)` for each pull call.
    pub fn pulled(&self) -> Vec<(String, PathBuf)> {
        lock(&self.pulled).clone()
    }
}

#[async_trait]
impl ThemeCli for FakeThemeCli {
    async fn list_themes(&self) -> Result<Vec<ThemeSummary>, CliError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        parse_theme_list(&self.list_output, "")
    }

    async fn duplicate_theme(&self, theme_id: &str, name: &str) -> Result<String, CliError> {
        self.duplicate_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.duplicated).push((theme_id.to_string(), name.to_string()));
        parse_duplicated_theme_id(theme_id, &self.duplicate_output, "")
    }

    async fn pull_theme(&self, theme_id: &str, path: &Path) -> Result<(), CliError> {
        let attempt = self.pull_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.pulled).push((theme_id.to_string(), path.to_path_buf()));

        if self.populate_on_attempt.is_some_and(|n| attempt >= n) {
            let layout = path.join("layout");
            std::fs::create_dir_all(&layout).map_err(|source| CliError::Spawn {
                program: "fake".into(),
                source,
            })?;
            std::fs::write(layout.join("theme.liquid"), "<html></html>").map_err(|source| {
                CliError::Spawn {
                    program: "fake".into(),
                    source,
                }
            })?;
        }

        if self.failing_pulls {
            return Err(CliError::Failed {
                command: "fake theme pull".into(),
                code: Some(1),
                stderr: "simulated failure".into(),
            });
        }
        Ok(())
    }
}

/// Agent provider whose sessions replay a fixed event list.
pub struct FakeAgentProvider {
    events: Vec<Result<ThreadEvent, String>>,
    started: Mutex<Vec<SessionConfig>>,
    prompts: Arc<Mutex<Vec<(String, TurnOptions)>>>,
    remove_working_directory: bool,
}

impl Default for FakeAgentProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeAgentProvider {
    pub fn new() -> Self {
        Self::with_events(Vec::new())
    }

    pub fn with_events(events: Vec<ThreadEvent>) -> Self {
        Self::with_results(events.into_iter().map(Ok).collect())
    }

    /// `Err(message)` entries surface as `AgentError::Stream` mid-stream.
    pub fn with_results(events: Vec<Result<ThreadEvent, String>>) -> Self {
        Self {
            events,
            started: Mutex::new(Vec::new()),
            prompts: Arc::new(Mutex::new(Vec::new())),
            remove_working_directory: false,
        }
    }

    /// Delete the session's working directory as the session starts, as if
    /// something else removed it between pull and preview.
    pub fn removing_working_directory(mut self) -> Self {
        self.remove_working_directory = true;
        self
    }

    pub fn started_sessions(&self) -> Vec<SessionConfig> {
        lock(&self.started).clone()
    }

    /// Every prompt sent to any session of this provider.
    pub fn prompts(&self) -> Vec<(String, TurnOptions)> {
        lock(&self.prompts).clone()
    }
}

impl AgentProvider for FakeAgentProvider {
    fn start_session(&self, config: SessionConfig) -> Arc<dyn AgentSession> {
        if self.remove_working_directory {
            let _ = std::fs::remove_dir_all(&config.working_directory);
        }
        lock(&self.started).push(config);
        Arc::new(FakeAgentSession {
            events: self.events.clone(),
            prompts: Arc::clone(&self.prompts),
        })
    }
}

struct FakeAgentSession {
    events: Vec<Result<ThreadEvent, String>>,
    prompts: Arc<Mutex<Vec<(String, TurnOptions)>>>,
}

#[async_trait]
impl AgentSession for FakeAgentSession {
    async fn run_streamed(
        &self,
        prompt: &str,
        options: &TurnOptions,
    ) -> Result<EventStream, AgentError> {
        lock(&self.prompts).push((prompt.to_string(), options.clone()));
        let events: Vec<Result<ThreadEvent, AgentError>> = self
            .events
            .iter()
            .cloned()
            .map(|r| r.map_err(AgentError::Stream))
            .collect();
        Ok(futures::stream::iter(events).boxed())
    }
}

/// Records launches instead of starting processes.
#[derive(Default)]
pub struct FakePreview {
    launched: Mutex<Vec<PathBuf>>,
}

impl FakePreview {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn launched(&self) -> Vec<PathBuf> {
        lock(&self.launched).clone()
    }
}

#[async_trait]
impl PreviewLauncher for FakePreview {
    async fn launch(&self, directory: &Path) -> std::io::Result<()> {
        lock(&self.launched).push(directory.to_path_buf());
        Ok(())
    }
}
