//! Typed error hierarchy for theme-relay.
//!
//! Four top-level enums cover the subsystems:
//! - `ConfigError`: startup configuration (fatal to the process)
//! - `CliError`: theme platform CLI invocations and output parsing
//! - `AgentError`: coding-agent sessions and their event streams
//! - `WorkflowError`: background operations, reported through webhooks
//!
//! Webhook failure payloads carry only the `Display` text of these errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading configuration at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("Invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Errors from the theme platform CLI adapter.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' timed out after {secs} seconds")]
    Timeout { command: String, secs: u64 },

    #[error("'{command}' exited with code {code:?}: {stderr}")]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("'{command}' produced no output")]
    OutputEmpty { command: String },

    #[error("'{command}' produced malformed output: {reason}")]
    OutputMalformed { command: String, reason: String },

    #[error("Failed to duplicate theme {theme_id}: {reason}")]
    DuplicationFailed { theme_id: String, reason: String },
}

/// Errors from a coding-agent session.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Failed to spawn agent process '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Agent I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Agent process exited with code {code:?}: {stderr}")]
    ProcessFailed { code: Option<i32>, stderr: String },

    #[error("Agent turn failed: {0}")]
    TurnFailed(String),

    #[error("Agent stream error: {0}")]
    Stream(String),

    #[error("Invalid output schema: {0}")]
    InvalidSchema(#[source] serde_json::Error),
}

/// Errors that end a background operation. Each is converted into a failure
/// webhook and never crashes the process.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Cli(#[from] CliError),

    #[error("Failed to prepare directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Refusing theme id '{theme_id}': not a plain directory name")]
    UnsafeThemeId { theme_id: String },

    #[error("Theme {theme_id} pull left {path} empty after {attempts} attempts")]
    PullExhausted {
        theme_id: String,
        path: PathBuf,
        attempts: u32,
    },

    #[error("Preview directory {path} does not exist")]
    PreviewDirectoryMissing { path: PathBuf },

    #[error("Failed to launch preview for {path}: {source}")]
    PreviewLaunch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment {env_id} not found")]
    SessionNotFound { env_id: String },

    #[error(transparent)]
    Agent(#[from] AgentError),
}
