use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::models::{ThemeSummary, id_from_value};
use crate::config::StoreConfig;
use crate::errors::CliError;
use crate::util::{extract_json_value, truncate_for_log};

/// Upper bound for `list` and `duplicate`, which return quickly when healthy.
const SHORT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Capability interface over the theme platform CLI.
/// Real implementation: `ShopifyCli`. Test double: `testing::FakeThemeCli`.
#[async_trait]
pub trait ThemeCli: Send + Sync {
    async fn list_themes(&self) -> Result<Vec<ThemeSummary>, CliError>;

    /// Duplicate `theme_id` under `name`, returning the new theme's id.
    async fn duplicate_theme(&self, theme_id: &str, name: &str) -> Result<String, CliError>;

    /// Pull `theme_id` into `path`. Success here says nothing about whether
    /// files actually landed; callers inspect the directory themselves.
    async fn pull_theme(&self, theme_id: &str, path: &Path) -> Result<(), CliError>;
}

/// Captured result of one CLI invocation.
struct CommandOutput {
    stdout: String,
    stderr: String,
    code: Option<i32>,
}

/// Drives the `shopify` executable.
pub struct ShopifyCli {
    program: String,
    store: StoreConfig,
    pull_timeout: Duration,
}

impl ShopifyCli {
    pub fn new(program: impl Into<String>, store: StoreConfig, pull_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            store,
            pull_timeout,
        }
    }

    /// Run `shopify theme <args>` with the store credentials in the child's
    /// environment. Only the subcommand and its own arguments appear in logs
    /// and errors.
    async fn run_theme_command(
        &self,
        args: Vec<OsString>,
        limit: Duration,
    ) -> Result<CommandOutput, CliError> {
        let label = format!(
            "{} theme {}",
            self.program,
            args.first()
                .map(|a| a.to_string_lossy().into_owned())
                .unwrap_or_default()
        );
        debug!(command = %label, ?args, "running theme CLI");

        let child = Command::new(&self.program)
            .arg("theme")
            .args(&args)
            .envs(self.store.child_env())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CliError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let output = match timeout(limit, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| CliError::Spawn {
                program: self.program.clone(),
                source,
            })?,
            Err(_) => {
                return Err(CliError::Timeout {
                    command: label,
                    secs: limit.as_secs(),
                });
            }
        };

        let out = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            code: output.status.code(),
        };
        debug!(
            command = %label,
            code = ?out.code,
            stdout_len = out.stdout.len(),
            stderr_len = out.stderr.len(),
            "theme CLI finished"
        );
        Ok(out)
    }
}

#[async_trait]
impl ThemeCli for ShopifyCli {
    async fn list_themes(&self) -> Result<Vec<ThemeSummary>, CliError> {
        let out = self
            .run_theme_command(vec!["list".into(), "--json".into()], SHORT_COMMAND_TIMEOUT)
            .await?;
        parse_theme_list(&out.stdout, &out.stderr)
    }

    async fn duplicate_theme(&self, theme_id: &str, name: &str) -> Result<String, CliError> {
        let out = self
            .run_theme_command(
                vec![
                    "duplicate".into(),
                    "--theme".into(),
                    theme_id.into(),
                    "--name".into(),
                    name.into(),
                    "--json".into(),
                    "--force".into(),
                ],
                SHORT_COMMAND_TIMEOUT,
            )
            .await?;
        parse_duplicated_theme_id(theme_id, &out.stdout, &out.stderr)
    }

    async fn pull_theme(&self, theme_id: &str, path: &Path) -> Result<(), CliError> {
        let out = self
            .run_theme_command(
                vec![
                    "pull".into(),
                    "--theme".into(),
                    theme_id.into(),
                    "--path".into(),
                    path.as_os_str().to_owned(),
                    "--force".into(),
                ],
                self.pull_timeout,
            )
            .await?;
        if out.code != Some(0) {
            warn!(theme_id, code = ?out.code, "theme pull exited unsuccessfully");
            return Err(CliError::Failed {
                command: format!("{} theme pull", self.program),
                code: out.code,
                stderr: truncate_for_log(&out.stderr, 400),
            });
        }
        Ok(())
    }
}

/// Prefer stdout; the CLI sometimes writes its JSON to stderr instead.
fn primary_output<'a>(stdout: &'a str, stderr: &'a str) -> Option<&'a str> {
    [stdout, stderr]
        .into_iter()
        .map(str::trim)
        .find(|s| !s.is_empty())
}

/// Parse `theme list --json` output.
pub fn parse_theme_list(stdout: &str, stderr: &str) -> Result<Vec<ThemeSummary>, CliError> {
    const COMMAND: &str = "theme list";

    let raw = primary_output(stdout, stderr).ok_or_else(|| CliError::OutputEmpty {
        command: COMMAND.to_string(),
    })?;
    let json = extract_json_value(raw).ok_or_else(|| CliError::OutputMalformed {
        command: COMMAND.to_string(),
        reason: format!("no JSON in output: {}", truncate_for_log(raw, 200)),
    })?;
    serde_json::from_str(json).map_err(|e| CliError::OutputMalformed {
        command: COMMAND.to_string(),
        reason: e.to_string(),
    })
}

/// Parse `theme duplicate --json` output into the new theme id. Accepts both
/// `{"theme": {"id": ..}}` and a bare `{"id": ..}`.
pub fn parse_duplicated_theme_id(
    source_theme_id: &str,
    stdout: &str,
    stderr: &str,
) -> Result<String, CliError> {
    let failed = |reason: String| CliError::DuplicationFailed {
        theme_id: source_theme_id.to_string(),
        reason,
    };

    let raw = primary_output(stdout, stderr).ok_or_else(|| failed("empty output".into()))?;
    let json = extract_json_value(raw)
        .ok_or_else(|| failed(format!("output is not JSON: {}", truncate_for_log(raw, 200))))?;
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| failed(format!("invalid JSON: {}", e)))?;

    value
        .pointer("/theme/id")
        .or_else(|| value.get("id"))
        .and_then(id_from_value)
        .ok_or_else(|| failed("no theme id in output".into()))
}
