use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::{error, info, warn};

use super::Orchestrator;
use crate::errors::WorkflowError;
use crate::theme::pull_with_retry;
use crate::webhook::{SEGMENT_DOWNLOAD_THEME, ThemeDownloadPayload};

/// Outcome of a successful download-and-provision run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provisioned {
    pub theme_id: String,
    pub env_id: String,
}

impl Orchestrator {
    /// Duplicate `theme_id`, pull the copy, bind an agent session to it and
    /// start a preview. Steps run strictly in order; the first failure ends
    /// the run.
    pub async fn download_and_provision(
        &self,
        theme_id: &str,
    ) -> Result<Provisioned, WorkflowError> {
        let settings = &self.settings;

        info!(theme_id, name = %settings.session_id, "duplicating theme");
        let new_theme_id = self
            .cli
            .duplicate_theme(theme_id, &settings.session_id)
            .await?;
        info!(theme_id, new_theme_id = %new_theme_id, "theme duplicated");

        info!(
            new_theme_id = %new_theme_id,
            wait_secs = settings.duplicate_wait.as_secs(),
            "waiting for duplicate to propagate"
        );
        tokio::time::sleep(settings.duplicate_wait).await;

        let local_path = theme_directory(&settings.download_root, &new_theme_id)?;
        let local_path =
            pull_with_retry(self.cli.as_ref(), &new_theme_id, &local_path, settings.retry).await?;

        let env = self.registry.create(&local_path, &settings.default_model);

        // The directory can vanish between pull and launch.
        let is_dir = tokio::fs::metadata(&local_path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(WorkflowError::PreviewDirectoryMissing { path: local_path });
        }
        self.preview
            .launch(&local_path)
            .await
            .map_err(|source| WorkflowError::PreviewLaunch {
                path: local_path.clone(),
                source,
            })?;

        Ok(Provisioned {
            theme_id: new_theme_id,
            env_id: env.env_id,
        })
    }

    /// Run `download_and_provision` and report the outcome on
    /// `download-theme`. Exactly one webhook is sent.
    pub async fn download_and_notify(&self, theme_id: &str) {
        let payload = match self.download_and_provision(theme_id).await {
            Ok(done) => {
                info!(
                    theme_id,
                    new_theme_id = %done.theme_id,
                    env_id = %done.env_id,
                    "theme downloaded and provisioned"
                );
                ThemeDownloadPayload {
                    success: true,
                    theme_id: Some(done.theme_id),
                    env_id: Some(done.env_id),
                    error: None,
                }
            }
            Err(e) => {
                match &e {
                    WorkflowError::PullExhausted { .. } => {
                        warn!(theme_id, error = %e, "theme download failed")
                    }
                    _ => error!(theme_id, error = %e, "theme download failed"),
                }
                ThemeDownloadPayload {
                    success: false,
                    theme_id: None,
                    env_id: None,
                    error: Some(e.to_string()),
                }
            }
        };
        self.notifier.notify(SEGMENT_DOWNLOAD_THEME, &payload).await;
    }
}

/// Local directory for a duplicated theme. The id comes from CLI output, so
/// anything but a single plain path component is rejected.
fn theme_directory(root: &Path, theme_id: &str) -> Result<PathBuf, WorkflowError> {
    let mut components = Path::new(theme_id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) if name == theme_id => Ok(root.join(name)),
        _ => Err(WorkflowError::UnsafeThemeId {
            theme_id: theme_id.to_string(),
        }),
    }
}
