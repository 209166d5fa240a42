//! Bounded, fixed-interval retry around `ThemeCli::pull_theme`.
//!
//! The CLI can exit cleanly without writing anything, so the only success
//! signal is a non-empty target directory after an attempt. Partial content
//! is left in place between attempts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use super::cli::ThemeCli;
use crate::errors::WorkflowError;

/// Attempt budget for one pull. Total attempts = `max_retries + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

/// Pull `theme_id` into `local_path`, retrying until the directory is
/// non-empty or the budget runs out.
pub async fn pull_with_retry(
    cli: &dyn ThemeCli,
    theme_id: &str,
    local_path: &Path,
    policy: RetryPolicy,
) -> Result<PathBuf, WorkflowError> {
    tokio::fs::create_dir_all(local_path)
        .await
        .map_err(|source| WorkflowError::Directory {
            path: local_path.to_path_buf(),
            source,
        })?;

    let mut listing: Vec<String> = Vec::new();
    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            info!(
                theme_id,
                attempt,
                delay_secs = policy.retry_delay.as_secs(),
                "directory still empty, waiting before next pull"
            );
            tokio::time::sleep(policy.retry_delay).await;
        }

        info!(theme_id, attempt, path = %local_path.display(), "pulling theme");
        if let Err(e) = cli.pull_theme(theme_id, local_path).await {
            // Exit status is advisory; the directory listing decides.
            warn!(theme_id, attempt, error = %e, "theme pull reported an error");
        }

        listing = list_directory(local_path).await;
        if !listing.is_empty() {
            info!(
                theme_id,
                attempt,
                entries = listing.len(),
                "theme pulled"
            );
            return Ok(local_path.to_path_buf());
        }
    }

    warn!(
        theme_id,
        attempts = policy.max_retries + 1,
        last_listing = ?listing,
        "giving up on theme pull"
    );
    Err(WorkflowError::PullExhausted {
        theme_id: theme_id.to_string(),
        path: local_path.to_path_buf(),
        attempts: policy.max_retries + 1,
    })
}

/// Entry names directly under `path`. An unreadable directory lists as empty.
async fn list_directory(path: &Path) -> Vec<String> {
    let mut entries = match tokio::fs::read_dir(path).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot list pull directory");
            return Vec::new();
        }
    };

    let mut names = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names
}
