//! In-memory registry of provisioned coding-agent environments.
//!
//! Entries are keyed by an `env_id` derived from the working directory, so
//! re-provisioning the same directory replaces the earlier entry. Two
//! different directories that normalise to the same id also replace each
//! other (last write wins).
//!
//! There is no expiry: entries live until `remove` or process exit, so a
//! long-running service that keeps provisioning grows without bound.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::agent::{AgentProvider, AgentSession, SessionConfig};

/// Replaces every character outside `[A-Za-z0-9]` in derived ids.
pub const ENV_ID_PLACEHOLDER: char = '_';

/// Derive the registry key for a working directory.
pub fn derive_env_id(working_directory: &Path) -> String {
    working_directory
        .to_string_lossy()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c
            } else {
                ENV_ID_PLACEHOLDER
            }
        })
        .collect()
}

/// A coding-agent session bound to one local theme directory.
#[derive(Clone)]
pub struct ProvisionedEnvironment {
    pub env_id: String,
    pub working_directory: PathBuf,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub session: Arc<dyn AgentSession>,
}

impl std::fmt::Debug for ProvisionedEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionedEnvironment")
            .field("env_id", &self.env_id)
            .field("working_directory", &self.working_directory)
            .field("model", &self.model)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Serialisable view of an environment, without the session handle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentSummary {
    pub env_id: String,
    pub working_directory: PathBuf,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

impl From<&ProvisionedEnvironment> for EnvironmentSummary {
    fn from(env: &ProvisionedEnvironment) -> Self {
        Self {
            env_id: env.env_id.clone(),
            working_directory: env.working_directory.clone(),
            model: env.model.clone(),
            created_at: env.created_at,
        }
    }
}

/// Owns every `ProvisionedEnvironment` for the life of the process.
///
/// The lock is only held for plain map operations, never across an await.
pub struct SessionRegistry {
    provider: Arc<dyn AgentProvider>,
    entries: Mutex<HashMap<String, ProvisionedEnvironment>>,
}

impl SessionRegistry {
    pub fn new(provider: Arc<dyn AgentProvider>) -> Self {
        Self {
            provider,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, ProvisionedEnvironment>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a full-access session for `working_directory` and register it,
    /// replacing any entry with the same derived id.
    pub fn create(&self, working_directory: &Path, model: &str) -> ProvisionedEnvironment {
        let env_id = derive_env_id(working_directory);
        let session = self.provider.start_session(SessionConfig {
            working_directory: working_directory.to_path_buf(),
            model: model.to_string(),
            full_access: true,
        });
        let env = ProvisionedEnvironment {
            env_id: env_id.clone(),
            working_directory: working_directory.to_path_buf(),
            model: model.to_string(),
            created_at: Utc::now(),
            session,
        };

        if let Some(previous) = self.entries().insert(env_id.clone(), env.clone()) {
            warn!(
                env_id = %env_id,
                previous = %previous.working_directory.display(),
                "replacing existing environment"
            );
        }
        info!(
            env_id = %env_id,
            path = %working_directory.display(),
            model,
            "environment provisioned"
        );
        env
    }

    pub fn get(&self, env_id: &str) -> Option<ProvisionedEnvironment> {
        self.entries().get(env_id).cloned()
    }

    pub fn list(&self) -> Vec<ProvisionedEnvironment> {
        self.entries().values().cloned().collect()
    }

    /// Returns true iff an entry existed.
    pub fn remove(&self, env_id: &str) -> bool {
        let removed = self.entries().remove(env_id).is_some();
        if removed {
            info!(env_id, "environment removed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
