//! Runtime configuration loaded from the environment.
//!
//! Every value comes from an environment variable (optionally seeded from a
//! `.env` file by the binary). Required keys are validated together at
//! startup so the process refuses to run with a partial configuration.
//!
//! | Variable                   | Required | Default        |
//! |----------------------------|----------|----------------|
//! | `SHOPIFY_FLAG_STORE`       | yes      |                |
//! | `SHOPIFY_CLI_THEME_TOKEN`  | yes      |                |
//! | `SESSION_ID`               | yes      |                |
//! | `WEBHOOK_BASE_URL`         | yes      |                |
//! | `WEBHOOK_USERNAME`         | yes      |                |
//! | `WEBHOOK_PASSWORD`         | yes      |                |
//! | `PORT`                     | no       | `3000`         |
//! | `MAX_PULL_RETRIES`         | no       | `3`            |
//! | `PULL_RETRY_DELAY_SECONDS` | no       | `5`            |
//! | `DUPLICATE_WAIT_SECONDS`   | no       | `10`           |
//! | `PULL_TIMEOUT_SECONDS`     | no       | `300`          |
//! | `DOWNLOAD_ROOT`            | no       | `./themes`     |
//! | `CODEX_MODEL`              | no       | `gpt-5-codex`  |
//! | `SHOPIFY_CMD`              | no       | `shopify`      |
//! | `CODEX_CMD`                | no       | `codex`        |
//! | `PREVIEW_PORT`             | no       | `9292`         |

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::ConfigError;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_PULL_RETRIES: u32 = 3;
pub const DEFAULT_PULL_RETRY_DELAY_SECS: u64 = 5;
pub const DEFAULT_DUPLICATE_WAIT_SECS: u64 = 10;
pub const DEFAULT_PULL_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_DOWNLOAD_ROOT: &str = "./themes";
pub const DEFAULT_MODEL: &str = "gpt-5-codex";
pub const DEFAULT_PREVIEW_PORT: u16 = 9292;

/// Variables the theme CLI reads its store and token from.
pub const STORE_ENV: &str = "SHOPIFY_FLAG_STORE";
pub const THEME_TOKEN_ENV: &str = "SHOPIFY_CLI_THEME_TOKEN";

const REQUIRED_KEYS: &[&str] = &[
    STORE_ENV,
    THEME_TOKEN_ENV,
    "SESSION_ID",
    "WEBHOOK_BASE_URL",
    "WEBHOOK_USERNAME",
    "WEBHOOK_PASSWORD",
];

/// Credentials for the theme platform CLI.
#[derive(Clone)]
pub struct StoreConfig {
    pub store: String,
    pub theme_token: String,
}

impl StoreConfig {
    /// Environment for a theme CLI child process. Credentials never go on
    /// the command line.
    pub fn child_env(&self) -> [(&'static str, &str); 2] {
        [
            (STORE_ENV, self.store.as_str()),
            (THEME_TOKEN_ENV, self.theme_token.as_str()),
        ]
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("store", &self.store)
            .field("theme_token", &"<redacted>")
            .finish()
    }
}

/// Target and credentials for outbound webhooks.
#[derive(Clone)]
pub struct WebhookConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Fully validated service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub store: StoreConfig,
    /// Names duplicated themes and addresses every webhook.
    pub session_id: String,
    pub webhook: WebhookConfig,
    pub max_pull_retries: u32,
    pub pull_retry_delay: Duration,
    pub duplicate_wait: Duration,
    pub pull_timeout: Duration,
    pub download_root: PathBuf,
    pub default_model: String,
    pub shopify_cmd: String,
    pub codex_cmd: String,
    pub preview_port: u16,
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Blank values count as absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let missing: Vec<&'static str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| get(key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }
        let required = |key: &str| get(key).unwrap_or_default();

        Ok(Self {
            port: parse_or(&get, "PORT", DEFAULT_PORT)?,
            store: StoreConfig {
                store: required(STORE_ENV),
                theme_token: required(THEME_TOKEN_ENV),
            },
            session_id: required("SESSION_ID"),
            webhook: WebhookConfig {
                base_url: required("WEBHOOK_BASE_URL"),
                username: required("WEBHOOK_USERNAME"),
                password: required("WEBHOOK_PASSWORD"),
            },
            max_pull_retries: parse_or(&get, "MAX_PULL_RETRIES", DEFAULT_MAX_PULL_RETRIES)?,
            pull_retry_delay: Duration::from_secs(parse_or(
                &get,
                "PULL_RETRY_DELAY_SECONDS",
                DEFAULT_PULL_RETRY_DELAY_SECS,
            )?),
            duplicate_wait: Duration::from_secs(parse_or(
                &get,
                "DUPLICATE_WAIT_SECONDS",
                DEFAULT_DUPLICATE_WAIT_SECS,
            )?),
            pull_timeout: Duration::from_secs(parse_or(
                &get,
                "PULL_TIMEOUT_SECONDS",
                DEFAULT_PULL_TIMEOUT_SECS,
            )?),
            download_root: get("DOWNLOAD_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DOWNLOAD_ROOT)),
            default_model: get("CODEX_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            shopify_cmd: get("SHOPIFY_CMD").unwrap_or_else(|| "shopify".to_string()),
            codex_cmd: get("CODEX_CMD").unwrap_or_else(|| "codex".to_string()),
            preview_port: parse_or(&get, "PREVIEW_PORT", DEFAULT_PREVIEW_PORT)?,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn required_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("SHOPIFY_FLAG_STORE", "demo.myshopify.com"),
            ("SHOPIFY_CLI_THEME_TOKEN", "shptka_secret"),
            ("SESSION_ID", "sess-42"),
            ("WEBHOOK_BASE_URL", "https://hooks.example.com"),
            ("WEBHOOK_USERNAME", "relay"),
            ("WEBHOOK_PASSWORD", "hunter2"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<Config, ConfigError> {
        Config::from_lookup(|key| env.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults_applied_when_optional_keys_absent() {
        let config = load(&required_env()).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.max_pull_retries, 3);
        assert_eq!(config.pull_retry_delay, Duration::from_secs(5));
        assert_eq!(config.duplicate_wait, Duration::from_secs(10));
        assert_eq!(config.pull_timeout, Duration::from_secs(300));
        assert_eq!(config.download_root, PathBuf::from("./themes"));
        assert_eq!(config.default_model, DEFAULT_MODEL);
        assert_eq!(config.shopify_cmd, "shopify");
        assert_eq!(config.codex_cmd, "codex");
        assert_eq!(config.preview_port, 9292);
        assert_eq!(config.session_id, "sess-42");
    }

    #[test]
    fn test_missing_required_keys_reported_together() {
        let mut env = required_env();
        env.remove("SESSION_ID");
        env.remove("WEBHOOK_PASSWORD");
        match load(&env) {
            Err(ConfigError::Missing(keys)) => {
                assert_eq!(keys, vec!["SESSION_ID", "WEBHOOK_PASSWORD"]);
            }
            other => panic!("Expected Missing, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let mut env = required_env();
        env.insert("WEBHOOK_BASE_URL", "   ");
        assert!(matches!(
            load(&env),
            Err(ConfigError::Missing(keys)) if keys == vec!["WEBHOOK_BASE_URL"]
        ));
    }

    #[test]
    fn test_overrides_are_parsed() {
        let mut env = required_env();
        env.insert("PORT", "8080");
        env.insert("MAX_PULL_RETRIES", "7");
        env.insert("PULL_RETRY_DELAY_SECONDS", "2");
        env.insert("DUPLICATE_WAIT_SECONDS", "0");
        env.insert("DOWNLOAD_ROOT", "/var/themes");
        env.insert("CODEX_MODEL", "o4-mini");
        let config = load(&env).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_pull_retries, 7);
        assert_eq!(config.pull_retry_delay, Duration::from_secs(2));
        assert_eq!(config.duplicate_wait, Duration::ZERO);
        assert_eq!(config.download_root, PathBuf::from("/var/themes"));
        assert_eq!(config.default_model, "o4-mini");
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let mut env = required_env();
        env.insert("MAX_PULL_RETRIES", "many");
        match load(&env) {
            Err(ConfigError::Invalid { key, value, .. }) => {
                assert_eq!(key, "MAX_PULL_RETRIES");
                assert_eq!(value, "many");
            }
            other => panic!("Expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_debug_output_redacts_secrets() {
        let config = load(&required_env()).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("shptka_secret"));
        assert!(debug.contains("<redacted>"));
    }
}
