//! Tracing subscriber setup.
//!
//! `RUST_LOG` filters (default `info`), `LOG_FORMAT=json` switches stdout to
//! JSON lines, and `LOG_DIR` adds a daily rolling JSON file. Keep the
//! returned guard alive for the process lifetime or buffered file output is
//! lost.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "info,tower_http=info";
const LOG_FILE_PREFIX: &str = "theme-relay.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    /// Anything other than `json` (case-insensitive) is `Pretty`.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSettings {
    pub format: LogFormat,
    pub dir: Option<PathBuf>,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            format: LogFormat::parse(lookup("LOG_FORMAT").as_deref()),
            dir: lookup("LOG_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        }
    }
}

/// Install the global subscriber. A second call is a no-op.
pub fn init(settings: &LogSettings) -> Option<WorkerGuard> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let (json_layer, pretty_layer) = match settings.format {
        LogFormat::Json => (Some(fmt::layer().json()), None),
        LogFormat::Pretty => (None, Some(fmt::layer().with_target(false))),
    };

    let (file_layer, guard) = match &settings.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(pretty_layer)
        .with(file_layer)
        .try_init()
        .ok();

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse(Some("json")), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some(" JSON ")), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some("text")), LogFormat::Pretty);
        assert_eq!(LogFormat::parse(None), LogFormat::Pretty);
    }

    #[test]
    fn test_settings_ignore_blank_dir() {
        let settings = LogSettings::from_lookup(|key| match key {
            "LOG_DIR" => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(settings, LogSettings::default());

        let settings = LogSettings::from_lookup(|key| match key {
            "LOG_DIR" => Some("/var/log/relay".to_string()),
            "LOG_FORMAT" => Some("json".to_string()),
            _ => None,
        });
        assert_eq!(settings.dir, Some(PathBuf::from("/var/log/relay")));
        assert_eq!(settings.format, LogFormat::Json);
    }
}
