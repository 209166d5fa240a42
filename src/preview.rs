//! Local preview server launcher.
//!
//! Starts `shopify theme dev` against a pulled directory and leaves it
//! running. A watcher task logs the exit; nothing restarts it.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::config::StoreConfig;

#[async_trait]
pub trait PreviewLauncher: Send + Sync {
    /// Start a preview for `directory`. Returns once the process is spawned.
    async fn launch(&self, directory: &Path) -> std::io::Result<()>;
}

pub struct ShopifyPreview {
    program: String,
    store: StoreConfig,
    port: u16,
}

impl ShopifyPreview {
    pub fn new(program: impl Into<String>, store: StoreConfig, port: u16) -> Self {
        Self {
            program: program.into(),
            store,
            port,
        }
    }
}

#[async_trait]
impl PreviewLauncher for ShopifyPreview {
    async fn launch(&self, directory: &Path) -> std::io::Result<()> {
        let mut child = Command::new(&self.program)
            .arg("theme")
            .arg("dev")
            .arg("--path")
            .arg(directory)
            .arg("--port")
            .arg(self.port.to_string())
            .envs(self.store.child_env())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        let pid = child.id();
        let dir = directory.display().to_string();
        info!(pid = ?pid, path = %dir, port = self.port, "preview server started");

        // Not tracked by BackgroundTasks: this outlives any request.
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {
                    info!(pid = ?pid, path = %dir, "preview server exited")
                }
                Ok(status) => warn!(
                    pid = ?pid,
                    path = %dir,
                    code = ?status.code(),
                    "preview server exited with failure"
                ),
                Err(e) => {
                    error!(pid = ?pid, path = %dir, error = %e, "failed waiting on preview server")
                }
            }
        });
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_launch_passes_directory_port_and_credentials() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("args.txt");
        let script = dir.path().join("shopify");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\necho \"$* | $SHOPIFY_FLAG_STORE | $SHOPIFY_CLI_THEME_TOKEN\" > {}\n",
                marker.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let launcher = ShopifyPreview::new(
            script.to_string_lossy(),
            StoreConfig {
                store: "demo.myshopify.com".into(),
                theme_token: "secret".into(),
            },
            9393,
        );
        launcher.launch(dir.path()).await.unwrap();

        let mut args = String::new();
        for _ in 0..50 {
            if let Ok(text) = std::fs::read_to_string(&marker)
                && !text.is_empty()
            {
                args = text;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let (argv, env) = args.trim_end().split_once(" | ").unwrap();
        assert!(argv.starts_with("theme dev --path "));
        assert!(argv.ends_with("--port 9393"));
        assert!(!argv.contains("secret"));
        assert_eq!(env, "demo.myshopify.com | secret");
    }

    #[tokio::test]
    async fn test_launch_missing_executable_fails() {
        let dir = TempDir::new().unwrap();
        let launcher = ShopifyPreview::new(
            "/nonexistent/shopify",
            StoreConfig {
                store: "s".into(),
                theme_token: "t".into(),
            },
            9292,
        );
        assert!(launcher.launch(dir.path()).await.is_err());
    }
}
