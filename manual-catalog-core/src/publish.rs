//! Publishes the catalog file to a git remote: add, commit, push.
//!
//! Each step's exit status is checked and the chain stops at the first
//! failure. `push` is retried with exponential backoff since it is the only
//! step that touches the network.

use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::config::GitConfig;
use crate::contract::{PublishOutcome, Publisher};
use crate::error::PublishError;

#[derive(Debug, Clone)]
pub struct GitPublisher {
    config: GitConfig,
    catalog_path: PathBuf,
}

impl GitPublisher {
    pub fn new(config: GitConfig, catalog_path: PathBuf) -> Self {
        Self {
            config,
            catalog_path,
        }
    }

    async fn git<I, S>(&self, step: &'static str, args: I) -> Result<Output, PublishError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = Command::new("git")
            .current_dir(&self.config.repo_dir)
            .args(args)
            .output()
            .await
            .map_err(|source| {
                error!(step, error = ?source, "[PUBLISH] Failed to launch git process");
                PublishError::Launch { step, source }
            })?;
        debug!(step, status = ?output.status, "[PUBLISH] git finished");
        Ok(output)
    }

    async fn git_checked<I, S>(&self, step: &'static str, args: I) -> Result<Output, PublishError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = self.git(step, args).await?;
        if output.status.success() {
            return Ok(output);
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        error!(step, status = %output.status, stderr = %stderr, "[PUBLISH] git exited with non-zero code");
        Err(PublishError::Failed {
            step,
            status: output.status,
            stderr,
        })
    }

    /// Whether the index holds changes to the catalog. `git diff --quiet` exits 1 when it does.
    async fn catalog_staged(&self) -> Result<bool, PublishError> {
        let output = self.git(
            "diff",
            [
                OsStr::new("diff"),
                OsStr::new("--cached"),
                OsStr::new("--quiet"),
                OsStr::new("--"),
                self.catalog_path.as_os_str(),
            ],
        )
        .await?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(PublishError::Failed {
                step: "diff",
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }

    fn push_args(&self) -> Vec<String> {
        let mut args = vec!["push".to_string()];
        if let Some(remote) = &self.config.remote {
            args.push(remote.clone());
            if let Some(branch) = &self.config.branch {
                args.push(branch.clone());
            }
        }
        args
    }

    async fn push_with_retry(&self) -> Result<(), PublishError> {
        let args = self.push_args();
        let mut delay = Duration::from_millis(self.config.retry_base_delay_ms);
        let mut attempt = 0;
        loop {
            match self.git_checked("push", &args).await {
                Ok(_) => return Ok(()),
                Err(e) if attempt < self.config.push_retries => {
                    attempt += 1;
                    warn!(
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "[PUBLISH] Push failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn add_commit_push(&self) -> Result<PublishOutcome, PublishError> {
        info!(
            repo = %self.config.repo_dir.display(),
            catalog = %self.catalog_path.display(),
            "[PUBLISH] Staging catalog"
        );
        self.git_checked(
            "add",
            [OsStr::new("add"), OsStr::new("--"), self.catalog_path.as_os_str()],
        )
        .await?;

        if !self.catalog_staged().await? {
            info!("[PUBLISH] Catalog unchanged, nothing to commit");
            return Ok(PublishOutcome::Unchanged);
        }

        self.git_checked(
            "commit",
            [
                OsStr::new("commit"),
                OsStr::new("-m"),
                OsStr::new(&self.config.commit_message),
                OsStr::new("--"),
                self.catalog_path.as_os_str(),
            ],
        )
        .await?;
        info!("[PUBLISH] Catalog committed");

        self.push_with_retry().await?;
        info!("[PUBLISH] Catalog pushed");
        Ok(PublishOutcome::Pushed)
    }
}

#[async_trait]
impl Publisher for GitPublisher {
    async fn publish(&self) -> Result<PublishOutcome, PublishError> {
        self.add_commit_push().await
    }
}
