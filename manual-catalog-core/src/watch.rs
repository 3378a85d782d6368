//! Change watcher: rebuild and publish the catalog when the manual tree changes.
//!
//! Filesystem notifications are forwarded into a channel. A burst of events is
//! coalesced into one batch: after the first event the watcher keeps draining
//! until the channel has been quiet for the debounce window, then runs a
//! single rebuild (and publish) for the whole batch, or after
//! [`MAX_BATCH_WINDOWS`] windows when the events never stop. Events arriving
//! while a rebuild is in progress stay queued and form the next batch.
//!
//! Files the pipeline writes itself (catalog, link index, logs and their temp
//! files) are dropped from every batch, so a rebuild never triggers another.

use async_trait::async_trait;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::fs::OpenOptions;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::catalog::TEMP_FILE_PREFIX;
use crate::contract::{PublishOutcome, Publisher, Rebuild};
use crate::error::WatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Processing,
}

/// Append-only, timestamped text log.
#[derive(Debug, Clone)]
pub struct WatchLog {
    path: PathBuf,
}

impl WatchLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, message: &str) -> Result<(), WatchError> {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| WatchError::Log {
                path: self.path.clone(),
                source,
            })?;
        writeln!(file, "[{timestamp}] {message}").map_err(|source| WatchError::Log {
            path: self.path.clone(),
            source,
        })
    }

    fn append_or_warn(&self, message: &str) {
        if let Err(e) = self.append(message) {
            warn!(error = %e, "[WATCH] Failed to write watcher log");
        }
    }
}

/// Upper bound on one batch, in debounce windows.
pub const MAX_BATCH_WINDOWS: u32 = 10;

/// Waits for the next burst of events.
///
/// Returns `None` once the channel is closed and empty. Otherwise returns
/// every event received until no new event arrived for `window`, or until
/// `MAX_BATCH_WINDOWS * window` passed since the first event.
pub async fn next_batch(
    rx: &mut UnboundedReceiver<PathBuf>,
    window: Duration,
) -> Option<Vec<PathBuf>> {
    let first = rx.recv().await?;
    let deadline = Instant::now() + window * MAX_BATCH_WINDOWS;
    let mut batch = vec![first];
    loop {
        let now = Instant::now();
        if now >= deadline {
            debug!(events = batch.len(), "[WATCH] Changes keep arriving, closing batch");
            break;
        }
        match tokio::time::timeout(window.min(deadline - now), rx.recv()).await {
            Ok(Some(path)) => batch.push(path),
            // closed: deliver what we have, the next call returns None
            Ok(None) => break,
            Err(_quiet) => break,
        }
    }
    Some(batch)
}

/// Files written by the pipeline or the watcher itself.
#[derive(Debug, Clone, Default)]
pub struct IgnoredPaths {
    files: Vec<PathBuf>,
}

impl IgnoredPaths {
    pub fn new<I: IntoIterator<Item = PathBuf>>(files: I) -> Self {
        let mut ignored = Self::default();
        ignored.extend(files);
        ignored
    }

    pub fn extend<I: IntoIterator<Item = PathBuf>>(&mut self, files: I) {
        self.files
            .extend(files.into_iter().map(|path| normalise(&path)));
    }

    /// True for an ignored file, or a temp file written beside one.
    pub fn matches(&self, path: &Path) -> bool {
        let path = normalise(path);
        if self.files.contains(&path) {
            return true;
        }
        let is_temp = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(TEMP_FILE_PREFIX));
        is_temp && self.files.iter().any(|file| file.parent() == path.parent())
    }
}

/// Canonical form of `path`, also for files that do not exist (any more).
fn normalise(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|parent| parent.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}

/// Runs the rebuild as a separate process and checks its exit status.
#[derive(Debug, Clone)]
pub struct CommandRebuild {
    command: Vec<String>,
    current_dir: Option<PathBuf>,
}

impl CommandRebuild {
    pub fn new(command: Vec<String>, current_dir: Option<PathBuf>) -> Self {
        Self {
            command,
            current_dir,
        }
    }
}

#[async_trait]
impl Rebuild for CommandRebuild {
    async fn rebuild(&self) -> Result<(), WatchError> {
        let Some((program, args)) = self.command.split_first() else {
            return Err(WatchError::Rebuild("rebuild command is empty".to_string()));
        };
        let mut command = Command::new(program);
        command.args(args);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        let status = command
            .status()
            .await
            .map_err(|e| WatchError::Rebuild(format!("failed to launch {program}: {e}")))?;
        if status.success() {
            info!(program = %program, "[WATCH] Rebuild command finished");
            Ok(())
        } else {
            Err(WatchError::Rebuild(format!("{program} exited with {status}")))
        }
    }
}

pub struct ChangeWatcher<R, P> {
    scan_root: PathBuf,
    debounce: Duration,
    log: WatchLog,
    rebuild: R,
    publisher: Option<P>,
    ignored: IgnoredPaths,
    processing: AtomicBool,
}

impl<R, P> ChangeWatcher<R, P>
where
    R: Rebuild,
    P: Publisher,
{
    pub fn new(
        scan_root: PathBuf,
        debounce: Duration,
        log: WatchLog,
        rebuild: R,
        publisher: Option<P>,
    ) -> Self {
        let ignored = IgnoredPaths::new([log.path().to_path_buf()]);
        Self {
            scan_root,
            debounce,
            log,
            rebuild,
            publisher,
            ignored,
            processing: AtomicBool::new(false),
        }
    }

    /// Drops events for these files (and their temp siblings) from every batch.
    pub fn ignore_paths<I: IntoIterator<Item = PathBuf>>(mut self, paths: I) -> Self {
        self.ignored.extend(paths);
        self
    }

    pub fn state(&self) -> WatchState {
        if self.processing.load(Ordering::SeqCst) {
            WatchState::Processing
        } else {
            WatchState::Idle
        }
    }

    /// Watches the scan root until `shutdown` resolves.
    pub async fn run<F>(&self, shutdown: F) -> Result<(), WatchError>
    where
        F: Future<Output = ()>,
    {
        let (tx, rx) = unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if matches!(event.kind, EventKind::Access(_)) {
                    return;
                }
                for path in event.paths {
                    // receiver gone means the watcher is shutting down
                    let _ = tx.send(path);
                }
            }
            Err(e) => warn!(error = %e, "[WATCH] Notification error"),
        })?;
        watcher.watch(&self.scan_root, RecursiveMode::Recursive)?;

        info!(
            scan_root = %self.scan_root.display(),
            debounce_ms = self.debounce.as_millis() as u64,
            "[WATCH] File watcher started"
        );
        self.log.append_or_warn("File watcher started.");

        let rebuilds = self.process_events(rx, shutdown).await;

        drop(watcher);
        self.log.append_or_warn("File watcher stopped.");
        info!(rebuilds, "[WATCH] File watcher stopped");
        Ok(())
    }

    /// Consumes change events until the channel closes or `shutdown` resolves.
    /// Returns the number of rebuilds performed.
    pub async fn process_events<F>(&self, mut rx: UnboundedReceiver<PathBuf>, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut rebuilds = 0;
        loop {
            let batch = tokio::select! {
                _ = &mut shutdown => break,
                batch = next_batch(&mut rx, self.debounce) => batch,
            };
            let Some(batch) = batch else {
                debug!("[WATCH] Event channel closed");
                break;
            };
            let batch: Vec<PathBuf> = batch
                .into_iter()
                .filter(|path| !self.ignored.matches(path))
                .collect();
            if batch.is_empty() {
                debug!("[WATCH] Only self-written files changed, nothing to rebuild");
                continue;
            }
            for path in &batch {
                self.log
                    .append_or_warn(&format!("Change detected: {}", path.display()));
            }
            info!(events = batch.len(), "[WATCH] Change burst settled, rebuilding");
            self.handle_batch().await;
            rebuilds += 1;
        }
        rebuilds
    }

    async fn handle_batch(&self) {
        self.processing.store(true, Ordering::SeqCst);

        match self.rebuild.rebuild().await {
            Ok(()) => {
                if let Some(publisher) = &self.publisher {
                    match publisher.publish().await {
                        Ok(PublishOutcome::Pushed) => {
                            self.log.append_or_warn("Catalog published.");
                        }
                        Ok(PublishOutcome::Unchanged) => {
                            debug!("[WATCH] Catalog unchanged after rebuild");
                        }
                        Err(e) => {
                            error!(error = %e, "[WATCH] Publishing failed");
                            self.log.append_or_warn(&format!("Publish failed: {e}"));
                        }
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "[WATCH] Rebuild failed");
                self.log.append_or_warn(&format!("Rebuild failed: {e}"));
            }
        }

        self.processing.store(false, Ordering::SeqCst);
    }
}
