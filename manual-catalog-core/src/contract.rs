//! # contract: seams between the pipeline and the outside world
//!
//! Each trait here is implemented by a real client in this crate and by a
//! `mockall` mock for tests (exported under the `test-export-mocks` feature so
//! the CLI crate can use them as well).
//!
//! - [`LinkResolver`]: turns a path relative to the scan root into a shareable URL.
//! - [`LinkValidator`]: probes a URL for reachability.
//! - [`Rebuild`]: runs the catalog pipeline once on behalf of the watcher.
//! - [`Publisher`]: pushes the written catalog to version control.

use async_trait::async_trait;
use mockall::automock;

use crate::error::{PublishError, ResolveError, WatchError};

/// Resolves a local file to a shareable link.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait LinkResolver: Send + Sync {
    /// `relative_path` uses `/` separators and is relative to the scan root.
    ///
    /// `Ok(None)` means the file is not known to the remote store and should
    /// be skipped. `Err` is a per-file failure; the caller records it and
    /// continues with the next file.
    async fn resolve(&self, relative_path: &str) -> Result<Option<String>, ResolveError>;
}

/// Classifies a URL as reachable or not. Never fails.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait LinkValidator: Send + Sync {
    async fn is_valid(&self, url: &str) -> bool;
}

/// Runs the catalog pipeline end-to-end.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Rebuild: Send + Sync {
    async fn rebuild(&self) -> Result<(), WatchError>;
}

#[async_trait]
impl<T: Rebuild + ?Sized> Rebuild for Box<T> {
    async fn rebuild(&self) -> Result<(), WatchError> {
        (**self).rebuild().await
    }
}

/// Publishes the catalog file after a rebuild.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self) -> Result<PublishOutcome, PublishError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The catalog was committed and pushed.
    Pushed,
    /// Staging produced no change; nothing was committed.
    Unchanged,
}
