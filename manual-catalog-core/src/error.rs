use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a whole catalog run.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("scan root {0} does not exist or is not a directory")]
    ScanRoot(PathBuf),

    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("catalog {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("setup failed: {0}")]
    Setup(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl CatalogError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CatalogError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Per-file failure while resolving a shareable link.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("unexpected response from {url}: {reason}")]
    Response { url: String, reason: String },
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no credential available; set GRAPH_ACCESS_TOKEN or bootstrap a refresh token for {login_hint}")]
    NoCredential { login_hint: String },

    #[error("token endpoint {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("token endpoint {url} returned {status}: {body}")]
    Rejected {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("credential cache {path}: {reason}")]
    Cache { path: PathBuf, reason: String },
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to launch `git {step}`: {source}")]
    Launch {
        step: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("`git {step}` exited with {status}: {stderr}")]
    Failed {
        step: &'static str,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("filesystem watcher error: {0}")]
    Notify(#[from] notify::Error),

    #[error("watcher log {path}: {source}")]
    Log {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("rebuild failed: {0}")]
    Rebuild(String),

    #[error(transparent)]
    Publish(#[from] PublishError),
}
