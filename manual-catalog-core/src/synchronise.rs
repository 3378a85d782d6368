//! High-level pipeline: scan the local tree, resolve links, write the catalog.
//!
//! # Steps
//! 1. Load the previous link index (relative path -> URL) for link reuse and
//!    merge-and-prune.
//! 2. Walk the scan root in file-name order; classify each file.
//! 3. Reuse the previous link of that exact file or ask the [`LinkResolver`]
//!    for one. A reused link that no longer validates is resolved afresh.
//! 4. Optionally probe the link with the [`LinkValidator`]; unreachable links
//!    go to the skipped-links list instead of the catalog.
//! 5. Write the catalog and the link index atomically, then the skipped-links
//!    log.
//!
//! # Error Handling
//! Per-file failures are logged and recorded in the [`SynchroniseReport`]; the
//! walk continues. Only errors that make the whole run meaningless (missing
//! scan root, unreadable previous catalog or link index, failure to write
//! output) return
//! `Err`, and in that case no catalog is written.

use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::catalog::{Catalog, LinkIndex};
use crate::classify::{Classification, PathClassifier};
use crate::config::{CatalogConfig, MergeMode};
use crate::contract::{LinkResolver, LinkValidator};
use crate::error::CatalogError;

/// Inputs for one catalog run.
#[derive(Debug, Clone)]
pub struct SynchroniseConfig {
    pub scan_root: PathBuf,
    pub catalog: CatalogConfig,
    pub validate_links: bool,
}

#[derive(Debug, Default)]
pub struct SynchroniseReport {
    /// Entries written to the catalog.
    pub entries: usize,
    /// Entries in the catalog file before this run.
    pub previous_entries: usize,
    /// Entries whose URL came from the previous catalog without a remote call.
    pub reused: usize,
    /// Previous entries kept because resolution failed this run.
    pub retained: Vec<String>,
    pub unstructured: Vec<String>,
    pub filtered: usize,
    pub reserved: Vec<String>,
    pub not_found: Vec<String>,
    /// `(relative path, reason)` for per-file failures.
    pub failed: Vec<(String, String)>,
    pub skipped_links: Vec<String>,
}

impl SynchroniseReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.skipped_links.is_empty() && self.not_found.is_empty()
    }
}

enum FileOutcome {
    Linked { url: String, reused: bool },
    NotFound,
    Invalid(String),
    /// `prior_valid` is false once the previous link was probed and rejected.
    Failed { reason: String, prior_valid: bool },
}

/// Converts a path under `root` to a `/`-separated relative path.
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

pub async fn synchronise<R, V>(
    config: &SynchroniseConfig,
    resolver: &R,
    validator: &V,
) -> Result<SynchroniseReport, CatalogError>
where
    R: LinkResolver + ?Sized,
    V: LinkValidator + ?Sized,
{
    info!(
        scan_root = %config.scan_root.display(),
        merge = ?config.catalog.merge,
        validate = config.validate_links,
        "[SYNC] Starting catalog synchronisation"
    );

    if !config.scan_root.is_dir() {
        error!(scan_root = %config.scan_root.display(), "[SYNC][ERROR] Scan root missing");
        return Err(CatalogError::ScanRoot(config.scan_root.clone()));
    }

    let previous_entries = Catalog::load(&config.catalog.output)?.len();
    let previous_links = LinkIndex::load(&config.catalog.link_index)?;
    let mut links = LinkIndex::new();

    let classifier = PathClassifier::new(
        &config.catalog.allowed_extensions,
        config.catalog.root_bucket.clone(),
    );
    let mut catalog = Catalog::new();
    let mut report = SynchroniseReport {
        previous_entries,
        ..SynchroniseReport::default()
    };

    let walker = WalkDir::new(&config.scan_root)
        .follow_links(true)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                warn!(path = %path, error = %e, "[SYNC] Unreadable directory entry, skipping");
                report.failed.push((path, e.to_string()));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(rel_path) = relative_path(&config.scan_root, entry.path()) else {
            continue;
        };

        let key = match classifier.classify(&rel_path) {
            Classification::Manual(key) => key,
            Classification::Unstructured => {
                warn!(path = %rel_path, "[SYNC] Skipped unstructured file");
                report.unstructured.push(rel_path);
                continue;
            }
            Classification::Filtered { extension } => {
                debug!(path = %rel_path, extension = %extension, "[SYNC] Extension not allowed");
                report.filtered += 1;
                continue;
            }
            Classification::ReservedModel => {
                warn!(
                    path = %rel_path,
                    root_bucket = %classifier.root_bucket(),
                    "[SYNC] Model folder uses the root bucket label, skipping"
                );
                report.reserved.push(rel_path);
                continue;
            }
        };

        let prior = previous_links.get(&rel_path);
        let outcome = process_file(config, resolver, validator, &rel_path, prior).await;

        match outcome {
            FileOutcome::Linked { url, reused } => {
                if reused {
                    report.reused += 1;
                }
                catalog.insert(&key, url.as_str());
                links.insert(rel_path, url);
            }
            FileOutcome::NotFound => report.not_found.push(rel_path),
            FileOutcome::Invalid(url) => {
                warn!(path = %rel_path, url = %url, "[SYNC] Skipping broken link");
                report.skipped_links.push(url);
            }
            FileOutcome::Failed {
                reason,
                prior_valid,
            } => {
                error!(path = %rel_path, error = %reason, "[SYNC][ERROR] Error processing file");
                let retain = config.catalog.merge == MergeMode::MergeAndPrune && prior_valid;
                if let Some(prior) = prior.filter(|_| retain) {
                    info!(path = %rel_path, "[SYNC] Retaining previous entry");
                    catalog.insert(&key, prior);
                    links.insert(rel_path.clone(), prior);
                    report.retained.push(rel_path.clone());
                }
                report.failed.push((rel_path, reason));
            }
        }
    }

    report.entries = catalog.len();
    catalog.save(&config.catalog.output)?;
    links.save(&config.catalog.link_index)?;
    write_skipped_links(&config.catalog.skipped_links_log, &report.skipped_links)?;

    info!(
        entries = report.entries,
        reused = report.reused,
        retained = report.retained.len(),
        unstructured = report.unstructured.len(),
        filtered = report.filtered,
        not_found = report.not_found.len(),
        failed = report.failed.len(),
        skipped_links = report.skipped_links.len(),
        "[SYNC] Synchronisation complete"
    );
    Ok(report)
}

async fn process_file<R, V>(
    config: &SynchroniseConfig,
    resolver: &R,
    validator: &V,
    rel_path: &str,
    prior: Option<&str>,
) -> FileOutcome
where
    R: LinkResolver + ?Sized,
    V: LinkValidator + ?Sized,
{
    let mut prior_valid = true;
    if let Some(url) = prior.filter(|_| config.catalog.reuse_existing_links) {
        if !config.validate_links || validator.is_valid(url).await {
            debug!(path = %rel_path, url = %url, "[SYNC] Reusing previous link");
            return FileOutcome::Linked {
                url: url.to_string(),
                reused: true,
            };
        }
        warn!(path = %rel_path, url = %url, "[SYNC] Previous link is broken, resolving a new one");
        prior_valid = false;
    }

    let url = match resolver.resolve(rel_path).await {
        Ok(Some(url)) => url,
        Ok(None) => return FileOutcome::NotFound,
        Err(e) => {
            return FileOutcome::Failed {
                reason: e.to_string(),
                prior_valid,
            }
        }
    };

    if config.validate_links && !validator.is_valid(&url).await {
        return FileOutcome::Invalid(url);
    }
    FileOutcome::Linked { url, reused: false }
}

/// Writes one URL per line, or removes a stale log when there is nothing to report.
fn write_skipped_links(path: &Path, links: &[String]) -> Result<(), CatalogError> {
    if links.is_empty() {
        match std::fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "Removed stale skipped-links log"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(CatalogError::io(path, e)),
        }
        return Ok(());
    }

    let mut content = links.join("\n");
    content.push('\n');
    std::fs::write(path, content).map_err(|e| CatalogError::io(path, e))?;
    warn!(
        path = %path.display(),
        count = links.len(),
        "Some broken links were skipped"
    );
    Ok(())
}
