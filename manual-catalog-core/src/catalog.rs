//! The persisted catalog: `manufacturer -> model -> [ {title, url} ]`.
//!
//! The canonical on-disk shape stores each model bucket as a bare array.
//! Files written by older tooling wrap each bucket as `{ "manuals": [...] }`;
//! [`Catalog::load`] accepts both and [`Catalog::save`] always writes the
//! canonical shape.
//!
//! [`LinkIndex`] is the sidecar that remembers which URL was minted for which
//! source file, so links can be reused across runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use crate::classify::ScanKey;
use crate::error::CatalogError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualEntry {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Catalog {
    manufacturers: BTreeMap<String, BTreeMap<String, Vec<ManualEntry>>>,
}

/// A model bucket as found on disk; the JSON value kind discriminates the shape.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredBucket {
    Entries(Vec<ManualEntry>),
    Wrapped { manuals: Vec<ManualEntry> },
}

impl StoredBucket {
    fn into_entries(self) -> Vec<ManualEntry> {
        match self {
            StoredBucket::Entries(entries) => entries,
            StoredBucket::Wrapped { manuals } => manuals,
        }
    }
}

impl<'de> Deserialize<'de> for Catalog {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = BTreeMap::<String, BTreeMap<String, StoredBucket>>::deserialize(deserializer)?;
        let manufacturers = raw
            .into_iter()
            .map(|(manufacturer, models)| {
                let models = models
                    .into_iter()
                    .map(|(model, bucket)| (model, bucket.into_entries()))
                    .collect();
                (manufacturer, models)
            })
            .collect();
        Ok(Catalog { manufacturers })
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &ScanKey, url: impl Into<String>) {
        self.manufacturers
            .entry(key.manufacturer.clone())
            .or_default()
            .entry(key.model.clone())
            .or_default()
            .push(ManualEntry {
                title: key.title.clone(),
                url: url.into(),
            });
    }

    pub fn entries(&self, manufacturer: &str, model: &str) -> Option<&[ManualEntry]> {
        self.manufacturers
            .get(manufacturer)
            .and_then(|models| models.get(model))
            .map(Vec::as_slice)
    }

    pub fn manufacturers(&self) -> impl Iterator<Item = &str> {
        self.manufacturers.keys().map(String::as_str)
    }

    pub fn models(&self, manufacturer: &str) -> impl Iterator<Item = &str> {
        self.manufacturers
            .get(manufacturer)
            .into_iter()
            .flat_map(|models| models.keys().map(String::as_str))
    }

    pub fn len(&self) -> usize {
        self.manufacturers
            .values()
            .flat_map(|models| models.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Loads a catalog file; a missing file is an empty catalog.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No previous catalog, starting empty");
                return Ok(Catalog::new());
            }
            Err(e) => return Err(CatalogError::io(path, e)),
        };
        let catalog: Catalog =
            serde_json::from_str(&content).map_err(|source| CatalogError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        info!(path = %path.display(), entries = catalog.len(), "Loaded previous catalog");
        Ok(catalog)
    }

    /// Writes pretty JSON atomically over `path`.
    pub fn save(&self, path: &Path) -> Result<(), CatalogError> {
        write_json_atomic(path, self)?;
        info!(path = %path.display(), entries = self.len(), "Catalog written");
        Ok(())
    }
}

/// Relative source path -> URL for every entry of the last written catalog.
///
/// Stored beside the catalog so that a previous link is only ever reused for
/// the exact file it was minted for. Titles are not unique (`manual.pdf` and
/// `manual.zip` share one), so the catalog itself cannot serve as the index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkIndex {
    links: BTreeMap<String, String>,
}

impl LinkIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, relative_path: &str) -> Option<&str> {
        self.links.get(relative_path).map(String::as_str)
    }

    pub fn insert(&mut self, relative_path: impl Into<String>, url: impl Into<String>) {
        self.links.insert(relative_path.into(), url.into());
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Loads the index; a missing file is an empty index.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No link index, every file will be resolved");
                return Ok(LinkIndex::new());
            }
            Err(e) => return Err(CatalogError::io(path, e)),
        };
        serde_json::from_str(&content).map_err(|source| CatalogError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), CatalogError> {
        write_json_atomic(path, self)?;
        debug!(path = %path.display(), links = self.len(), "Link index written");
        Ok(())
    }
}

/// Temp files created while writing outputs start with this prefix.
pub const TEMP_FILE_PREFIX: &str = ".manual-catalog-";

/// Writes pretty JSON to a temp file beside `path`, then renames it over `path`.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), CatalogError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| CatalogError::io(dir, e))?;

    let json = serde_json::to_string_pretty(value).map_err(|source| CatalogError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_FILE_PREFIX)
        .tempfile_in(dir)
        .map_err(|e| CatalogError::io(dir, e))?;
    tmp.write_all(json.as_bytes())
        .and_then(|_| tmp.write_all(b"\n"))
        .map_err(|e| CatalogError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| CatalogError::io(path, e.error))?;
    Ok(())
}
