//! Derives a catalog key from a path relative to the scan root.
//!
//! Layout convention: `Manufacturer/Model/.../File.ext` or `Manufacturer/File.ext`.
//! Files placed directly under a manufacturer go into the root bucket.

use std::fmt;

/// Identifies one manual within a scan: `(manufacturer, model bucket, title)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScanKey {
    pub manufacturer: String,
    pub model: String,
    pub title: String,
}

impl fmt::Display for ScanKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.manufacturer, self.model, self.title)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Manual(ScanKey),
    /// Fewer than two path segments.
    Unstructured,
    /// Structured, but the extension is not in the allow-list.
    Filtered { extension: String },
    /// A model folder carries the root bucket label.
    ReservedModel,
}

#[derive(Debug, Clone)]
pub struct PathClassifier {
    allowed_extensions: Vec<String>,
    root_bucket: String,
}

impl PathClassifier {
    pub fn new<I, S>(allowed_extensions: I, root_bucket: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed_extensions = allowed_extensions
            .into_iter()
            .map(|e| {
                let e = e.as_ref().trim_start_matches('.').to_ascii_lowercase();
                format!(".{e}")
            })
            .collect();
        Self {
            allowed_extensions,
            root_bucket: root_bucket.into(),
        }
    }

    pub fn root_bucket(&self) -> &str {
        &self.root_bucket
    }

    /// Classifies a `/`-separated path relative to the scan root.
    pub fn classify(&self, relative_path: &str) -> Classification {
        let parts: Vec<&str> = relative_path.split('/').filter(|s| !s.is_empty()).collect();
        if parts.len() < 2 {
            return Classification::Unstructured;
        }

        let file_name = parts[parts.len() - 1];
        let (title, extension) = split_extension(file_name);
        if !self.allowed_extensions.contains(&extension) {
            return Classification::Filtered { extension };
        }

        let model = if parts.len() > 2 {
            if parts[1] == self.root_bucket {
                return Classification::ReservedModel;
            }
            parts[1]
        } else {
            self.root_bucket.as_str()
        };

        Classification::Manual(ScanKey {
            manufacturer: parts[0].to_string(),
            model: model.to_string(),
            title: title.to_string(),
        })
    }
}

/// Splits `name.ext` into `("name", ".ext")`, extension lowercased.
/// A leading dot (`.hidden`) is part of the stem, not an extension.
fn split_extension(file_name: &str) -> (&str, String) {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => (
            &file_name[..idx],
            file_name[idx..].to_ascii_lowercase(),
        ),
        _ => (file_name, String::new()),
    }
}
