//! Run configuration for the catalog pipeline.
//!
//! Every component receives the section it needs at construction time; there
//! is no module-level state. All types deserialize from the YAML file loaded by
//! the CLI crate, with defaults for every optional field.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_ROOT_BUCKET: &str = "_root";
pub const DEFAULT_EXTENSIONS: [&str; 5] = [".pdf", ".doc", ".docx", ".zip", ".exe"];
pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub scan_root: PathBuf,
    #[serde(default)]
    pub catalog: CatalogConfig,
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
    #[serde(default)]
    pub watch: WatchConfig,
}

impl Config {
    pub fn trace_loaded(&self) {
        info!(
            scan_root = %self.scan_root.display(),
            output = %self.catalog.output.display(),
            resolver = self.resolver.kind(),
            validation = self.validation.enabled,
            merge = ?self.catalog.merge,
            "Loaded Config"
        );
        debug!(?self, "Config loaded (full debug)");
    }

    /// Files the pipeline and the watcher write themselves.
    pub fn generated_paths(&self) -> Vec<PathBuf> {
        vec![
            self.catalog.output.clone(),
            self.catalog.skipped_links_log.clone(),
            self.catalog.link_index.clone(),
            self.watch.log_file.clone(),
        ]
    }

    /// Resolves every relative path in the config against `base`.
    pub fn rebase_paths(&mut self, base: &Path) {
        let rebase = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        rebase(&mut self.scan_root);
        rebase(&mut self.catalog.output);
        rebase(&mut self.catalog.skipped_links_log);
        rebase(&mut self.catalog.link_index);
        rebase(&mut self.watch.log_file);
        rebase(&mut self.watch.git.repo_dir);
        if let Some(auth) = self.auth.as_mut() {
            rebase(&mut auth.credential_cache);
        }
    }
}

/// How the previous catalog file is combined with the current scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// Only entries produced by this run are written.
    Rebuild,
    /// Files no longer present are pruned; present files whose resolution errored keep their previous link.
    #[default]
    MergeAndPrune,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub output: PathBuf,
    pub skipped_links_log: PathBuf,
    /// Sidecar mapping each source file to the link written for it.
    pub link_index: PathBuf,
    pub root_bucket: String,
    pub allowed_extensions: Vec<String>,
    pub merge: MergeMode,
    pub reuse_existing_links: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("manuals.json"),
            skipped_links_log: PathBuf::from("skipped_links.log"),
            link_index: PathBuf::from("manuals.links.json"),
            root_bucket: DEFAULT_ROOT_BUCKET.to_string(),
            allowed_extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            merge: MergeMode::default(),
            reuse_existing_links: true,
        }
    }
}

/// Selects how a local relative path becomes a shareable URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolverConfig {
    Graph(GraphSource),
    PublicBase(PublicBaseSource),
}

impl ResolverConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            ResolverConfig::Graph(_) => "graph",
            ResolverConfig::PublicBase(_) => "public_base",
        }
    }
}

/// A SharePoint document library reached through Microsoft Graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSource {
    pub site_hostname: String,
    pub site_path: String,
    #[serde(default = "default_library")]
    pub library: String,
    /// Folder inside the library that mirrors the local scan root.
    #[serde(default)]
    pub remote_prefix: String,
    #[serde(default = "default_graph_base_url")]
    pub base_url: String,
}

/// A folder shared with "anyone with the link".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicBaseSource {
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub enabled: bool,
    pub timeout_secs: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 10,
        }
    }
}

impl ValidationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Timeouts and retry policy applied to every outbound API call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            max_retries: 3,
            retry_base_delay_ms: 500,
        }
    }
}

impl HttpConfig {
    /// Builds a client with explicit connect and read timeouts.
    pub fn client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .build()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub tenant_id: String,
    pub client_id: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub login_hint: String,
    #[serde(default = "default_credential_cache")]
    pub credential_cache: PathBuf,
    #[serde(default = "default_authority")]
    pub authority: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub log_file: PathBuf,
    pub debounce_ms: u64,
    /// When set, the rebuild runs as this external command instead of in-process.
    pub rebuild_command: Option<Vec<String>>,
    pub git: GitConfig,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("watcher_log.txt"),
            debounce_ms: 2000,
            rebuild_command: None,
            git: GitConfig::default(),
        }
    }
}

impl WatchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    pub enabled: bool,
    pub repo_dir: PathBuf,
    pub remote: Option<String>,
    pub branch: Option<String>,
    pub commit_message: String,
    pub push_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            repo_dir: PathBuf::from("."),
            remote: None,
            branch: None,
            commit_message: "Auto update from file watcher".to_string(),
            push_retries: 3,
            retry_base_delay_ms: 1000,
        }
    }
}

fn default_library() -> String {
    "Documents".to_string()
}

fn default_graph_base_url() -> String {
    DEFAULT_GRAPH_BASE_URL.to_string()
}

fn default_scopes() -> Vec<String> {
    ["Sites.Read.All", "Files.ReadWrite.All", "User.Read"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_credential_cache() -> PathBuf {
    PathBuf::from("credential_cache.json")
}

fn default_authority() -> String {
    DEFAULT_AUTHORITY.to_string()
}
