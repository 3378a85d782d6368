/// `load_config` module: loads the static YAML config into the core [`Config`].
///
/// # Responsibilities
/// - Parse the user-supplied YAML file into the strongly-typed core config.
/// - Resolve relative paths against the directory holding the config file, so
///   the watcher and a manual `sync` see the same files regardless of cwd.
/// - Apply environment overrides (`MANUAL_CATALOG_SCAN_ROOT`).
/// - Reject combinations that cannot run (Graph resolver without `auth`).
///
/// Secrets (tokens) are never read from YAML; see `manual_catalog_core::auth`.
use anyhow::{Context, Result};
use manual_catalog_core::config::{Config, ResolverConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const SCAN_ROOT_ENV: &str = "MANUAL_CATALOG_SCAN_ROOT";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let mut config: Config = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    if let Ok(scan_root) = std::env::var(SCAN_ROOT_ENV) {
        if !scan_root.is_empty() {
            info!(scan_root = %scan_root, "Scan root overridden from environment");
            config.scan_root = PathBuf::from(scan_root);
        }
    }

    let base = path_ref
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    config.rebase_paths(&base);

    if matches!(config.resolver, ResolverConfig::Graph(_)) && config.auth.is_none() {
        error!("Graph resolver configured without an auth section");
        anyhow::bail!("resolver type 'graph' requires an 'auth' section");
    }

    if config.catalog.allowed_extensions.is_empty() {
        anyhow::bail!("catalog.allowed_extensions must not be empty");
    }

    fs::metadata(&config.scan_root)
        .with_context(|| format!("scan root {} is not accessible", config.scan_root.display()))?;

    config.trace_loaded();
    Ok(config)
}
