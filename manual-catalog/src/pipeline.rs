//! Wires a loaded [`Config`] into the core pipeline: credentials, resolver,
//! validator, then [`synchronise`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use manual_catalog_core::auth::TokenProvider;
use manual_catalog_core::config::{Config, ResolverConfig};
use manual_catalog_core::contract::{LinkResolver, Rebuild};
use manual_catalog_core::error::WatchError;
use manual_catalog_core::graph::{GraphClient, GraphResolver};
use manual_catalog_core::resolve::PublicBaseResolver;
use manual_catalog_core::synchronise::{synchronise, SynchroniseConfig, SynchroniseReport};
use manual_catalog_core::validate::HttpLinkValidator;

/// Builds the configured resolver. For Graph this authenticates and resolves
/// the site and drive, so failures here abort the run before any file is read.
pub async fn build_resolver(config: &Config) -> Result<Box<dyn LinkResolver>> {
    match &config.resolver {
        ResolverConfig::PublicBase(source) => {
            tracing::info!(base_url = %source.base_url, "Using public base resolver");
            Ok(Box::new(PublicBaseResolver::new(source.base_url.clone())))
        }
        ResolverConfig::Graph(source) => {
            let auth = config
                .auth
                .clone()
                .context("resolver type 'graph' requires an 'auth' section")?;
            let http = config.http.client().context("Failed to build HTTP client")?;

            tracing::info!("Authenticating with Microsoft Graph");
            let token = TokenProvider::new(http.clone(), auth)
                .access_token()
                .await
                .context("Authentication failed")?;

            let client = GraphClient::new(http, source.base_url.clone(), token, &config.http);
            let resolver = GraphResolver::connect(client, source)
                .await
                .context("Failed to resolve SharePoint site and drive")?;
            Ok(Box::new(resolver))
        }
    }
}

/// Runs one full catalog build.
pub async fn run_catalog(config: &Config) -> Result<SynchroniseReport> {
    let resolver = build_resolver(config).await?;
    let validator = HttpLinkValidator::new(config.validation.timeout())
        .context("Failed to build link validator")?;

    let sync_config = SynchroniseConfig {
        scan_root: config.scan_root.clone(),
        catalog: config.catalog.clone(),
        validate_links: config.validation.enabled,
    };
    let report = synchronise(&sync_config, &*resolver, &validator)
        .await
        .context("Catalog synchronisation failed")?;
    Ok(report)
}

/// In-process rebuild used by the watcher when no external command is configured.
pub struct PipelineRebuild {
    config: Config,
}

impl PipelineRebuild {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Rebuild for PipelineRebuild {
    async fn rebuild(&self) -> Result<(), WatchError> {
        let report = run_catalog(&self.config)
            .await
            .map_err(|e| WatchError::Rebuild(format!("{e:#}")))?;
        tracing::info!(
            entries = report.entries,
            failed = report.failed.len(),
            "Rebuild finished"
        );
        Ok(())
    }
}
