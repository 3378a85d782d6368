//! Microsoft Graph client for a SharePoint document library.
//!
//! Site and drive ids are resolved once by [`GraphResolver::connect`]; a failure
//! there aborts the run. After that, each file costs one lookup and one
//! `createLink` call, and failures are scoped to that file.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::config::{GraphSource, HttpConfig};
use crate::contract::LinkResolver;
use crate::error::{CatalogError, ResolveError};
use crate::resolve::encode_path;

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DriveList {
    value: Vec<Drive>,
}

#[derive(Debug, Deserialize)]
struct Drive {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct CreateLinkResponse {
    link: SharingLink,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SharingLink {
    web_url: String,
}

/// Thin bearer-token client over the Graph REST API.
pub struct GraphClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    max_retries: u32,
    base_delay: Duration,
}

impl GraphClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        token: impl Into<String>,
        http_config: &HttpConfig,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            max_retries: http_config.max_retries,
            base_delay: Duration::from_millis(http_config.retry_base_delay_ms),
        }
    }

    /// Sends a request, retrying 429 and 5xx responses with exponential backoff.
    async fn send_with_retry(
        &self,
        url: &str,
        build_request: impl Fn() -> RequestBuilder,
    ) -> Result<Response, ResolveError> {
        let mut delay = self.base_delay;
        let mut attempt = 0;

        loop {
            let response = build_request()
                .bearer_auth(&self.token)
                .send()
                .await
                .map_err(|source| ResolveError::Http {
                    url: url.to_string(),
                    source,
                })?;

            let status = response.status();
            let retryable =
                status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if !retryable || attempt >= self.max_retries {
                return Ok(response);
            }

            attempt += 1;
            warn!(
                url,
                %status,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "[GRAPH] Transient response, retrying"
            );
            tokio::time::sleep(delay).await;
            delay *= 2;
        }
    }

    async fn error_for(url: &str, response: Response) -> ResolveError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        ResolveError::Status {
            url: url.to_string(),
            status,
            body,
        }
    }

    async fn json<T: serde::de::DeserializeOwned>(
        url: &str,
        response: Response,
    ) -> Result<T, ResolveError> {
        response.json::<T>().await.map_err(|e| ResolveError::Response {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn site_id(&self, hostname: &str, site_path: &str) -> Result<String, ResolveError> {
        let site_path = format!("/{}", site_path.trim_start_matches('/'));
        let url = format!("{}/sites/{}:{}", self.base_url, hostname, site_path);
        let response = self.send_with_retry(&url, || self.http.get(&url)).await?;
        if !response.status().is_success() {
            return Err(Self::error_for(&url, response).await);
        }
        Ok(Self::json::<IdOnly>(&url, response).await?.id)
    }

    /// Finds the drive (document library) called `library` in a site.
    #[instrument(skip(self), level = "debug")]
    pub async fn drive_id(
        &self,
        site_id: &str,
        library: &str,
    ) -> Result<Option<String>, ResolveError> {
        let url = format!("{}/sites/{}/drives", self.base_url, site_id);
        let response = self.send_with_retry(&url, || self.http.get(&url)).await?;
        if !response.status().is_success() {
            return Err(Self::error_for(&url, response).await);
        }
        let drives = Self::json::<DriveList>(&url, response).await?;
        Ok(drives
            .value
            .into_iter()
            .find(|d| d.name == library)
            .map(|d| d.id))
    }

    /// Looks up an item id by path inside the drive. `Ok(None)` on 404.
    #[instrument(skip(self), level = "debug")]
    pub async fn find_item_id(
        &self,
        drive_id: &str,
        remote_path: &str,
    ) -> Result<Option<String>, ResolveError> {
        let url = format!(
            "{}/drives/{}/root:/{}",
            self.base_url,
            drive_id,
            encode_path(remote_path)
        );
        let response = self.send_with_retry(&url, || self.http.get(&url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::error_for(&url, response).await);
        }
        Ok(Some(Self::json::<IdOnly>(&url, response).await?.id))
    }

    /// Creates (or returns the existing) anonymous view-only link for an item.
    #[instrument(skip(self), level = "debug")]
    pub async fn create_anonymous_link(
        &self,
        drive_id: &str,
        item_id: &str,
    ) -> Result<String, ResolveError> {
        let url = format!(
            "{}/drives/{}/items/{}/createLink",
            self.base_url, drive_id, item_id
        );
        let body = serde_json::json!({ "type": "view", "scope": "anonymous" });
        let response = self
            .send_with_retry(&url, || self.http.post(&url).json(&body))
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_for(&url, response).await);
        }
        Ok(Self::json::<CreateLinkResponse>(&url, response)
            .await?
            .link
            .web_url)
    }
}

/// Resolves local files to anonymous SharePoint links through Graph.
pub struct GraphResolver {
    client: GraphClient,
    drive_id: String,
    remote_prefix: String,
}

impl GraphResolver {
    /// Resolves the site and drive once. Any failure here is fatal for the run.
    pub async fn connect(client: GraphClient, source: &GraphSource) -> Result<Self, CatalogError> {
        info!(
            hostname = %source.site_hostname,
            site_path = %source.site_path,
            "[GRAPH] Resolving site and drive ids"
        );
        let site_id = client
            .site_id(&source.site_hostname, &source.site_path)
            .await
            .map_err(|e| CatalogError::Setup(format!("site resolution failed: {e}")))?;

        let drive_id = client
            .drive_id(&site_id, &source.library)
            .await
            .map_err(|e| CatalogError::Setup(format!("drive resolution failed: {e}")))?
            .ok_or_else(|| {
                CatalogError::Setup(format!("drive '{}' not found in site", source.library))
            })?;

        info!(site_id = %site_id, drive_id = %drive_id, "[GRAPH] Site and drive resolved");
        Ok(Self {
            client,
            drive_id,
            remote_prefix: source.remote_prefix.trim_matches('/').to_string(),
        })
    }

    pub fn remote_path(&self, relative_path: &str) -> String {
        if self.remote_prefix.is_empty() {
            relative_path.to_string()
        } else {
            format!("{}/{}", self.remote_prefix, relative_path)
        }
    }
}

#[async_trait]
impl LinkResolver for GraphResolver {
    async fn resolve(&self, relative_path: &str) -> Result<Option<String>, ResolveError> {
        let remote_path = self.remote_path(relative_path);
        debug!(remote_path = %remote_path, "[GRAPH] Looking up item");

        let Some(item_id) = self.client.find_item_id(&self.drive_id, &remote_path).await? else {
            warn!(remote_path = %remote_path, "[GRAPH] File not found in document library");
            return Ok(None);
        };

        let url = self
            .client
            .create_anonymous_link(&self.drive_id, &item_id)
            .await?;
        debug!(remote_path = %remote_path, url = %url, "[GRAPH] Anonymous link created");
        Ok(Some(url))
    }
}
