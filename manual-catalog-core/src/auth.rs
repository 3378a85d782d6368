//! Non-interactive bearer token acquisition for Graph.
//!
//! Order of precedence:
//! 1. `GRAPH_ACCESS_TOKEN` (used as-is).
//! 2. A refresh token from the credential cache file, or `GRAPH_REFRESH_TOKEN`,
//!    exchanged at the identity provider's token endpoint.
//!
//! A rotated refresh token is written back to the cache only when it changed.
//! The interactive login that produces the first refresh token is not part of
//! this crate.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::AuthConfig;
use crate::error::AuthError;

pub const ACCESS_TOKEN_ENV: &str = "GRAPH_ACCESS_TOKEN";
pub const REFRESH_TOKEN_ENV: &str = "GRAPH_REFRESH_TOKEN";

/// On-disk session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialCache {
    pub refresh_token: String,
    #[serde(default)]
    pub account: Option<String>,
}

impl CredentialCache {
    pub fn load(path: &Path) -> Result<Option<Self>, AuthError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AuthError::Cache {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })
            }
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| AuthError::Cache {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    pub fn save(&self, path: &Path) -> Result<(), AuthError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| AuthError::Cache {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        std::fs::write(path, json).map_err(|e| AuthError::Cache {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

pub struct TokenProvider {
    http: reqwest::Client,
    config: AuthConfig,
}

impl TokenProvider {
    pub fn new(http: reqwest::Client, config: AuthConfig) -> Self {
        Self { http, config }
    }

    pub fn token_endpoint(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.config.authority.trim_end_matches('/'),
            self.config.tenant_id
        )
    }

    pub async fn access_token(&self) -> Result<String, AuthError> {
        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
            if !token.is_empty() {
                info!("Using access token from {ACCESS_TOKEN_ENV}");
                return Ok(token);
            }
        }

        let cache_path = &self.config.credential_cache;
        let cached = CredentialCache::load(cache_path)?;
        let refresh_token = match (&cached, std::env::var(REFRESH_TOKEN_ENV)) {
            (Some(cache), _) => cache.refresh_token.clone(),
            (None, Ok(token)) if !token.is_empty() => token,
            _ => {
                return Err(AuthError::NoCredential {
                    login_hint: self.config.login_hint.clone(),
                })
            }
        };

        let response = self.redeem(&refresh_token).await?;

        if let Some(rotated) = response.refresh_token {
            if rotated != refresh_token {
                let updated = CredentialCache {
                    refresh_token: rotated,
                    account: cached
                        .and_then(|c| c.account)
                        .or_else(|| Some(self.config.login_hint.clone()).filter(|h| !h.is_empty())),
                };
                match updated.save(cache_path) {
                    Ok(()) => debug!(path = %cache_path.display(), "Credential cache updated"),
                    Err(e) => warn!(error = %e, "Failed to persist rotated refresh token"),
                }
            }
        }

        info!("Access token acquired via refresh token");
        Ok(response.access_token)
    }

    async fn redeem(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        let url = self.token_endpoint();
        let mut scopes = self.config.scopes.clone();
        if !scopes.iter().any(|s| s == "offline_access") {
            scopes.push("offline_access".to_string());
        }
        let scope = scopes.join(" ");
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.config.client_id.as_str()),
            ("refresh_token", refresh_token),
            ("scope", scope.as_str()),
        ];

        let response = self
            .http
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|source| AuthError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected { url, status, body });
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|source| AuthError::Http { url, source })
    }
}
