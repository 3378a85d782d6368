use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, warn};

use crate::contract::LinkValidator;

/// `HEAD` probe that follows redirects and accepts 200 or 302 as the final status.
pub struct HttpLinkValidator {
    http: reqwest::Client,
}

impl HttpLinkValidator {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .redirect(Policy::limited(10))
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl LinkValidator for HttpLinkValidator {
    async fn is_valid(&self, url: &str) -> bool {
        match self.http.head(url).send().await {
            Ok(response) => {
                let status = response.status();
                let valid = status == StatusCode::OK || status == StatusCode::FOUND;
                debug!(url, %status, valid, "Link probed");
                valid
            }
            Err(e) => {
                warn!(url, error = %e, "Link validation failed");
                false
            }
        }
    }
}
