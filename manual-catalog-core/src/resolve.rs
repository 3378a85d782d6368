//! Deterministic link construction for a publicly shared folder.

use async_trait::async_trait;
use tracing::debug;

use crate::contract::LinkResolver;
use crate::error::ResolveError;

/// Percent-encodes every segment of a `/`-separated path, keeping the separators.
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Builds `{base}/{encoded relative path}` with no remote lookup.
#[derive(Debug, Clone)]
pub struct PublicBaseResolver {
    base_url: String,
}

impl PublicBaseResolver {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url }
    }

    pub fn url_for(&self, relative_path: &str) -> String {
        format!("{}/{}", self.base_url, encode_path(relative_path))
    }
}

#[async_trait]
impl LinkResolver for PublicBaseResolver {
    async fn resolve(&self, relative_path: &str) -> Result<Option<String>, ResolveError> {
        let url = self.url_for(relative_path);
        debug!(relative_path, url = %url, "Constructed public link");
        Ok(Some(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://tenant.sharepoint.com/:f:/s/SupportFiles/Ek0";

    #[test]
    fn spaces_are_escaped_and_slashes_kept() {
        let resolver = PublicBaseResolver::new(BASE);
        assert_eq!(
            resolver.url_for("Acme/X1/manual 1.pdf"),
            format!("{BASE}/Acme/X1/manual%201.pdf")
        );
    }

    #[test]
    fn reserved_characters_are_escaped_per_segment() {
        let resolver = PublicBaseResolver::new(BASE);
        assert_eq!(
            resolver.url_for("R&D/Model #2/spec?.pdf"),
            format!("{BASE}/R%26D/Model%20%232/spec%3F.pdf")
        );
    }

    #[test]
    fn trailing_slash_on_base_is_tolerated() {
        let resolver = PublicBaseResolver::new(format!("{BASE}/"));
        assert_eq!(resolver.url_for("Acme/a.pdf"), format!("{BASE}/Acme/a.pdf"));
    }

    #[tokio::test]
    async fn resolve_always_returns_a_link() {
        let resolver = PublicBaseResolver::new(BASE);
        let url = resolver.resolve("Acme/X1/manual 1.pdf").await.unwrap();
        assert_eq!(url.as_deref(), Some(&*format!("{BASE}/Acme/X1/manual%201.pdf")));
    }
}
