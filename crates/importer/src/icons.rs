//! Icon retrieval and inlining
//!
//! Dosage-form icons referenced by the upload live on an external CDN. When
//! inlining is enabled the fetcher downloads the image and rewrites the
//! reference as a base64 `data:` URL so the catalog no longer depends on the
//! external host. Any failure (network, status, size cap, non-image content)
//! falls back to storing the original URL unchanged; icon retrieval is never
//! fatal for a row.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rxcatalog_common::config::IconConfig;
use std::time::Duration;
use tracing::{debug, warn};

pub struct IconFetcher {
    client: reqwest::Client,
    enabled: bool,
    max_bytes: usize,
}

impl IconFetcher {
    pub fn new(config: &IconConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            enabled: config.inline,
            max_bytes: config.max_bytes,
        }
    }

    /// Resolve the stored value for an icon reference: an inlined `data:` URL
    /// on success, the original URL on any failure or when inlining is off.
    pub async fn inline_or_passthrough(&self, icon_url: &str) -> String {
        if !self.enabled || icon_url.is_empty() || icon_url.starts_with("data:") {
            return icon_url.to_string();
        }

        match self.fetch_data_url(icon_url).await {
            Some(data_url) => data_url,
            None => icon_url.to_string(),
        }
    }

    async fn fetch_data_url(&self, url: &str) -> Option<String> {
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(url, error = %e, "Icon download failed, keeping original URL");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(url, status = %response.status(), "Icon download rejected, keeping original URL");
            return None;
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/png")
            .split(';')
            .next()
            .unwrap_or("image/png")
            .to_string();

        if !content_type.starts_with("image/") {
            warn!(url, content_type, "Icon URL did not return an image, keeping original URL");
            return None;
        }

        let bytes = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                warn!(url, error = %e, "Icon body read failed, keeping original URL");
                return None;
            }
        };

        if bytes.len() > self.max_bytes {
            warn!(url, size = bytes.len(), limit = self.max_bytes, "Icon too large, keeping original URL");
            return None;
        }

        debug!(url, size = bytes.len(), "Icon inlined");
        Some(format!("data:{};base64,{}", content_type, BASE64.encode(&bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher(enabled: bool) -> IconFetcher {
        IconFetcher::new(&IconConfig {
            inline: enabled,
            timeout_secs: 1,
            max_bytes: 1024,
        })
    }

    #[tokio::test]
    async fn test_disabled_passes_through() {
        let url = "https://cdn.example.com/icons/tablet.png";
        assert_eq!(fetcher(false).inline_or_passthrough(url).await, url);
    }

    #[tokio::test]
    async fn test_empty_and_data_urls_untouched() {
        let f = fetcher(true);
        assert_eq!(f.inline_or_passthrough("").await, "");
        let data_url = "data:image/png;base64,AAAA";
        assert_eq!(f.inline_or_passthrough(data_url).await, data_url);
    }

    #[tokio::test]
    async fn test_unreachable_host_falls_back() {
        let f = fetcher(true);
        // Reserved TLD, guaranteed to fail to resolve.
        let url = "http://icons.invalid/tablet.png";
        assert_eq!(f.inline_or_passthrough(url).await, url);
    }
}
