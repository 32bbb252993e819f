//! HTTP client creation and request handling for source adapters.

use anyhow::Result;
use reqwest::{cookie::Jar, header};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::debug;

use super::types::REQUEST_TIMEOUT;
use crate::TARGET_WEB_REQUEST;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Create the shared HTTP client used by every adapter.
pub fn create_http_client() -> Result<reqwest::Client> {
    let cookie_store = Jar::default();
    reqwest::Client::builder()
        .cookie_store(true)
        .cookie_provider(Arc::new(cookie_store))
        .gzip(true)
        .redirect(reqwest::redirect::Policy::default())
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))
}

/// Issue a GET with feed-friendly headers and the adapter-boundary timeout.
/// A hung upstream fails this one source, never the whole batch.
pub async fn get(client: &reqwest::Client, url: &str) -> Result<reqwest::Response> {
    debug!(target: TARGET_WEB_REQUEST, "Requesting {}", url);

    let response = timeout(
        REQUEST_TIMEOUT,
        client
            .get(url)
            .header(header::USER_AGENT, USER_AGENT)
            .header(
                header::ACCEPT,
                "application/feed+json, application/json, application/rss+xml, application/atom+xml, application/xml, text/xml, text/html, */*;q=0.9",
            )
            .header(header::ACCEPT_ENCODING, "gzip, deflate, br")
            .send(),
    )
    .await
    .map_err(|_| anyhow::anyhow!("Request to {} timed out after {}s", url, REQUEST_TIMEOUT.as_secs()))?
    .map_err(|e| anyhow::anyhow!("Request to {} failed: {}", url, e))?;

    if !response.status().is_success() {
        return Err(anyhow::anyhow!(
            "Non-success status {} from {}",
            response.status(),
            url
        ));
    }

    Ok(response)
}
