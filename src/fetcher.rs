//! HTTP page fetcher.
//!
//! One [`Fetcher`] owns one `reqwest::Client` for the whole run. Requests
//! carry a browser-like header set, since many news sites reject obvious
//! bots, and every failure is classified into a [`FetchError`] kind instead
//! of being returned as page content.

use crate::errors::{FetchError, SetupError};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, redirect};
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};
use url::Url;

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// A downloaded page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub requested_url: Url,
    /// Address after HTTP-level redirects.
    pub final_url: Url,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

/// The header set sent with every request.
pub fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"),
    );
    headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(header::UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers
}

/// Build the shared client used by the fetcher and the HTTP navigator.
pub fn build_client(max_redirects: usize) -> Result<Client, SetupError> {
    let client = Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .default_headers(browser_headers())
        .redirect(redirect::Policy::limited(max_redirects))
        .build()?;
    Ok(client)
}

#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Fetch `url` with the fetcher's default timeout.
    pub async fn get(&self, url: &str) -> Result<RawResponse, FetchError> {
        self.fetch(url, self.timeout).await
    }

    /// GET `url`, failing with a classified error on transport problems,
    /// timeouts, or any non-2xx status.
    #[instrument(level = "info", skip(self), fields(%url))]
    pub async fn fetch(&self, url: &str, timeout: Duration) -> Result<RawResponse, FetchError> {
        let requested_url = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;
        let t0 = Instant::now();

        let response = self
            .client
            .get(requested_url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest_error(e, timeout))?;

        let status = response.status();
        let final_url = response.url().clone();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Non-success status");
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .map(str::to_string);

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest_error(e, timeout))?;

        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            %final_url,
            "Fetched page"
        );
        Ok(RawResponse {
            requested_url,
            final_url,
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}
