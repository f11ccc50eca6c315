//! Shared HTTP client with bounded retries
//!
//! Every remote call in the planner is an idempotent GET or HEAD, so all of
//! them go through the same retry loop.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::TransportError;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

const MAX_REDIRECTS: usize = 10;

/// Retry settings for transient failures
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_millis(600),
        }
    }
}

impl RetryPolicy {
    /// Sleep before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    pub fn is_retryable_status(status: u16) -> bool {
        matches!(status, 429 | 500 | 502 | 503 | 504)
    }
}

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    retry: RetryPolicy,
}

impl HttpClient {
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;

        Ok(Self { client, retry })
    }

    /// GET and decode a JSON body; non-2xx is an error
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, TransportError> {
        let response = self
            .send_with_retry(|| self.client.get(url).query(query))
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }

    /// URL reached after following redirects with HEAD
    pub async fn head_final_url(&self, url: &str) -> Result<String, TransportError> {
        let response = self.send_with_retry(|| self.client.head(url)).await?;
        Ok(response.url().to_string())
    }

    /// Final URL and body after following redirects with GET
    pub async fn get_page(&self, url: &str) -> Result<(String, String), TransportError> {
        let response = self.send_with_retry(|| self.client.get(url)).await?;
        let final_url = response.url().to_string();
        let body = response.text().await?;
        Ok((final_url, body))
    }

    async fn send_with_retry<F>(&self, build: F) -> Result<Response, TransportError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            match build().send().await {
                Ok(response)
                    if RetryPolicy::is_retryable_status(response.status().as_u16())
                        && attempt < self.retry.max_retries =>
                {
                    attempt += 1;
                    debug!(
                        "HTTP {} from {}, retry {}/{}",
                        response.status(),
                        response.url(),
                        attempt,
                        self.retry.max_retries
                    );
                }
                Ok(response) => return Ok(response),
                Err(e)
                    if (e.is_connect() || e.is_timeout())
                        && attempt < self.retry.max_retries =>
                {
                    attempt += 1;
                    warn!("Request failed ({}), retry {}/{}", e, attempt, self.retry.max_retries);
                }
                Err(e) => return Err(e.into()),
            }
            tokio::time::sleep(self.retry.backoff(attempt)).await;
        }
    }
}
