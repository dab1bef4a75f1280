//! Retrying HTTP client with page-token pagination.
//!
//! One client abstraction serves both remote catalogs (the provider billing
//! API and the target system), parameterized by base URL, bearer token and
//! retry policy. Transport failures and 5xx responses are retried with
//! exponential backoff (`2^attempt` seconds); 4xx responses surface
//! immediately without retry. All calls are sequential and blocking on the
//! current task - there is exactly one writer per run.

use crate::error::ApiError;
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

const BACKOFF_BASE_SECS: u64 = 2;

/// Bounded retry/backoff settings plus the courtesy delay between page
/// fetches (rate limiting, not correctness).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub page_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            page_delay: Duration::from_millis(100),
        }
    }
}

/// HTTP executor bound to one remote API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    auth_header: Option<String>,
    http: reqwest::Client,
    retry: RetryPolicy,
}

pub struct ApiClientBuilder {
    base_url: String,
    bearer_token: Option<String>,
    timeout: Duration,
    retry: RetryPolicy,
    accept_invalid_certs: bool,
}

impl ApiClient {
    pub fn builder(base_url: impl Into<String>) -> ApiClientBuilder {
        ApiClientBuilder {
            base_url: base_url.into(),
            bearer_token: None,
            timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            accept_invalid_certs: false,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Execute one request with bounded retry. Returns the parsed JSON body,
    /// `Value::Null` for empty responses.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );

        let mut last_error: Option<ApiError> = None;

        for attempt in 0..self.retry.max_attempts {
            if attempt > 0 {
                let exponent = (attempt - 1).min(self.retry.max_attempts);
                let wait = Duration::from_secs(BACKOFF_BASE_SECS.pow(exponent));
                warn!(
                    url = %url,
                    attempt = attempt + 1,
                    max_attempts = self.retry.max_attempts,
                    wait_secs = wait.as_secs(),
                    last_error = %last_error.as_ref().map(ToString::to_string).unwrap_or_default(),
                    "Retrying request after failure"
                );
                tokio::time::sleep(wait).await;
            }

            let mut request = self.http.request(method.clone(), &url);
            if let Some(auth) = &self.auth_header {
                request = request.header(AUTHORIZATION, auth);
            }
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    debug!(method = %method, url = %url, status = status.as_u16(), "Request completed");

                    if status == StatusCode::UNAUTHORIZED {
                        return Err(ApiError::Auth(format!("{} {}", method, path)));
                    }
                    if status == StatusCode::NOT_FOUND {
                        return Err(ApiError::NotFound(path.to_string()));
                    }
                    if status.is_server_error() {
                        let message = truncate(response.text().await.unwrap_or_default(), 200);
                        last_error = Some(ApiError::Server {
                            status: status.as_u16(),
                            message,
                        });
                        continue;
                    }
                    if status.is_client_error() {
                        let message = truncate(response.text().await.unwrap_or_default(), 200);
                        return Err(ApiError::Client {
                            status: status.as_u16(),
                            message,
                        });
                    }

                    let text = response.text().await?;
                    if text.is_empty() {
                        return Ok(Value::Null);
                    }
                    return serde_json::from_str(&text).map_err(|e| ApiError::Server {
                        status: status.as_u16(),
                        message: format!("unparseable response body: {e}"),
                    });
                }
                Err(e) => {
                    last_error = Some(ApiError::Transport(e));
                }
            }
        }

        Err(ApiError::ExhaustedRetries {
            attempts: self.retry.max_attempts,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempts made".to_string()),
        })
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ApiError> {
        self.request(Method::GET, path, query, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.request(Method::POST, path, &[], Some(body)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.request(Method::PUT, path, &[], Some(body)).await
    }

    /// Lazy page sequence over a list endpoint. Each call starts from the
    /// first page; pages are fetched on demand by [`Paginator::next_page`].
    pub fn paginate(&self, path: &str, page_size: usize) -> Paginator<'_> {
        Paginator {
            client: self,
            path: path.to_string(),
            page_size,
            extra_params: Vec::new(),
            next_token: None,
            started: false,
            done: false,
        }
    }
}

impl ApiClientBuilder {
    /// Bearer token for the `Authorization` header. Empty tokens are
    /// treated as absent (unauthenticated catalog access is valid for some
    /// endpoints).
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.bearer_token = (!token.trim().is_empty()).then_some(token);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Accept self-signed certificates. Needed for appliance-style target
    /// systems deployed with their own CA.
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn build(self) -> Result<ApiClient, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .build()?;

        Ok(ApiClient {
            base_url: self.base_url.trim_end_matches('/').to_string(),
            auth_header: self.bearer_token.map(|t| format!("Bearer {t}")),
            http,
            retry: self.retry,
        })
    }
}

/// Finite, lazily fetched sequence of pages following `nextPageToken`.
pub struct Paginator<'a> {
    client: &'a ApiClient,
    path: String,
    page_size: usize,
    extra_params: Vec<(String, String)>,
    next_token: Option<String>,
    started: bool,
    done: bool,
}

impl Paginator<'_> {
    /// Fixed query parameter sent with every page fetch.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.push((key.into(), value.into()));
        self
    }

    /// Fetch the next page, or `None` once the token chain ends. Sleeps the
    /// configured inter-page delay before every fetch after the first.
    pub async fn next_page(&mut self) -> Result<Option<Value>, ApiError> {
        if self.done {
            return Ok(None);
        }
        if self.started {
            tokio::time::sleep(self.client.retry.page_delay).await;
        }

        let mut query: Vec<(&str, String)> = vec![("pageSize", self.page_size.to_string())];
        for (key, value) in &self.extra_params {
            query.push((key.as_str(), value.clone()));
        }
        if let Some(token) = &self.next_token {
            query.push(("pageToken", token.clone()));
        }

        let page = self.client.get(&self.path, &query).await?;
        self.started = true;

        match page
            .get("nextPageToken")
            .and_then(|v| v.as_str())
            .filter(|t| !t.is_empty())
        {
            Some(token) => self.next_token = Some(token.to_string()),
            None => self.done = true,
        }

        Ok(Some(page))
    }

    /// Drain every page, collecting the array items stored under `key`.
    pub async fn collect_items(&mut self, key: &str) -> Result<Vec<Value>, ApiError> {
        let mut items = Vec::new();
        while let Some(page) = self.next_page().await? {
            if let Some(batch) = page.get(key).and_then(|v| v.as_array()) {
                items.extend(batch.iter().cloned());
            }
            debug!(path = %self.path, total = items.len(), "Collected page");
        }
        Ok(items)
    }
}

fn truncate(s: String, max_len: usize) -> String {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = s[..end].to_string();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_ignores_empty_token() {
        let client = ApiClient::builder("https://example.test/")
            .bearer_token("   ")
            .build()
            .unwrap();
        assert!(client.auth_header.is_none());
        assert_eq!(client.base_url(), "https://example.test");
    }

    #[test]
    fn builder_keeps_real_token() {
        let client = ApiClient::builder("https://example.test")
            .bearer_token("secret")
            .build()
            .unwrap();
        assert_eq!(client.auth_header.as_deref(), Some("Bearer secret"));
    }
}
