//! Storage API transport
//!
//! [`HttpClient::request`] is the single path every call takes. Each attempt
//! ends as done, transient, throttled or fatal; the loop around it owns
//! retries and the final error.

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use crate::auth::{AuthConfig, Authenticator};
use crate::error::{Error, Result};
use crate::types::BackoffType;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry-After fallback when a 429 carries none
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;
/// Longest Retry-After the client is willing to wait out
const DEFAULT_MAX_RETRY_AFTER: Duration = Duration::from_secs(120);

/// Transport settings shared by every call of one client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Stack root, e.g. `https://connection.keboola.com`
    pub base_url: Option<String>,
    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_type: BackoffType,
    /// A 429 asking for a longer wait fails with [`Error::RateLimited`]
    pub max_retry_after: Duration,
    /// `None` disables throttling entirely, 429 pauses included
    pub rate_limit: Option<RateLimiterConfig>,
    pub default_headers: BTreeMap<String, String>,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(60),
            backoff_type: BackoffType::Exponential,
            max_retry_after: DEFAULT_MAX_RETRY_AFTER,
            rate_limit: Some(RateLimiterConfig::default()),
            default_headers: BTreeMap::new(),
            user_agent: concat!("kbc-app-kit/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpClientConfig {
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn backoff(mut self, backoff_type: BackoffType, initial: Duration, max: Duration) -> Self {
        self.config.backoff_type = backoff_type;
        self.config.initial_backoff = initial;
        self.config.max_backoff = max;
        self
    }

    pub fn max_retry_after(mut self, max: Duration) -> Self {
        self.config.max_retry_after = max;
        self
    }

    pub fn rate_limit(mut self, config: Option<RateLimiterConfig>) -> Self {
        self.config.rate_limit = config;
        self
    }

    pub fn no_rate_limit(self) -> Self {
        self.rate_limit(None)
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// One part of a multipart upload
#[derive(Debug, Clone)]
pub struct MultipartField {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl MultipartField {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_name: None,
            content_type: None,
            data: Bytes::from(value.into()),
        }
    }

    pub fn file(
        name: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            file_name: Some(file_name.into()),
            content_type: Some(content_type.into()),
            data: data.into(),
        }
    }

    fn to_part(&self) -> Result<Part> {
        // Bytes clones share the buffer, so a retry does not copy the upload
        let part = Part::stream_with_length(self.data.clone(), self.data.len() as u64);
        let part = match &self.file_name {
            Some(file_name) => part.file_name(file_name.clone()),
            None => part,
        };
        match &self.content_type {
            Some(content_type) => Ok(part.mime_str(content_type)?),
            None => Ok(part),
        }
    }
}

/// Request body, kept as data so every retry can rebuild it
#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(Value),
    Form(Vec<(String, String)>),
    Multipart(Vec<MultipartField>),
}

impl RequestBody {
    fn attach(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        Ok(match self {
            Self::Json(body) => req.json(body),
            Self::Form(fields) => req.form(fields),
            Self::Multipart(fields) => {
                let mut form = Form::new();
                for field in fields {
                    form = form.part(field.name.clone(), field.to_part()?);
                }
                req.multipart(form)
            }
        })
    }
}

/// Per-call options layered over [`HttpClientConfig`]
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub query: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<RequestBody>,
    pub timeout: Option<Duration>,
    pub max_retries: Option<u32>,
    /// Presigned file URLs must not see the Storage token
    pub skip_auth: bool,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    /// Url-encoded form, the body Storage job endpoints expect
    #[must_use]
    pub fn form<K: Into<String>, V: Into<String>>(
        mut self,
        fields: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        let fields = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.body = Some(RequestBody::Form(fields));
        self
    }

    #[must_use]
    pub fn multipart(mut self, fields: Vec<MultipartField>) -> Self {
        self.body = Some(RequestBody::Multipart(fields));
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    #[must_use]
    pub fn without_auth(mut self) -> Self {
        self.skip_auth = true;
        self
    }
}

/// How one attempt ended
#[derive(Debug)]
enum Attempt {
    Done(Response),
    /// Transient failure; retry after the backoff
    Transient(Error),
    /// 429; the whole client pauses
    Throttled(Duration),
    Fatal(Error),
}

/// Authenticated, throttled Storage API client
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    authenticator: Authenticator,
    rate_limiter: Option<RateLimiter>,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        Self::with_auth(config, AuthConfig::None)
    }

    pub fn with_auth(config: HttpClientConfig, auth_config: AuthConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            client,
            rate_limiter: config.rate_limit.as_ref().map(RateLimiter::new),
            config,
            authenticator: Authenticator::new(auth_config),
        })
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    pub fn rate_limiter(&self) -> Option<&RateLimiter> {
        self.rate_limiter.as_ref()
    }

    pub async fn get(&self, url: &str) -> Result<Response> {
        self.request(Method::GET, url, RequestOptions::new()).await
    }

    pub async fn get_with(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::GET, url, options).await
    }

    pub async fn post_with(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::POST, url, options).await
    }

    /// Send with retries
    ///
    /// Timeouts, connection errors and 5xx back off per request. A 429 pauses
    /// the shared throttle for the Retry-After period. Other 4xx fail at once
    /// with the response body in [`Error::HttpStatus`].
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response> {
        let url = self.build_url(url);
        let max_retries = options.max_retries.unwrap_or(self.config.max_retries);
        let timeout = options.timeout.unwrap_or(self.config.timeout);

        for attempt in 0..=max_retries {
            if let Some(limiter) = &self.rate_limiter {
                limiter.wait().await;
            }

            let req = self.build_request(&method, &url, &options, timeout)?;
            let last = attempt == max_retries;
            match self.send_once(req, timeout).await {
                Attempt::Done(response) => {
                    debug!("{} {} -> {}", method, url, response.status().as_u16());
                    return Ok(response);
                }
                Attempt::Fatal(e) => return Err(e),
                Attempt::Transient(e) if last => return Err(e),
                Attempt::Throttled(retry_after)
                    if last || retry_after > self.config.max_retry_after =>
                {
                    return Err(Error::RateLimited {
                        retry_after_seconds: retry_after.as_secs(),
                    })
                }
                Attempt::Transient(e) => {
                    let delay = self.calculate_backoff(attempt);
                    warn!(
                        "{} {} failed ({}), attempt {}/{}, retrying in {:?}",
                        method,
                        url,
                        e,
                        attempt + 1,
                        max_retries + 1,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Attempt::Throttled(retry_after) => {
                    warn!(
                        "Rate limited on {}, attempt {}/{}, pausing {:?}",
                        url,
                        attempt + 1,
                        max_retries + 1,
                        retry_after
                    );
                    match &self.rate_limiter {
                        Some(limiter) => limiter.pause_for(retry_after),
                        None => tokio::time::sleep(retry_after).await,
                    }
                }
            }
        }

        Err(Error::MaxRetriesExceeded { max_retries })
    }

    async fn send_once(&self, req: RequestBuilder, timeout: Duration) -> Attempt {
        let response = match req.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Attempt::Transient(timeout_error(timeout)),
            Err(e) if e.is_connect() => return Attempt::Transient(Error::Http(e)),
            Err(e) => return Attempt::Fatal(Error::Http(e)),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Attempt::Throttled(retry_after(&response));
        }
        if status.is_success() || status.is_redirection() || status.is_informational() {
            return Attempt::Done(response);
        }

        let body = response.text().await.unwrap_or_default();
        let error = Error::http_status(status.as_u16(), body);
        if is_transient_status(status) {
            Attempt::Transient(error)
        } else {
            Attempt::Fatal(error)
        }
    }

    /// Send and decode a JSON body
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<T> {
        let response = self.request(method, url, options).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| Error::decode(format!("Unexpected response from {url}: {e}")))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.request_json(Method::GET, url, RequestOptions::new())
            .await
    }

    pub async fn get_bytes(&self, url: &str, options: RequestOptions) -> Result<Bytes> {
        let response = self.request(Method::GET, url, options).await?;
        Ok(response.bytes().await?)
    }

    fn build_request(
        &self,
        method: &Method,
        url: &str,
        options: &RequestOptions,
        timeout: Duration,
    ) -> Result<RequestBuilder> {
        let mut req = self.client.request(method.clone(), url).timeout(timeout);

        for (key, value) in self.config.default_headers.iter().chain(&options.headers) {
            req = req.header(key.as_str(), value.as_str());
        }
        if !options.query.is_empty() {
            req = req.query(&options.query);
        }
        if let Some(body) = &options.body {
            req = body.attach(req)?;
        }
        if !options.skip_auth {
            req = self.authenticator.apply(req);
        }
        Ok(req)
    }

    /// Absolute URLs (file downloads) pass through untouched
    fn build_url(&self, path: &str) -> String {
        match &self.config.base_url {
            Some(base) if !path.starts_with("http://") && !path.starts_with("https://") => {
                format!(
                    "{}/{}",
                    base.trim_end_matches('/'),
                    path.trim_start_matches('/')
                )
            }
            _ => path.to_string(),
        }
    }

    /// Delay before retry number `attempt + 1`, capped at `max_backoff`
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let initial = self.config.initial_backoff;
        let delay = match self.config.backoff_type {
            BackoffType::Constant => initial,
            BackoffType::Linear => initial.saturating_mul(attempt.saturating_add(1)),
            BackoffType::Exponential => initial.saturating_mul(2u32.saturating_pow(attempt)),
        };
        delay.min(self.config.max_backoff)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.config.base_url)
            .field("auth", self.authenticator.config())
            .field("rate_limiter", &self.rate_limiter)
            .finish_non_exhaustive()
    }
}

fn timeout_error(timeout: Duration) -> Error {
    Error::Timeout {
        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
    }
}

/// Gateway and origin errors worth another try
fn is_transient_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 500 | 502 | 503 | 504 | 520..=524)
}

/// Retry-After in seconds; HTTP dates are not used by the Storage API
fn retry_after(response: &Response) -> Duration {
    let secs = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
    Duration::from_secs(secs)
}
