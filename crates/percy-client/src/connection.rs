//! HTTP transport for the Percy API.
//!
//! [`Transport`] is the seam the API client talks through; [`HttpConnection`]
//! is the blocking `reqwest` implementation. It adds auth and content-type
//! headers, decodes JSON bodies, and retries transient failures with
//! exponential backoff:
//!
//! - GET is retried on [`RETRY_STATUSES`] and on any connection error;
//! - POST is retried only when the connection could not be established, so
//!   a request the server may have seen is never sent twice.

use std::thread;
use std::time::Duration;

use percy_env::CiProvider;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::error::{PercyError, Result};
use crate::user_agent::user_agent;

/// JSON:API media type sent with every request.
pub const JSON_API_CONTENT_TYPE: &str = "application/vnd.api+json";

/// Statuses treated as transient for idempotent requests.
pub const RETRY_STATUSES: &[u16] = &[500, 502, 503, 504, 520, 524];

/// Minimal HTTP surface the API client needs.
pub trait Transport: Send + Sync {
    /// GET `url` and decode the JSON response.
    fn get(&self, url: &str) -> Result<Value>;

    /// POST `body` as JSON to `url` and decode the JSON response.
    fn post(&self, url: &str, body: &Value) -> Result<Value>;
}

/// Retry/backoff settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (1 = no retries).
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts (milliseconds).
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(
            self.backoff_base_ms
                .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1))),
        )
    }
}

/// Blocking HTTP transport with auth headers and retry.
#[derive(Debug, Clone)]
pub struct HttpConnection {
    config: Config,
    client: Client,
    retry: RetryPolicy,
}

impl HttpConnection {
    /// Create a connection; the token is read from `config` per request.
    pub fn new(config: Config, ci: Option<CiProvider>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent(&config, ci))
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            config,
            client,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn request(&self, method: &Method, url: &str, body: Option<&[u8]>) -> Result<RequestBuilder> {
        let token = self.config.access_token()?;
        let mut request = self
            .client
            .request(method.clone(), url)
            .header(AUTHORIZATION, format!("Token token={token}"))
            .header(CONTENT_TYPE, JSON_API_CONTENT_TYPE);
        if let Some(body) = body {
            request = request.body(body.to_vec());
        }
        Ok(request)
    }

    fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Value> {
        let body = body.map(serde_json::to_vec).transpose()?;
        let max_attempts = self.retry.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let last_attempt = attempt == max_attempts;
            match self.request(&method, url, body.as_deref())?.send() {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let text = response.text()?;
                        return decode_body(&text);
                    }
                    if !last_attempt && retries_status(&method, status) {
                        warn!(
                            method = %method,
                            url = %url,
                            status = status.as_u16(),
                            attempt,
                            "retrying after transient status"
                        );
                        thread::sleep(self.retry.backoff(attempt));
                        continue;
                    }
                    let body = response.text().unwrap_or_default();
                    error!(
                        method = %method,
                        url = %url,
                        status = status.as_u16(),
                        body = %body,
                        "percy api request failed"
                    );
                    return Err(PercyError::Api {
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(err) if !last_attempt && retries_error(&method, &err) => {
                    warn!(method = %method, url = %url, attempt, error = %err, "retrying after connection error");
                    thread::sleep(self.retry.backoff(attempt));
                }
                Err(err) => {
                    debug!(method = %method, url = %url, attempt, error = %err, "request failed");
                    return Err(err.into());
                }
            }
        }
        // The final attempt always returns above.
        Err(PercyError::InvalidArgument(
            "retry policy allowed no attempts".to_string(),
        ))
    }
}

impl Transport for HttpConnection {
    fn get(&self, url: &str) -> Result<Value> {
        self.send(Method::GET, url, None)
    }

    fn post(&self, url: &str, body: &Value) -> Result<Value> {
        self.send(Method::POST, url, Some(body))
    }
}

fn retries_status(method: &Method, status: StatusCode) -> bool {
    *method == Method::GET && RETRY_STATUSES.contains(&status.as_u16())
}

fn retries_error(method: &Method, err: &reqwest::Error) -> bool {
    if err.is_connect() {
        return true;
    }
    *method == Method::GET && err.is_timeout()
}

fn decode_body(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(text)?)
}
