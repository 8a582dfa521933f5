// src/ingest/fetch.rs
use std::time::Duration;

use metrics::counter;
use reqwest::{header::RETRY_AFTER, Client};
use thiserror::Error;

use crate::ingest::retry::{parse_retry_after, RetryPolicy, RetryReason, Sleeper, TokioSleeper};
use crate::ingest::types::{FeedQuery, RawResponse};

/// Header carrying the feed credential.
pub const AUTH_HEADER: &str = "Auth-Key";

const HTTP_TOO_MANY_REQUESTS: u16 = 429;
// Upstream error bodies can be whole HTML pages.
const ERROR_BODY_CAP: usize = 512;

/// One HTTP exchange as seen by the retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedReply {
    pub status: u16,
    pub retry_after: Option<String>,
    pub body: String,
}

impl FeedReply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            retry_after: None,
            body: body.into(),
        }
    }

    pub fn rate_limited(retry_after: Option<&str>) -> Self {
        Self {
            status: HTTP_TOO_MANY_REQUESTS,
            retry_after: retry_after.map(str::to_string),
            body: String::new(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("transport error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        // A connect timeout is both; treat it as a timeout.
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

/// Sends one feed request. Implementations must not retry on their own.
#[async_trait::async_trait]
pub trait FeedTransport: Send + Sync {
    async fn send(&self, query: &FeedQuery) -> Result<FeedReply, TransportError>;
}

/// reqwest-backed transport: POST with the `Auth-Key` header and JSON body.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("ioc-feed-etl/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl FeedTransport for HttpTransport {
    async fn send(&self, query: &FeedQuery) -> Result<FeedReply, TransportError> {
        let resp = self
            .client
            .post(&query.endpoint)
            .header(AUTH_HEADER, &query.auth_key)
            .json(&query.body())
            .send()
            .await?;

        let status = resp.status().as_u16();
        let retry_after = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.text().await?;

        Ok(FeedReply {
            status,
            retry_after,
            body,
        })
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("gave up after {attempts} attempts (last: {})", .last.as_str())]
    RetriesExhausted { attempts: u32, last: RetryReason },
    #[error("feed returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("feed reply is not JSON: {0}")]
    Decode(String),
    #[error("feed reply structure invalid: expected an object with `data`")]
    InvalidPayload,
    #[error(transparent)]
    Transport(TransportError),
}

impl FetchError {
    /// Short label for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::RetriesExhausted { .. } => "retries_exhausted",
            FetchError::Status { .. } => "status",
            FetchError::Decode(_) => "decode",
            FetchError::InvalidPayload => "invalid_payload",
            FetchError::Transport(_) => "transport",
        }
    }
}

/// Retry loop around a transport. One request per attempt.
pub struct Fetcher<T = HttpTransport, S = TokioSleeper> {
    transport: T,
    sleeper: S,
    policy: RetryPolicy,
}

impl<T: FeedTransport, S: Sleeper> Fetcher<T, S> {
    pub fn new(transport: T, sleeper: S, policy: RetryPolicy) -> Self {
        Self {
            transport,
            sleeper,
            policy,
        }
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn fetch(&self, query: &FeedQuery) -> Result<RawResponse, FetchError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            counter!("etl_fetch_attempts_total").increment(1);

            let reason = match self.transport.send(query).await {
                Ok(reply) if reply.status == HTTP_TOO_MANY_REQUESTS => RetryReason::RateLimited {
                    retry_after: parse_retry_after(reply.retry_after.as_deref()),
                },
                Ok(reply) if !(200..300).contains(&reply.status) => {
                    return Err(FetchError::Status {
                        status: reply.status,
                        body: truncate(&reply.body, ERROR_BODY_CAP),
                    });
                }
                Ok(reply) => return decode(&reply.body),
                Err(TransportError::Timeout(_)) => RetryReason::Timeout,
                Err(TransportError::Connect(_)) => RetryReason::Connect,
                Err(e @ TransportError::Other(_)) => return Err(FetchError::Transport(e)),
            };

            if !self.policy.has_attempts_after(attempt) {
                return Err(FetchError::RetriesExhausted {
                    attempts: attempt,
                    last: reason,
                });
            }

            let wait = self.policy.delay_for(reason);
            tracing::warn!(
                target: "ingest",
                attempt,
                max_attempts = self.policy.max_attempts,
                reason = reason.as_str(),
                wait_secs = wait.as_secs_f64(),
                "feed request failed, retrying"
            );
            counter!("etl_fetch_retries_total", "reason" => reason.as_str()).increment(1);
            self.sleeper.sleep(wait).await;
        }
    }
}

fn decode(body: &str) -> Result<RawResponse, FetchError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;
    RawResponse::from_value(value).ok_or(FetchError::InvalidPayload)
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push('…');
    out
}
