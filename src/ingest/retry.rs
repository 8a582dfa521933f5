// src/ingest/retry.rs
use std::sync::Mutex;
use std::time::Duration;

/// Why an attempt is worth repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    /// HTTP 429, with the server's advisory `Retry-After` in seconds if it sent one.
    RateLimited { retry_after: Option<u64> },
    Timeout,
    Connect,
}

impl RetryReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryReason::RateLimited { .. } => "rate_limited",
            RetryReason::Timeout => "timeout",
            RetryReason::Connect => "connect",
        }
    }
}

/// Bounded retry: how many attempts, and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub default_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            default_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, default_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            default_delay,
        }
    }

    /// Wait before the next attempt. A rate limit waits exactly what the server
    /// asked for; everything else waits the fixed default.
    pub fn delay_for(&self, reason: RetryReason) -> Duration {
        match reason {
            RetryReason::RateLimited {
                retry_after: Some(secs),
            } => Duration::from_secs(secs),
            _ => self.default_delay,
        }
    }

    /// `attempt` is 1-based. False once the budget is spent.
    pub fn has_attempts_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Parse a `Retry-After` header holding delta-seconds. HTTP-date values and
/// garbage yield `None`, which falls back to the default delay rather than
/// aborting the fetch.
pub fn parse_retry_after(raw: Option<&str>) -> Option<u64> {
    raw.map(str::trim).and_then(|s| s.parse::<u64>().ok())
}

/// Injected delay so the retry loop can run without the wall clock.
#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, d: Duration);
}

/// Real sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, d: Duration) {
        tokio::time::sleep(d).await;
    }
}

// --- Test helper ---
/// Records requested delays and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    pub calls: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<Duration> {
        self.calls.lock().expect("sleeper mutex poisoned").clone()
    }
}

#[async_trait::async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, d: Duration) {
        self.calls.lock().expect("sleeper mutex poisoned").push(d);
    }
}
