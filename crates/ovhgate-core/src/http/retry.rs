//! Retry logic with backoff for API requests
//!
//! Attempts within one logical request are strictly sequential. Delays
//! follow a fixed ascending schedule (saturating at its last entry), each
//! stretched by up to 25% random jitter.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use rand::Rng;
use tracing::{debug, warn};

use crate::http::error::OvhApiError;

/// Default delay schedule in seconds
pub const DEFAULT_BACKOFF_SECS: [u64; 3] = [1, 2, 4];

/// Default number of retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Maximum jitter, as a fraction of the base delay
pub const JITTER_RATIO: f64 = 0.25;

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt
    pub max_retries: u32,
    /// Base delay before retry N (index N-1); the last entry repeats
    pub delays: Vec<Duration>,
    /// Whether to add jitter to prevent thundering herd
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delays: DEFAULT_BACKOFF_SECS.iter().map(|s| Duration::from_secs(*s)).collect(),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the default schedule
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Replace the delay schedule
    pub fn with_delays(mut self, delays: Vec<Duration>) -> Self {
        self.delays = delays;
        self
    }

    /// Enable or disable jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Total attempts allowed for one request
    pub fn max_attempts(&self, skip_retry: bool) -> u32 {
        if skip_retry {
            1
        } else {
            self.max_retries.saturating_add(1)
        }
    }

    /// Create a backoff instance following this policy's schedule
    pub fn create_backoff(&self) -> ScheduleBackoff {
        ScheduleBackoff {
            delays: self.delays.clone(),
            jitter: self.jitter,
            index: 0,
        }
    }
}

/// Fixed-schedule backoff with additive jitter
#[derive(Debug, Clone)]
pub struct ScheduleBackoff {
    delays: Vec<Duration>,
    jitter: bool,
    index: usize,
}

impl Backoff for ScheduleBackoff {
    fn reset(&mut self) {
        self.index = 0;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        let base = self
            .delays
            .get(self.index)
            .or_else(|| self.delays.last())
            .copied()?;
        self.index += 1;

        if self.jitter {
            Some(apply_jitter(base, &mut rand::thread_rng()))
        } else {
            Some(base)
        }
    }
}

/// Stretch `base` by a random amount in `[0, JITTER_RATIO * base]`
pub fn apply_jitter<R: Rng + ?Sized>(base: Duration, rng: &mut R) -> Duration {
    let factor: f64 = rng.gen_range(0.0..=JITTER_RATIO);
    base + base.mul_f64(factor)
}

/// Whether attempt `attempt` (1-based) of `max_attempts` may be followed by another
pub fn should_retry(error: &OvhApiError, attempt: u32, max_attempts: u32) -> bool {
    attempt < max_attempts && error.is_retryable()
}

/// Decision on whether to retry a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the request after the specified delay
    Retry { delay: Duration },
    /// Do not retry the request
    NoRetry,
}

/// Per-request retry state
#[derive(Debug)]
pub struct RetryHandler {
    max_attempts: u32,
    attempts: u32,
    backoff: ScheduleBackoff,
}

impl RetryHandler {
    pub fn new(policy: &RetryPolicy, skip_retry: bool) -> Self {
        Self {
            max_attempts: policy.max_attempts(skip_retry),
            attempts: 0,
            backoff: policy.create_backoff(),
        }
    }

    /// Record the start of an attempt and return its 1-based number
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// Decide what to do after the current attempt failed with `error`
    pub fn decide(&mut self, error: &OvhApiError) -> RetryDecision {
        if !should_retry(error, self.attempts, self.max_attempts) {
            return RetryDecision::NoRetry;
        }

        let delay = self.backoff.next_backoff().unwrap_or(Duration::ZERO);
        RetryDecision::Retry { delay }
    }

    /// Attempts made so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Execute a request with retry logic
///
/// `request_fn` receives the 1-based attempt number. The error returned is
/// exactly the one produced by the last attempt.
pub async fn execute_with_retry<F, Fut, T>(
    mut request_fn: F,
    policy: &RetryPolicy,
    skip_retry: bool,
) -> Result<T, OvhApiError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, OvhApiError>>,
{
    let mut handler = RetryHandler::new(policy, skip_retry);

    loop {
        let attempt = handler.begin_attempt();
        match request_fn(attempt).await {
            Ok(response) => return Ok(response),
            Err(error) => match handler.decide(&error) {
                RetryDecision::Retry { delay } => {
                    warn!(
                        attempt,
                        max_attempts = handler.max_attempts(),
                        delay_ms = delay.as_millis() as u64,
                        code = error.code(),
                        "Request failed, retrying: {}",
                        error
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::NoRetry => {
                    debug!(
                        attempts = handler.attempts(),
                        code = error.code(),
                        retryable = error.is_retryable(),
                        "Request failed, not retrying: {}",
                        error
                    );
                    return Err(error);
                }
            },
        }
    }
}
