//! Status polling for provider jobs.

use crate::error::{RetouchError, Result};
use crate::job::JobHandle;
use crate::prediction::PredictionApi;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Default delay between status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default number of status checks before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

/// How the delay between attempts evolves.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Backoff {
    /// Same delay every time.
    #[default]
    Fixed,
    /// Delay multiplied by `factor` after each attempt, capped at `max`.
    Exponential {
        /// Growth factor per attempt.
        factor: f64,
        /// Upper bound on a single delay.
        max: Duration,
    },
}

/// Retry policy for one job's polling loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    /// Base delay between status checks.
    pub interval: Duration,
    /// Maximum number of status checks.
    pub max_attempts: u32,
    /// Delay curve.
    pub backoff: Backoff,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Backoff::Fixed,
        }
    }
}

impl PollPolicy {
    /// Sets the base interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the attempt budget. Zero is raised to one.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Sets the backoff curve.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Delay to wait after the given (1-based) attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.interval,
            Backoff::Exponential { factor, max } => {
                let exponent = attempt.saturating_sub(1).min(64) as i32;
                let secs = self.interval.as_secs_f64() * factor.max(1.0).powi(exponent);
                Duration::try_from_secs_f64(secs).map_or(max, |delay| delay.min(max))
            }
        }
    }
}

/// Suspends the current task. Tests substitute an implementation that returns at once.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Waits for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Repeatedly queries a job until it reaches a terminal state or the budget runs out.
#[derive(Clone)]
pub struct JobPoller {
    api: Arc<dyn PredictionApi>,
    policy: PollPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl JobPoller {
    /// Creates a poller over the given prediction API with the default policy.
    pub fn new(api: Arc<dyn PredictionApi>) -> Self {
        Self {
            api,
            policy: PollPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replaces the polling policy.
    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replaces the sleeper.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Returns the active policy.
    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Polls `job_id` until it succeeds (returning the output reference) or fails.
    pub async fn await_result(&self, job_id: &str, credential: &str) -> Result<String> {
        self.poll(job_id, None, credential).await
    }

    /// Like [`await_result`](Self::await_result) but starts from a submitted handle.
    ///
    /// A handle that is already terminal resolves without any status query.
    pub async fn await_handle(&self, handle: JobHandle, credential: &str) -> Result<String> {
        if handle.is_terminal() {
            return handle.into_outcome();
        }
        let id = handle.id().to_string();
        self.poll(&id, Some(handle), credential).await
    }

    async fn poll(
        &self,
        job_id: &str,
        mut handle: Option<JobHandle>,
        credential: &str,
    ) -> Result<String> {
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let prediction = self.api.get_prediction(job_id, credential).await?;

            let current = match handle.take() {
                Some(mut h) => {
                    h.advance(prediction)?;
                    h
                }
                None => JobHandle::from_prediction(prediction)?,
            };

            if current.is_terminal() {
                tracing::debug!(
                    job_id = %job_id,
                    status = %current.status(),
                    attempt,
                    "job reached terminal state"
                );
                return current.into_outcome();
            }

            tracing::debug!(
                job_id = %job_id,
                status = %current.status(),
                attempt,
                max_attempts,
                "job still running"
            );

            handle = Some(current);

            if attempt < max_attempts {
                self.sleeper.sleep(self.policy.delay_after(attempt)).await;
            }
        }

        Err(RetouchError::PollTimeout {
            attempts: max_attempts,
        })
    }
}
