use std::{fmt, future::Future, time::Duration};

use anyhow::Result;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Upper bound for the exponential backoff delay
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Retry configuration for a single network call
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Extra attempts after the first one; 0 means a single attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Double the delay after every failed attempt
    pub exponential_backoff: bool,
    /// Deadline for each individual attempt
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_millis(500),
            exponential_backoff: true,
            attempt_timeout: Some(Duration::from_secs(15)),
        }
    }
}

/// An attempt did not finish before its deadline
#[derive(Debug, Clone)]
pub struct CallTimedOut {
    pub operation: String,
    pub after: Duration,
}

impl fmt::Display for CallTimedOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} timed out after {:?}", self.operation, self.after)
    }
}

impl std::error::Error for CallTimedOut {}

/// Run `operation` under the policy's deadline, retrying failures.
///
/// Returns the last error once all attempts are used up. A timed-out attempt
/// counts as a failure like any other.
pub async fn retry_async<F, Fut, T>(operation_name: &str, policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.max_retries.saturating_add(1);
    let mut delay = policy.base_delay;
    let mut attempt = 0;

    loop {
        attempt += 1;
        let outcome = match policy.attempt_timeout {
            Some(deadline) => match timeout(deadline, operation()).await {
                Ok(result) => result,
                Err(_) => Err(CallTimedOut {
                    operation: operation_name.to_string(),
                    after: deadline,
                }
                .into()),
            },
            None => operation().await,
        };

        match outcome {
            Ok(value) => {
                if attempt > 1 {
                    debug!("✅ {operation_name} succeeded after {attempt} attempts");
                }
                return Ok(value);
            }
            Err(e) if attempt >= attempts => return Err(e),
            Err(e) => {
                warn!("❌ {operation_name} attempt {attempt}/{attempts} failed: {e}, retrying in {delay:?}");
                sleep(delay).await;
                if policy.exponential_backoff {
                    delay = std::cmp::min(delay * 2, MAX_BACKOFF);
                }
            }
        }
    }
}
