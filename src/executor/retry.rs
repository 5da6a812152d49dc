use std::future::Future;
use std::time::Duration;

/// Bounded retry: up to `max_attempts` tries with `delay` between them.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Runs `attempt` until it returns `true` or the attempts run out.
    /// `label` only names the operation in logs.
    pub async fn run<F, Fut>(&self, label: &str, mut attempt: F) -> bool
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = bool>,
    {
        for n in 1..=self.max_attempts {
            if attempt(n).await {
                return true;
            }
            tracing::debug!(operation = label, attempt = n, max = self.max_attempts, "attempt failed");
            if n < self.max_attempts {
                tokio::time::sleep(self.delay).await;
            }
        }
        tracing::warn!(operation = label, attempts = self.max_attempts, "all attempts failed");
        false
    }
}
