//! Fixed-interval polling and retry helpers.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{ProviderError, Result};

/// Polls a condition at a fixed interval until it holds or `timeout`
/// elapses.
#[derive(Debug, Clone, Copy)]
pub struct Poller {
    interval: Duration,
    timeout: Duration,
}

impl Poller {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    pub async fn until<F, Fut>(&self, what: &str, mut check: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        let started = tokio::time::Instant::now();
        loop {
            if check().await? {
                return Ok(());
            }
            if started.elapsed() >= self.timeout {
                return Err(ProviderError::Timeout(format!(
                    "{} after {}s",
                    what,
                    self.timeout.as_secs()
                )));
            }
            debug!(what, "condition not met yet");
            tokio::time::sleep(self.interval).await;
        }
    }
}

/// Checks a condition at most `attempts` times, `interval` apart.
pub async fn poll_attempts<F, Fut>(
    attempts: u32,
    interval: Duration,
    what: &str,
    mut check: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    for attempt in 1..=attempts.max(1) {
        if check().await? {
            return Ok(());
        }
        debug!(what, attempt, "condition not met yet");
        if attempt < attempts {
            tokio::time::sleep(interval).await;
        }
    }
    Err(ProviderError::Timeout(format!(
        "{} after {} attempts",
        what, attempts
    )))
}

/// Runs `op` up to `attempts` times, sleeping `delay` between failures.
pub async fn retry<T, F, Fut>(attempts: u32, delay: Duration, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                warn!(what, attempt, error = %e, "attempt failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_until_succeeds_after_a_few_checks() {
        let calls = Arc::new(AtomicU32::new(0));
        let poller = Poller::new(Duration::from_millis(1), Duration::from_secs(5));

        let counter = calls.clone();
        poller
            .until("host maintenance", || {
                let counter = counter.clone();
                async move { Ok(counter.fetch_add(1, Ordering::SeqCst) >= 2) }
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_until_times_out() {
        let poller = Poller::new(Duration::from_millis(1), Duration::from_millis(5));
        let err = poller
            .until("template ready", || async { Ok(false) })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
        assert!(err.to_string().contains("template ready"));
    }

    #[tokio::test]
    async fn test_until_propagates_errors() {
        let poller = Poller::new(Duration::from_millis(1), Duration::from_secs(1));
        let err = poller
            .until("x", || async { Err(ProviderError::Config("boom".to_string())) })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Config(_)));
    }

    #[tokio::test]
    async fn test_poll_attempts_is_bounded() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let err = poll_attempts(30, Duration::from_millis(1), "group disabled", || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(false)
            }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 30);
        assert!(err.to_string().contains("after 30 attempts"));
    }

    #[tokio::test]
    async fn test_retry_eventually_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let value = retry(3, Duration::from_millis(1), "add host", || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ProviderError::Config("not yet".to_string()))
                } else {
                    Ok(42)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let err = retry(2, Duration::from_millis(1), "add host", || async {
            Err::<(), _>(ProviderError::Config("down".to_string()))
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("down"));
    }
}
