use std::future::Future;
use std::time::Duration;

use corvus_core::{CorvusError, Result};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Run `op` up to `max_attempts` times, sleeping between attempts when the
/// platform rate-limits us or the transport fails.
///
/// A [`CorvusError::RateLimited`] carrying an advertised `retry-after` waits
/// exactly that long; otherwise the wait starts at 1s and doubles per
/// attempt, capped at 60s. Non-retryable errors (auth, not-found, …)
/// propagate immediately. Exhausting the attempt budget surfaces
/// [`CorvusError::PlatformUnavailable`].
///
/// # Examples
///
/// ```
/// use corvus_platform::retry::retry_with_backoff;
///
/// # async fn demo() -> corvus_core::Result<()> {
/// let value = retry_with_backoff(3, || async { Ok(7) }).await?;
/// assert_eq!(value, 7);
/// # Ok(())
/// # }
/// ```
pub async fn retry_with_backoff<T, F, Fut>(max_attempts: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut backoff = INITIAL_BACKOFF;
    let mut last_error = String::new();

    for attempt in 1..=max_attempts.max(1) {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let wait = match &err {
                    CorvusError::RateLimited {
                        retry_after: Some(advertised),
                    } => *advertised,
                    _ => backoff,
                };
                eprintln!(
                    "warning: {err}; retrying in {}s (attempt {attempt}/{max_attempts})",
                    wait.as_secs()
                );
                tokio::time::sleep(wait).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
            Err(err) if err.is_retryable() => {
                last_error = err.to_string();
                break;
            }
            Err(err) => return Err(err),
        }
    }

    Err(CorvusError::PlatformUnavailable(format!(
        "gave up after {max_attempts} attempts: {last_error}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn succeeds_first_try_without_sleeping() {
        let start = Instant::now();
        let value = retry_with_backoff(5, || async { Ok::<_, CorvusError>(42) })
            .await
            .unwrap();
        assert_eq!(value, 42);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_at_least_advertised_retry_after() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let start = Instant::now();

        let value = retry_with_backoff(5, move || {
            let calls = calls2.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(CorvusError::RateLimited {
                        retry_after: Some(Duration::from_secs(2)),
                    })
                } else {
                    Ok(1)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 1);
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausting_attempts_surfaces_platform_unavailable() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();

        let result: Result<()> = retry_with_backoff(3, move || {
            let calls = calls2.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CorvusError::RateLimited { retry_after: None })
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(CorvusError::PlatformUnavailable(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_doubles_up_to_cap() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let start = Instant::now();

        let _: Result<()> = retry_with_backoff(4, move || {
            let calls = calls2.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CorvusError::Network("connection reset".into()))
            }
        })
        .await;

        // 1s + 2s + 4s between the four attempts.
        assert_eq!(start.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();

        let result: Result<()> = retry_with_backoff(5, move || {
            let calls = calls2.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CorvusError::Auth("bad token".into()))
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(CorvusError::Auth(_))));
    }
}
