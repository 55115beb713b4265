//! Poll-until-ready waiter
//!
//! Repeatedly fetches a remote object at a fixed interval until a condition
//! holds, the timeout elapses, or the cancellation token fires.

use crate::error::{ProviderError, ProviderResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Outcome of a single poll
#[derive(Debug, Clone, PartialEq)]
pub enum WaitState<T> {
    Pending,
    Ready(T),
}

/// Polling parameters
#[derive(Debug, Clone, PartialEq)]
pub struct WaitConfig {
    /// Fixed delay between fetches
    pub interval: Duration,
    /// Overall deadline, measured from the first fetch
    pub timeout: Duration,
    /// Fetch errors treated as pending before the next one is surfaced
    pub tolerated_errors: u32,
}

impl WaitConfig {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            tolerated_errors: 0,
        }
    }

    pub fn with_tolerated_errors(mut self, tolerated_errors: u32) -> Self {
        self.tolerated_errors = tolerated_errors;
        self
    }
}

/// Poll `probe` until it reports ready.
///
/// `what` and `id` only feed error messages and logs.
pub async fn poll_until<T, F, Fut>(
    what: &str,
    id: &str,
    config: &WaitConfig,
    cancel: &CancellationToken,
    mut probe: F,
) -> ProviderResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<WaitState<T>>>,
{
    let cancelled = || ProviderError::Cancelled {
        what: what.to_string(),
        id: id.to_string(),
    };

    let deadline = Instant::now() + config.timeout;
    let mut tolerated = config.tolerated_errors;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let state = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            state = probe() => state,
        };

        match state {
            Ok(WaitState::Ready(value)) => {
                tracing::debug!("{} '{}' ready after {} poll(s)", what, id, attempt);
                return Ok(value);
            }
            Ok(WaitState::Pending) => {
                tracing::debug!("{} '{}' pending (poll {})", what, id, attempt);
            }
            Err(e) if tolerated > 0 => {
                tolerated -= 1;
                tracing::warn!(
                    "{} '{}': fetch failed, treating as pending ({} more tolerated): {}",
                    what,
                    id,
                    tolerated,
                    e
                );
            }
            Err(e) => return Err(e),
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(ProviderError::Timeout {
                what: what.to_string(),
                id: id.to_string(),
                timeout: config.timeout,
            });
        }

        let nap = config.interval.min(deadline - now);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            _ = tokio::time::sleep(nap) => {}
        }
    }
}

/// Wait until the status extracted from the fetched object equals `target`.
///
/// A fetch returning no object counts as pending. Returns the ready object.
pub async fn wait_for_status<T, F, Fut, S>(
    what: &str,
    id: &str,
    target: &str,
    config: &WaitConfig,
    cancel: &CancellationToken,
    mut fetch: F,
    status_of: S,
) -> ProviderResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<Option<T>>>,
    S: Fn(&T) -> Option<String>,
{
    let status_of = &status_of;
    poll_until(what, id, config, cancel, || {
        let fetched = fetch();
        async move {
            match fetched.await? {
                Some(obj) if status_of(&obj).as_deref() == Some(target) => Ok(WaitState::Ready(obj)),
                Some(obj) => {
                    tracing::debug!(
                        "{} '{}' status {:?}, want {}",
                        what,
                        id,
                        status_of(&obj),
                        target
                    );
                    Ok(WaitState::Pending)
                }
                None => Ok(WaitState::Pending),
            }
        }
    })
    .await
}

/// Wait until a freshly created object becomes readable.
///
/// 404 and empty responses are pending; any other error is fatal.
pub async fn wait_until_present<T, F, Fut>(
    what: &str,
    id: &str,
    config: &WaitConfig,
    cancel: &CancellationToken,
    mut fetch: F,
) -> ProviderResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<Option<T>>>,
{
    poll_until(what, id, config, cancel, || {
        let fetched = fetch();
        async move {
            match fetched.await {
                Ok(Some(obj)) => Ok(WaitState::Ready(obj)),
                Ok(None) => Ok(WaitState::Pending),
                Err(e) if e.is_not_found() => Ok(WaitState::Pending),
                Err(e) => Err(e),
            }
        }
    })
    .await
}

/// Wait until a deleted object stops being readable.
///
/// 404, 400 and empty responses mean gone; a present object is pending.
pub async fn wait_until_absent<T, F, Fut>(
    what: &str,
    id: &str,
    config: &WaitConfig,
    cancel: &CancellationToken,
    mut fetch: F,
) -> ProviderResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<Option<T>>>,
{
    poll_until(what, id, config, cancel, || {
        let fetched = fetch();
        async move {
            match fetched.await {
                Ok(Some(_)) => Ok(WaitState::Pending),
                Ok(None) => Ok(WaitState::Ready(())),
                Err(e) if e.is_not_found() => Ok(WaitState::Ready(())),
                Err(ProviderError::Upstream {
                    status: Some(400), ..
                }) => Ok(WaitState::Ready(())),
                Err(e) => Err(e),
            }
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn config(interval_secs: u64, timeout_secs: u64) -> WaitConfig {
        WaitConfig::new(
            Duration::from_secs(interval_secs),
            Duration::from_secs(timeout_secs),
        )
    }

    fn not_found() -> ProviderError {
        ProviderError::NotFound {
            url: "http://x".to_string(),
            message: String::new(),
        }
    }

    fn upstream(status: u16) -> ProviderError {
        ProviderError::Upstream {
            context: "GET".to_string(),
            status: Some(status),
            url: "http://x".to_string(),
            message: "boom".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_wait_returns_once_target_reached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let statuses = ["CREATING", "CREATING", "READY"];

        let result = wait_for_status(
            "redis",
            "t1/cache",
            "READY",
            &config(30, 900),
            &CancellationToken::new(),
            move || {
                let n = c.fetch_add(1, Ordering::SeqCst);
                async move { Ok(Some(statuses[n.min(2)].to_string())) }
            },
            |s: &String| Some(s.clone()),
        )
        .await;

        assert_eq!(result.unwrap(), "READY");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_when_target_never_reached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let started = Instant::now();

        let result = wait_for_status(
            "redis",
            "t1/cache",
            "READY",
            &config(10, 30),
            &CancellationToken::new(),
            move || {
                c.fetch_add(1, Ordering::SeqCst);
                async { Ok(Some("CREATING".to_string())) }
            },
            |s: &String| Some(s.clone()),
        )
        .await;

        assert!(matches!(result, Err(ProviderError::Timeout { .. })));
        // polls at 0s, 10s, 20s and 30s
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(started.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_error_surfaces_immediately_by_default() {
        let result = wait_for_status(
            "redis",
            "t1/cache",
            "READY",
            &config(1, 60),
            &CancellationToken::new(),
            || async { Err::<Option<String>, _>(upstream(500)) },
            |s: &String| Some(s.clone()),
        )
        .await;

        assert!(matches!(
            result,
            Err(ProviderError::Upstream {
                status: Some(500),
                ..
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tolerated_errors_are_treated_as_pending() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();

        let result = wait_for_status(
            "redis",
            "t1/cache",
            "READY",
            &config(1, 60).with_tolerated_errors(3),
            &CancellationToken::new(),
            move || {
                let n = c.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 3 {
                        Err(upstream(502))
                    } else {
                        Ok(Some("READY".to_string()))
                    }
                }
            },
            |s: &String| Some(s.clone()),
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_after_budget_exhausted_is_surfaced() {
        let result = wait_for_status(
            "redis",
            "t1/cache",
            "READY",
            &config(1, 60).with_tolerated_errors(2),
            &CancellationToken::new(),
            || async { Err::<Option<String>, _>(upstream(503)) },
            |s: &String| Some(s.clone()),
        )
        .await;

        assert!(matches!(result, Err(ProviderError::Upstream { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_aborts_with_cancelled() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(45)).await;
            trigger.cancel();
        });

        let result = wait_for_status(
            "redis",
            "t1/cache",
            "READY",
            &config(30, 900),
            &cancel,
            || async { Ok(Some("CREATING".to_string())) },
            |s: &String| Some(s.clone()),
        )
        .await;

        assert!(matches!(result, Err(ProviderError::Cancelled { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_present_treats_not_found_as_pending() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();

        let result = wait_until_present(
            "aws tag",
            "t1/arn/k",
            &config(5, 60),
            &CancellationToken::new(),
            move || {
                let n = c.fetch_add(1, Ordering::SeqCst);
                async move {
                    match n {
                        0 => Err(not_found()),
                        1 => Ok(None),
                        _ => Ok(Some(42)),
                    }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_present_surfaces_other_errors() {
        let result = wait_until_present::<i32, _, _>(
            "aws tag",
            "t1/arn/k",
            &config(5, 60),
            &CancellationToken::new(),
            || async { Err(upstream(500)) },
        )
        .await;

        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_accepts_not_found_and_bad_request() {
        let gone = wait_until_absent::<i32, _, _>(
            "aws tag",
            "t1/arn/k",
            &config(5, 60),
            &CancellationToken::new(),
            || async { Err(not_found()) },
        )
        .await;
        assert!(gone.is_ok());

        let gone = wait_until_absent::<i32, _, _>(
            "aws tag",
            "t1/arn/k",
            &config(5, 60),
            &CancellationToken::new(),
            || async { Err(upstream(400)) },
        )
        .await;
        assert!(gone.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_waits_while_object_present() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();

        let result = wait_until_absent(
            "aws tag",
            "t1/arn/k",
            &config(5, 60),
            &CancellationToken::new(),
            move || {
                let n = c.fetch_add(1, Ordering::SeqCst);
                async move { Ok(if n < 2 { Some(1) } else { None }) }
            },
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
