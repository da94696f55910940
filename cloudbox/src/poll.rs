//! Poll-until-condition-or-timeout, shared by context sync and session
//! pause/resume.

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;

const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Time source for the poll loop. Tests swap in a virtual clock so timeouts
/// resolve without waiting on the wall clock.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub timeout: Duration,
    pub interval: Duration,
}

impl PollSettings {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout,
            interval: interval.max(MIN_INTERVAL),
        }
    }

    /// Non-finite or negative values collapse to zero.
    pub fn from_secs_f64(timeout: f64, interval: f64) -> Self {
        Self::new(
            Duration::try_from_secs_f64(timeout).unwrap_or_default(),
            Duration::try_from_secs_f64(interval).unwrap_or_default(),
        )
    }
}

/// Verdict of the per-cycle predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<T> {
    Done(T),
    Continue,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PollError<E> {
    #[error("{0}")]
    Fetch(E),
    #[error("timed out after {attempts} attempts ({elapsed:?})")]
    TimedOut { elapsed: Duration, attempts: u32 },
}

/// Calls `fetch` until `check` reports [`Step::Done`], a fetch fails, or the
/// next sleep would overrun `settings.timeout`.
///
/// The first fetch happens immediately. A failed fetch ends the loop at once;
/// there is no retry inside an attempt.
pub async fn poll_until<C, F, Fut, T, E, P, R>(
    clock: &C,
    settings: PollSettings,
    mut fetch: F,
    mut check: P,
) -> Result<R, PollError<E>>
where
    C: Clock + ?Sized,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: FnMut(T) -> Step<R>,
{
    let started = clock.now();
    let mut attempts = 0u32;
    loop {
        attempts = attempts.saturating_add(1);
        let value = fetch().await.map_err(PollError::Fetch)?;
        if let Step::Done(result) = check(value) {
            tracing::debug!(attempts, "poll condition reached");
            return Ok(result);
        }

        let elapsed = clock.now().saturating_duration_since(started);
        if elapsed.saturating_add(settings.interval) > settings.timeout {
            return Err(PollError::TimedOut { elapsed, attempts });
        }
        tracing::debug!(attempts, ?elapsed, "poll condition pending");
        clock.sleep(settings.interval).await;
    }
}

/// Virtual clock: `sleep` returns at once and moves `now` forward.
#[cfg(test)]
#[derive(Debug)]
pub(crate) struct ManualClock {
    now: std::sync::Mutex<Instant>,
    slept: std::sync::Mutex<Vec<Duration>>,
}

#[cfg(test)]
impl ManualClock {
    pub(crate) fn new() -> Self {
        Self {
            now: std::sync::Mutex::new(Instant::now()),
            slept: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn sleeps(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        *self.now.lock().unwrap() += duration;
        self.slept.lock().unwrap().push(duration);
    }
}
