use crate::error::AnnotateError;
use std::time::Duration;

/// Something that can block the current thread for a while.
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

impl<S: Sleeper + ?Sized> Sleeper for &mut S {
    fn sleep(&mut self, duration: Duration) { (**self).sleep(duration) }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) { std::thread::sleep(duration) }
}

/// Fixed-interval retry of rate-limited requests.
///
/// Only `AnnotateError::RateLimited` is retried. With `max_attempts` unset
/// the request is retried until it stops being rate limited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub backoff: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self { Self::fixed(Duration::from_secs(1)) }
}

#[derive(Debug)]
pub enum RetryError {
    /// The request failed with a non-retryable error.
    Fatal(AnnotateError),
    /// The bounded policy ran out of attempts while still rate limited.
    Exhausted { attempts: u32, last: AnnotateError },
}

/// A value obtained through the policy, with the number of backoff waits it took.
#[derive(Debug)]
pub struct Retried<T> {
    pub value: T,
    pub waits: u32,
}

impl RetryPolicy {
    pub fn fixed(backoff: Duration) -> Self {
        Self { backoff, max_attempts: None }
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts.map(|n| n.max(1));
        self
    }

    pub fn run<T, S, F>(&self, sleeper: &mut S, mut op: F) -> Result<Retried<T>, RetryError>
    where
        S: Sleeper + ?Sized,
        F: FnMut() -> Result<T, AnnotateError>,
    {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match op() {
                Ok(value) => return Ok(Retried { value, waits: attempts - 1 }),
                Err(e) if e.is_rate_limited() => {
                    if self.max_attempts.is_some_and(|max| attempts >= max) {
                        return Err(RetryError::Exhausted { attempts, last: e });
                    }
                    tracing::warn!(attempt = attempts, backoff_ms = self.backoff.as_millis() as u64, "rate limited, backing off and trying again");
                    sleeper.sleep(self.backoff);
                }
                Err(e) => return Err(RetryError::Fatal(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(Vec<Duration>);

    impl Sleeper for Recorder {
        fn sleep(&mut self, duration: Duration) { self.0.push(duration) }
    }

    fn limited() -> AnnotateError { AnnotateError::RateLimited("slow down".into()) }

    #[test]
    fn unbounded_keeps_retrying() {
        let policy = RetryPolicy::fixed(Duration::from_millis(5));
        let mut sleeper = Recorder::default();
        let mut calls = 0;
        let out = policy
            .run(&mut sleeper, || {
                calls += 1;
                if calls <= 50 { Err(limited()) } else { Ok(calls) }
            })
            .unwrap();
        assert_eq!(out.value, 51);
        assert_eq!(out.waits, 50);
        assert!(sleeper.0.iter().all(|d| *d == Duration::from_millis(5)));
    }

    #[test]
    fn bounded_gives_up() {
        let policy = RetryPolicy::fixed(Duration::from_millis(1)).with_max_attempts(Some(3));
        let mut sleeper = Recorder::default();
        let mut calls = 0;
        let err = policy
            .run(&mut sleeper, || -> Result<(), _> {
                calls += 1;
                Err(limited())
            })
            .unwrap_err();
        assert!(matches!(err, RetryError::Exhausted { attempts: 3, .. }));
        assert_eq!(calls, 3);
        assert_eq!(sleeper.0.len(), 2);
    }

    #[test]
    fn service_errors_are_not_retried() {
        let policy = RetryPolicy::default();
        let mut sleeper = Recorder::default();
        let mut calls = 0;
        let err = policy
            .run(&mut sleeper, || -> Result<(), _> {
                calls += 1;
                Err(AnnotateError::Service("401".into()))
            })
            .unwrap_err();
        assert!(matches!(err, RetryError::Fatal(AnnotateError::Service(_))));
        assert_eq!(calls, 1);
        assert!(sleeper.0.is_empty());
    }

    #[test]
    fn zero_max_attempts_means_one() {
        let policy = RetryPolicy::default().with_max_attempts(Some(0));
        assert_eq!(policy.max_attempts, Some(1));
    }
}
