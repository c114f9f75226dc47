//! Retrying page loads with exponential backoff.

use crate::cursor::{Page, PageRequest};
use crate::loader::PageLoader;
use async_trait::async_trait;
use log::warn;
use rand::Rng;
use std::time::Duration;

/// How failed page loads are retried by [`RetryingLoader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first failed attempt.
    pub max_retries: u32,

    /// Delay before the first retry. Each following retry doubles it.
    pub initial_delay: Duration,

    /// Upper bound for the delay between retries.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-indexed), with ±10% jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.delay_with(attempt, &mut rand::thread_rng())
    }

    /// Delay before retry number `attempt` without jitter: `initial_delay`
    /// doubled per attempt, capped at `max_delay`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        self.initial_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay)
    }

    /// Like [`delay_for`](Self::delay_for), drawing the jitter from `rng`.
    pub fn delay_with<R: Rng>(&self, attempt: u32, rng: &mut R) -> Duration {
        let base = self.base_delay(attempt);
        if base.is_zero() {
            return base;
        }
        let factor = rng.gen_range(0.9..=1.1);
        Duration::try_from_secs_f64(base.as_secs_f64() * factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Error of a [`RetryingLoader`] once every attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// All attempts failed; carries the last error.
    #[error("Page load failed after {attempts} attempt(s): {source}")]
    Exhausted {
        /// Attempts made, the first one included.
        attempts: u32,
        /// The error of the last attempt.
        #[source]
        source: E,
    },
}

impl<E> RetryError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// The error of the last attempt.
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { source, .. } => source,
        }
    }
}

/// A [`PageLoader`] decorator retrying failed loads according to a [`RetryPolicy`].
///
/// Each attempt reuses the same request, so the cursor never moves between retries.
#[derive(Debug, Clone)]
pub struct RetryingLoader<L> {
    inner: L,
    policy: RetryPolicy,
}

impl<L> RetryingLoader<L> {
    /// Wraps `inner`.
    pub fn new(inner: L, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The wrapped loader.
    pub fn inner(&self) -> &L {
        &self.inner
    }

    /// The retry policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<L> PageLoader for RetryingLoader<L>
where
    L: PageLoader,
{
    type Params = L::Params;
    type Item = L::Item;
    type Error = RetryError<L::Error>;

    async fn load_page(
        &self,
        params: &Self::Params,
        request: PageRequest,
    ) -> Result<Page<Self::Item>, Self::Error> {
        let mut attempt = 0;
        loop {
            match self.inner.load_page(params, request.clone()).await {
                Ok(page) => return Ok(page),
                Err(err) if attempt < self.policy.max_retries => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        "Page load at cursor {:?} failed (attempt {}/{}), retrying in {:?}: {}",
                        request.page_token,
                        attempt + 1,
                        self.policy.max_retries + 1,
                        delay,
                        err
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    return Err(RetryError::Exhausted {
                        attempts: attempt + 1,
                        source: err,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
        }
    }

    #[test]
    fn delay_doubles_until_capped() {
        let policy = policy();
        assert_eq!(policy.base_delay(0), Duration::from_millis(100));
        assert_eq!(policy.base_delay(1), Duration::from_millis(200));
        assert_eq!(policy.base_delay(3), Duration::from_millis(800));
        assert_eq!(policy.base_delay(4), Duration::from_millis(1000));
        assert_eq!(policy.base_delay(200), Duration::from_millis(1000));
    }

    #[test]
    fn jitter_stays_within_ten_percent() {
        let policy = policy();
        for seed in 0..8 {
            let delay = policy.delay_with(1, &mut StdRng::seed_from_u64(seed));
            assert!(
                (Duration::from_millis(180)..=Duration::from_millis(220)).contains(&delay),
                "delay {delay:?} out of range"
            );
        }
    }

    #[test]
    fn jitter_is_reproducible_with_the_same_rng() {
        let policy = policy();
        let a = policy.delay_with(2, &mut StdRng::seed_from_u64(7));
        let b = policy.delay_with(2, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn jitter_never_exceeds_max_delay() {
        let policy = policy();
        for seed in 0..8 {
            assert!(policy.delay_with(10, &mut StdRng::seed_from_u64(seed)) <= policy.max_delay);
        }
    }

    #[test]
    fn zero_delay_has_no_jitter() {
        let policy = RetryPolicy {
            initial_delay: Duration::ZERO,
            ..policy()
        };
        assert_eq!(policy.delay_for(2), Duration::ZERO);
    }

    #[test]
    fn none_never_retries() {
        assert_eq!(RetryPolicy::none().max_retries, 0);
    }
}
