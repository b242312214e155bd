//! Retry strategies and the executor that applies them.
//!
//! Strategies are grouped by concern: classifiers decide whether an error is
//! worth another attempt, waits decide how long to sleep, budgets decide when
//! to give up, and cancellation tokens abort the run. Concerns the caller
//! leaves out are filled from [`RetryDefaults`] according to the
//! [`OperationClass`] of the call.

use ovirt_common::{Error, Result, RetryConfig};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Predicate used by [`RetryStrategy::RetryIf`].
pub type RetryPredicate = Arc<dyn Fn(&Error) -> bool + Send + Sync>;

/// One composable piece of retry policy.
#[derive(Clone)]
pub enum RetryStrategy {
    /// Retry errors whose kind is retryable.
    AutoRetry,
    /// Retry errors the predicate accepts.
    RetryIf(RetryPredicate),
    /// Make at most this many attempts. Zero is treated as one.
    MaxTries(u32),
    /// Give up once the next wait would end later than this after the first attempt.
    Timeout(Duration),
    /// Sleep a constant time between attempts.
    FixedDelay(Duration),
    /// Sleep `initial`, then multiply by `factor` after each wait, never more than `max`.
    ExponentialBackoff {
        initial: Duration,
        factor: u32,
        max: Duration,
    },
    /// Abort with a cancelled error when the token fires.
    Cancellation(CancellationToken),
}

impl RetryStrategy {
    pub fn retry_if(predicate: impl Fn(&Error) -> bool + Send + Sync + 'static) -> Self {
        RetryStrategy::RetryIf(Arc::new(predicate))
    }

    pub fn max_tries(tries: u32) -> Self {
        RetryStrategy::MaxTries(tries)
    }

    pub fn timeout(timeout: Duration) -> Self {
        RetryStrategy::Timeout(timeout)
    }

    pub fn fixed_delay(delay: Duration) -> Self {
        RetryStrategy::FixedDelay(delay)
    }

    pub fn exponential_backoff(initial: Duration, factor: u32, max: Duration) -> Self {
        RetryStrategy::ExponentialBackoff {
            initial,
            factor,
            max,
        }
    }

    pub fn cancellation(token: CancellationToken) -> Self {
        RetryStrategy::Cancellation(token)
    }
}

impl fmt::Debug for RetryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryStrategy::AutoRetry => f.write_str("AutoRetry"),
            RetryStrategy::RetryIf(_) => f.write_str("RetryIf(..)"),
            RetryStrategy::MaxTries(n) => f.debug_tuple("MaxTries").field(n).finish(),
            RetryStrategy::Timeout(d) => f.debug_tuple("Timeout").field(d).finish(),
            RetryStrategy::FixedDelay(d) => f.debug_tuple("FixedDelay").field(d).finish(),
            RetryStrategy::ExponentialBackoff {
                initial,
                factor,
                max,
            } => f
                .debug_struct("ExponentialBackoff")
                .field("initial", initial)
                .field("factor", factor)
                .field("max", max)
                .finish(),
            RetryStrategy::Cancellation(token) => f
                .debug_tuple("Cancellation")
                .field(&token.is_cancelled())
                .finish(),
        }
    }
}

/// Kind of call, used to pick the default time budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationClass {
    /// Fetching or listing resources.
    Read,
    /// Creating, changing or removing resources.
    Write,
    /// Polling for a status change.
    Wait,
}

/// Policy applied for concerns a call does not configure itself.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryDefaults {
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub wait_timeout: Duration,
    pub initial_backoff: Duration,
    pub backoff_factor: u32,
    pub max_backoff: Duration,
}

impl RetryDefaults {
    fn budget(&self, class: OperationClass) -> Duration {
        match class {
            OperationClass::Read => self.read_timeout,
            OperationClass::Write => self.write_timeout,
            OperationClass::Wait => self.wait_timeout,
        }
    }
}

impl From<&RetryConfig> for RetryDefaults {
    fn from(config: &RetryConfig) -> Self {
        Self {
            read_timeout: config.read_timeout(),
            write_timeout: config.write_timeout(),
            wait_timeout: config.wait_timeout(),
            initial_backoff: config.initial_backoff(),
            backoff_factor: config.backoff_factor,
            max_backoff: config.max_backoff(),
        }
    }
}

impl Default for RetryDefaults {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Backoff {
    next: Duration,
    factor: u32,
    max: Duration,
}

impl Backoff {
    fn fixed(delay: Duration) -> Self {
        Self {
            next: delay,
            factor: 1,
            max: delay,
        }
    }

    /// Return the current delay and advance to the following one.
    fn advance(&mut self) -> Duration {
        let delay = self.next.min(self.max);
        self.next = self.next.saturating_mul(self.factor.max(1)).min(self.max);
        delay
    }
}

enum Classifier<'a> {
    Auto,
    Predicate(&'a RetryPredicate),
}

struct RetryPlan<'a> {
    classifiers: Vec<Classifier<'a>>,
    max_tries: Option<u32>,
    timeout: Option<Duration>,
    waits: Vec<Backoff>,
    tokens: Vec<&'a CancellationToken>,
}

impl<'a> RetryPlan<'a> {
    fn new(
        strategies: &'a [RetryStrategy],
        class: OperationClass,
        defaults: &RetryDefaults,
    ) -> Self {
        let mut plan = Self {
            classifiers: Vec::new(),
            max_tries: None,
            timeout: None,
            waits: Vec::new(),
            tokens: Vec::new(),
        };
        for strategy in strategies {
            match strategy {
                RetryStrategy::AutoRetry => plan.classifiers.push(Classifier::Auto),
                RetryStrategy::RetryIf(predicate) => {
                    plan.classifiers.push(Classifier::Predicate(predicate))
                }
                RetryStrategy::MaxTries(n) => {
                    let n = (*n).max(1);
                    plan.max_tries = Some(plan.max_tries.map_or(n, |m| m.min(n)));
                }
                RetryStrategy::Timeout(d) => {
                    plan.timeout = Some(plan.timeout.map_or(*d, |t| t.min(*d)));
                }
                RetryStrategy::FixedDelay(d) => plan.waits.push(Backoff::fixed(*d)),
                RetryStrategy::ExponentialBackoff {
                    initial,
                    factor,
                    max,
                } => plan.waits.push(Backoff {
                    next: *initial,
                    factor: *factor,
                    max: *max,
                }),
                RetryStrategy::Cancellation(token) => plan.tokens.push(token),
            }
        }

        if plan.classifiers.is_empty() {
            plan.classifiers.push(Classifier::Auto);
        }
        if plan.waits.is_empty() {
            plan.waits.push(Backoff {
                next: defaults.initial_backoff,
                factor: defaults.backoff_factor,
                max: defaults.max_backoff,
            });
        }
        if plan.max_tries.is_none() && plan.timeout.is_none() {
            plan.timeout = Some(defaults.budget(class));
        }
        plan
    }

    fn should_retry(&self, err: &Error) -> bool {
        self.classifiers.iter().all(|classifier| match classifier {
            Classifier::Auto => err.is_retryable(),
            Classifier::Predicate(predicate) => predicate(err),
        })
    }

    /// The longest of the configured waits. Every wait advances.
    fn next_delay(&mut self) -> Duration {
        self.waits
            .iter_mut()
            .map(Backoff::advance)
            .max()
            .unwrap_or_default()
    }

    fn is_cancelled(&self) -> bool {
        self.tokens.iter().any(|token| token.is_cancelled())
    }
}

async fn cancelled(tokens: &[&CancellationToken]) {
    if tokens.is_empty() {
        return std::future::pending().await;
    }
    futures::future::select_all(tokens.iter().map(|token| Box::pin(token.cancelled()))).await;
}

/// Run `operation` until it succeeds, fails with an error the plan does not
/// retry, or the budget runs out. The operation receives the 1-based attempt
/// number.
pub(crate) async fn execute<T, F, Fut>(
    action: &str,
    class: OperationClass,
    strategies: &[RetryStrategy],
    defaults: &RetryDefaults,
    mut operation: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut plan = RetryPlan::new(strategies, class, defaults);
    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        if plan.is_cancelled() {
            tracing::debug!(action, attempts, "Cancelled before attempt");
            return Err(Error::Cancelled(action.to_string()));
        }

        attempts += 1;
        tracing::debug!(action, attempt = attempts, "Attempting");

        let err = match operation(attempts).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !plan.should_retry(&err) {
            return Err(err);
        }

        let exhausted = |last: Error| Error::RetriesExhausted {
            action: action.to_string(),
            attempts,
            last: Box::new(last),
        };

        if plan.max_tries.is_some_and(|max| attempts >= max) {
            return Err(exhausted(err));
        }

        let delay = plan.next_delay();
        if let Some(timeout) = plan.timeout {
            if start.elapsed().saturating_add(delay) > timeout {
                return Err(exhausted(err));
            }
        }

        tracing::warn!(
            action,
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Retryable error, retrying"
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancelled(&plan.tokens) => {
                tracing::debug!(action, attempts, "Cancelled while waiting");
                return Err(Error::Cancelled(action.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovirt_common::ErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_test::{assert_err, assert_ok};

    fn transient() -> Error {
        Error::Connection("connection reset".to_string())
    }

    async fn run<T, F, Fut>(class: OperationClass, strategies: &[RetryStrategy], op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        execute("test", class, strategies, &RetryDefaults::default(), op).await
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut backoff = Backoff {
            next: Duration::from_secs(1),
            factor: 2,
            max: Duration::from_secs(5),
        };
        let delays: Vec<_> = (0..5).map(|_| backoff.advance().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 5, 5]);
    }

    #[test]
    fn test_backoff_saturates() {
        let mut backoff = Backoff {
            next: Duration::MAX,
            factor: 10,
            max: Duration::MAX,
        };
        assert_eq!(backoff.advance(), Duration::MAX);
        assert_eq!(backoff.advance(), Duration::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_errors() {
        let strategies = [
            RetryStrategy::max_tries(5),
            RetryStrategy::fixed_delay(Duration::from_secs(1)),
        ];
        let result = run(OperationClass::Read, &strategies, |attempt| async move {
            if attempt < 3 {
                Err(transient())
            } else {
                Ok(attempt)
            }
        })
        .await;
        assert_eq!(assert_ok!(result), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_is_returned_as_is() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = run(OperationClass::Write, &[], |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::bad_argument("nope")) }
        })
        .await;
        let err = assert_err!(result);
        assert_eq!(err.kind(), ErrorKind::BadArgument);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_tries_exhausted() {
        let strategies = [
            RetryStrategy::max_tries(3),
            RetryStrategy::fixed_delay(Duration::from_millis(10)),
        ];
        let defaults = RetryDefaults::default();
        let result: Result<()> =
            execute("fetching VM", OperationClass::Read, &strategies, &defaults, |_| async {
                Err(transient())
            })
            .await;
        let err = assert_err!(result);
        assert!(matches!(err, Error::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.has_kind(ErrorKind::Connection));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_max_tries_means_one_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = execute(
            "test",
            OperationClass::Read,
            &[RetryStrategy::max_tries(0)],
            &RetryDefaults::default(),
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(transient()) }
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_budget() {
        let strategies = [
            RetryStrategy::timeout(Duration::from_secs(25)),
            RetryStrategy::fixed_delay(Duration::from_secs(10)),
        ];
        let start = Instant::now();
        let result: Result<()> = run(OperationClass::Read, &strategies, |_| async {
            Err(transient())
        })
        .await;
        let err = assert_err!(result);
        assert!(matches!(err, Error::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(start.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_budget_and_backoff() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let result: Result<()> = run(OperationClass::Read, &[], |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(transient()) }
        })
        .await;
        assert!(result.is_err());
        // 1 + 2 + 4 + 8 + 16 + 30 * 8 seconds of waiting fit in the 300 s read budget.
        assert_eq!(calls.load(Ordering::SeqCst), 14);
        assert_eq!(start.elapsed(), Duration::from_secs(271));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_if_replaces_auto_retry() {
        let strategies = [
            RetryStrategy::retry_if(|err| err.is_not_found()),
            RetryStrategy::max_tries(2),
            RetryStrategy::fixed_delay(Duration::from_secs(1)),
        ];
        let result = run(OperationClass::Read, &strategies, |attempt| async move {
            if attempt == 1 {
                Err(Error::NotFound("vm".to_string()))
            } else {
                Ok(())
            }
        })
        .await;
        assert_ok!(result);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_classifiers_must_agree() {
        let calls = AtomicU32::new(0);
        let strategies = [
            RetryStrategy::AutoRetry,
            RetryStrategy::retry_if(|_| false),
            RetryStrategy::max_tries(5),
        ];
        let result: Result<()> = run(OperationClass::Read, &strategies, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(transient()) }
        })
        .await;
        assert_eq!(assert_err!(result).kind(), ErrorKind::Connection);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_longest_wait_wins() {
        let strategies = [
            RetryStrategy::fixed_delay(Duration::from_secs(1)),
            RetryStrategy::fixed_delay(Duration::from_secs(5)),
            RetryStrategy::max_tries(2),
        ];
        let start = Instant::now();
        let _ = run::<(), _, _>(OperationClass::Read, &strategies, |_| async {
            Err(transient())
        })
        .await;
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_first_attempt() {
        let token = CancellationToken::new();
        token.cancel();
        let calls = AtomicU32::new(0);
        let result: Result<()> = execute(
            "test",
            OperationClass::Read,
            &[RetryStrategy::cancellation(token)],
            &RetryDefaults::default(),
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            },
        )
        .await;
        assert_eq!(assert_err!(result).kind(), ErrorKind::Cancelled);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_while_waiting() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            canceller.cancel();
        });

        let start = Instant::now();
        let strategies = [
            RetryStrategy::cancellation(token),
            RetryStrategy::fixed_delay(Duration::from_secs(60)),
        ];
        let result: Result<()> = run(OperationClass::Wait, &strategies, |_| async {
            Err(transient())
        })
        .await;
        assert_eq!(assert_err!(result).kind(), ErrorKind::Cancelled);
        assert!(start.elapsed() < Duration::from_secs(60));
    }
}
