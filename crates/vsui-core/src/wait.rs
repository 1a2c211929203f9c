//! Poll-Wait: bounded, repeated evaluation of a condition.
//!
//! [`poll_wait`] evaluates a [`Condition`] at a fixed cadence until it holds
//! or the timeout elapses. The first evaluation happens immediately and the
//! function returns as soon as an evaluation succeeds. Between evaluations
//! the task sleeps for the polling interval, clipped to the remaining budget
//! so that one last evaluation happens right at the deadline.
//!
//! Timing out is not an error in itself: [`PollResult`] is returned to the
//! caller, who decides whether it is fatal ([`PollResult::into_result`]),
//! worth reporting ([`PollResult::report`]), or ignorable.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use vsui_core::condition::element_absent;
//! use vsui_core::wait::{poll_wait, WaitOptions};
//! # use vsui_core::{context::AppContext, locator::ElementLocator, memory::MemoryDriver};
//!
//! # async fn demo(driver: &MemoryDriver, ctx: &AppContext, options_dialog: &ElementLocator) {
//! let closed = element_absent(driver, ctx, options_dialog);
//! let result = poll_wait(&closed, WaitOptions::with_timeout(Duration::from_secs(5))).await;
//! if !result.is_satisfied() {
//!     eprintln!("dialog still open after {:?}", result.elapsed());
//! }
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info_span, warn, Instrument};

use crate::condition::{element_absent, Condition};
use crate::context::AppContext;
use crate::driver::{DriverError, UiDriver};
use crate::element::UiElement;
use crate::locator::ElementLocator;
use crate::report::{ReportSink, Severity};

/// Cadence used when callers do not pick one.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Budget of a blocking locate when callers do not pick one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Shortest interval accepted; smaller values are raised to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Timeout and cadence of a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl WaitOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    pub fn from_millis(timeout_ms: u64) -> Self {
        Self::with_timeout(Duration::from_millis(timeout_ms))
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Outcome of a [`poll_wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollResult {
    /// The condition held on evaluation number `attempts`.
    Satisfied { attempts: u32, elapsed: Duration },
    /// The condition never held within the budget.
    TimedOut { attempts: u32, elapsed: Duration },
}

impl PollResult {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, PollResult::Satisfied { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            PollResult::Satisfied { attempts, .. } | PollResult::TimedOut { attempts, .. } => *attempts,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            PollResult::Satisfied { elapsed, .. } | PollResult::TimedOut { elapsed, .. } => *elapsed,
        }
    }

    /// Treats a timeout as a hard failure.
    pub fn into_result(self, what: impl Into<String>) -> Result<Duration, WaitError> {
        match self {
            PollResult::Satisfied { elapsed, .. } => Ok(elapsed),
            PollResult::TimedOut { elapsed, .. } => Err(WaitError::TimedOut {
                what: what.into(),
                waited: elapsed,
            }),
        }
    }

    /// Records a pass when satisfied, otherwise an entry of `on_timeout`
    /// severity. Returns whether the condition was satisfied.
    pub fn report(self, sink: &mut dyn ReportSink, on_timeout: Severity, message: &str) -> bool {
        match self {
            PollResult::Satisfied { .. } => {
                sink.pass(message);
                true
            }
            PollResult::TimedOut { elapsed, attempts } => {
                let detail = format!("timed out after {}ms ({} attempts)", elapsed.as_millis(), attempts);
                sink.record(on_timeout, message, Some(&detail));
                false
            }
        }
    }
}

/// Errors raised by the blocking wait helpers.
#[derive(Error, Debug)]
pub enum WaitError {
    #[error("timed out after {}ms waiting for {what}", waited.as_millis())]
    TimedOut { what: String, waited: Duration },

    #[error("element not found after {}ms: {locator}", waited.as_millis())]
    ElementNotFound { locator: String, waited: Duration },

    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Core polling loop shared by the wait helpers.
///
/// Calls `attempt` until it yields `Some`, returning the value and the
/// number of attempts, or `Err` with the attempts and elapsed time once the
/// budget is spent.
async fn poll_until<T, F, Fut>(options: WaitOptions, mut attempt: F) -> Result<(T, u32, Duration), (u32, Duration)>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let start = Instant::now();
    let interval = options.interval.max(MIN_POLL_INTERVAL);
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        if let Some(value) = attempt().await {
            return Ok((value, attempts, start.elapsed()));
        }
        let elapsed = start.elapsed();
        if elapsed >= options.timeout {
            return Err((attempts, elapsed));
        }
        tokio::time::sleep(interval.min(options.timeout - elapsed)).await;
    }
}

/// Evaluates `condition` until it holds or `options.timeout` elapses.
pub async fn poll_wait<C>(condition: &C, options: WaitOptions) -> PollResult
where
    C: Condition + ?Sized,
{
    let what = condition.describe();
    let span = info_span!("poll_wait", what = %what, timeout_ms = options.timeout.as_millis() as u64);
    async {
        let outcome = poll_until(options, || async move { condition.check().await.then_some(()) }).await;
        match outcome {
            Ok(((), attempts, elapsed)) => {
                debug!(attempts, elapsed_ms = elapsed.as_millis() as u64, "condition satisfied");
                PollResult::Satisfied { attempts, elapsed }
            }
            Err((attempts, elapsed)) => {
                debug!(attempts, elapsed_ms = elapsed.as_millis() as u64, "condition timed out");
                PollResult::TimedOut { attempts, elapsed }
            }
        }
    }
    .instrument(span)
    .await
}

/// Blocking locate: polls until `locator` addresses an element and returns it.
///
/// Driver errors during polling count as "not found yet".
pub async fn wait_for_object<D>(
    driver: &D,
    ctx: &AppContext,
    locator: &ElementLocator,
    options: WaitOptions,
) -> Result<UiElement, WaitError>
where
    D: UiDriver + ?Sized,
{
    let span = info_span!("wait_for_object", context = %ctx, timeout_ms = options.timeout.as_millis() as u64);
    async {
        let outcome = poll_until(options, || async move {
            match driver.find(ctx, locator).await {
                Ok(found) => found,
                Err(e) => {
                    debug!(error = %e, "locate attempt failed");
                    None
                }
            }
        })
        .await;
        match outcome {
            Ok((element, attempts, elapsed)) => {
                debug!(attempts, elapsed_ms = elapsed.as_millis() as u64, element = %element.describe(), "element found");
                Ok(element)
            }
            Err((attempts, elapsed)) => {
                warn!(attempts, elapsed_ms = elapsed.as_millis() as u64, locator = %locator, "element not found");
                Err(WaitError::ElementNotFound {
                    locator: locator.describe(),
                    waited: elapsed,
                })
            }
        }
    }
    .instrument(span)
    .await
}

/// Polls until `locator` addresses nothing.
pub async fn wait_for_object_gone<D>(
    driver: &D,
    ctx: &AppContext,
    locator: &ElementLocator,
    options: WaitOptions,
) -> Result<Duration, WaitError>
where
    D: UiDriver + ?Sized,
{
    let absent = element_absent(driver, ctx, locator);
    poll_wait(&absent, options).await.into_result(absent.describe())
}

/// Best-effort step: logs and discards a failure.
///
/// Used for steps that only apply sometimes, such as first-run dialogs.
pub fn optional<T, E: std::fmt::Display>(result: Result<T, E>, what: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(step = what, error = %e, "optional step skipped");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::predicate;
    use crate::report::TestReport;

    #[test]
    fn options_default_interval() {
        let opts = WaitOptions::from_millis(5000);
        assert_eq!(opts.timeout, Duration::from_millis(5000));
        assert_eq!(opts.interval, DEFAULT_POLL_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn satisfied_immediately_takes_one_attempt() {
        let result = poll_wait(&predicate("true", || true), WaitOptions::from_millis(5000)).await;
        assert_eq!(result, PollResult::Satisfied { attempts: 1, elapsed: Duration::ZERO });
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_evaluates_once() {
        let result = poll_wait(&predicate("false", || false), WaitOptions::from_millis(0)).await;
        assert_eq!(result, PollResult::TimedOut { attempts: 1, elapsed: Duration::ZERO });
    }

    #[tokio::test(start_paused = true)]
    async fn final_attempt_happens_at_deadline() {
        // 0, 500, 1000 and a clipped last sleep to 1200.
        let result = poll_wait(&predicate("false", || false), WaitOptions::from_millis(1200)).await;
        assert!(!result.is_satisfied());
        assert_eq!(result.attempts(), 4);
        assert!(result.elapsed() >= Duration::from_millis(1200));
        assert!(result.elapsed() < Duration::from_millis(1300));
    }

    #[test]
    fn into_result_maps_timeout() {
        let timed_out = PollResult::TimedOut { attempts: 3, elapsed: Duration::from_millis(1000) };
        let err = timed_out.into_result("dialog to close").unwrap_err();
        assert_eq!(err.to_string(), "timed out after 1000ms waiting for dialog to close");

        let ok = PollResult::Satisfied { attempts: 1, elapsed: Duration::ZERO };
        assert_eq!(ok.into_result("x").unwrap(), Duration::ZERO);
    }

    #[test]
    fn report_uses_requested_severity() {
        let mut report = TestReport::new("wait");
        let timed_out = PollResult::TimedOut { attempts: 2, elapsed: Duration::from_millis(500) };
        assert!(!timed_out.report(&mut report, Severity::Warning, "Options dialog closed?"));
        let ok = PollResult::Satisfied { attempts: 1, elapsed: Duration::ZERO };
        assert!(ok.report(&mut report, Severity::Fail, "Options dialog closed?"));

        let entries = report.entries();
        assert_eq!(entries[0].severity, Severity::Warning);
        assert_eq!(entries[0].detail.as_deref(), Some("timed out after 500ms (2 attempts)"));
        assert_eq!(entries[1].severity, Severity::Pass);
    }

    #[test]
    fn optional_discards_errors() {
        let skipped: Option<u32> = optional(Err::<u32, _>("no dialog"), "first-run dialog");
        assert!(skipped.is_none());
        assert_eq!(optional(Ok::<_, String>(3), "step"), Some(3));
    }
}
