//! Retry-Action Loop: wait out a transient busy state by repeating a gesture.
//!
//! Some IDE menus are populated asynchronously. While the plugin is still
//! loading, its submenu shows a placeholder item ("Initializing...") and the
//! menu does not refresh by itself, so waiting idle is not enough: the menu
//! has to be closed and reopened until the real entries show up.
//!
//! [`retry_action`] runs that loop with an explicit cycle cap:
//!
//! 1. perform the primary action,
//! 2. poll briefly for the busy state to clear,
//! 3. if still busy, perform the dismiss action, sleep a fixed backoff and
//!    start over.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info_span, warn, Instrument};

use crate::condition::{element_absent, Condition};
use crate::context::AppContext;
use crate::driver::UiDriver;
use crate::locator::ElementLocator;
use crate::wait::{poll_wait, wait_for_object, WaitError, WaitOptions};

/// Tuning of a retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOptions {
    /// Budget for the busy state to clear after each primary action.
    pub settle: WaitOptions,
    /// Pause after each dismiss.
    pub backoff: Duration,
    /// Dismiss-and-retry cycles allowed before giving up.
    pub max_cycles: u32,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            settle: WaitOptions::with_timeout(Duration::from_secs(2)).interval(Duration::from_millis(250)),
            backoff: Duration::from_secs(1),
            max_cycles: 20,
        }
    }
}

/// Outcome of a [`retry_action`] loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// The busy state cleared after `cycles` dismiss-and-retry cycles.
    Cleared { cycles: u32 },
    /// The busy state persisted through all `cycles` allowed cycles.
    Exhausted { cycles: u32 },
}

impl RetryOutcome {
    pub fn is_cleared(&self) -> bool {
        matches!(self, RetryOutcome::Cleared { .. })
    }

    pub fn cycles(&self) -> u32 {
        match self {
            RetryOutcome::Cleared { cycles } | RetryOutcome::Exhausted { cycles } => *cycles,
        }
    }

    /// Treats exhaustion as a hard failure.
    pub fn into_result(self, what: impl Into<String>) -> Result<u32, RetryError> {
        match self {
            RetryOutcome::Cleared { cycles } => Ok(cycles),
            RetryOutcome::Exhausted { cycles } => Err(RetryError::Exhausted {
                what: what.into(),
                cycles,
            }),
        }
    }
}

/// Error for callers that treat exhaustion as fatal.
#[derive(Error, Debug)]
pub enum RetryError {
    #[error("{what} still busy after {cycles} retries")]
    Exhausted { what: String, cycles: u32 },
}

/// Runs the retry loop.
///
/// `cleared` is satisfied once the busy state is gone. Errors from either
/// action abort the loop. When the cap is reached the dismiss action runs
/// one last time so the UI is not left with an open menu, and
/// [`RetryOutcome::Exhausted`] is returned.
pub async fn retry_action<C, P, PF, X, XF, E>(
    cleared: &C,
    mut primary: P,
    mut dismiss: X,
    options: RetryOptions,
) -> Result<RetryOutcome, E>
where
    C: Condition + ?Sized,
    P: FnMut() -> PF,
    PF: Future<Output = Result<(), E>>,
    X: FnMut() -> XF,
    XF: Future<Output = Result<(), E>>,
{
    let span = info_span!("retry_action", what = %cleared.describe(), max_cycles = options.max_cycles);
    async {
        let mut cycles: u32 = 0;
        loop {
            primary().await?;
            if poll_wait(cleared, options.settle).await.is_satisfied() {
                debug!(cycles, "busy state cleared");
                return Ok(RetryOutcome::Cleared { cycles });
            }
            dismiss().await?;
            if cycles >= options.max_cycles {
                warn!(cycles, "busy state did not clear");
                return Ok(RetryOutcome::Exhausted { cycles });
            }
            debug!(cycle = cycles + 1, backoff_ms = options.backoff.as_millis() as u64, "still busy, retrying");
            tokio::time::sleep(options.backoff).await;
            cycles += 1;
        }
    }
    .instrument(span)
    .await
}

/// Opens `menu`, then its `entry`, reopening the menu while `busy` (the
/// loading placeholder) is shown.
///
/// Clicking `menu` a second time closes it.
pub async fn open_menu_entry<D>(
    driver: &D,
    ctx: &AppContext,
    menu: &ElementLocator,
    entry: &ElementLocator,
    busy: &ElementLocator,
    options: RetryOptions,
) -> Result<RetryOutcome, WaitError>
where
    D: UiDriver + ?Sized,
{
    let cleared = element_absent(driver, ctx, busy);
    retry_action(
        &cleared,
        || async move {
            driver.click(ctx, menu).await?;
            wait_for_object(driver, ctx, entry, options.settle).await?;
            driver.click(ctx, entry).await?;
            Ok::<(), WaitError>(())
        },
        || async move {
            driver.click(ctx, menu).await?;
            Ok::<(), WaitError>(())
        },
        options,
    )
    .await
}
