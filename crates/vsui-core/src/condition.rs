//! Condition probes for [`poll_wait`](crate::wait::poll_wait).
//!
//! A [`Condition`] is a side-effect-free check that can be evaluated any
//! number of times. Probes over the UI go through a [`UiDriver`]; a driver
//! error while probing counts as "not satisfied" so that a transient
//! failure (a window being torn down mid-query) does not abort the wait.
//!
//! ```no_run
//! use vsui_core::condition::{element_absent, not, predicate, Condition};
//! # use vsui_core::{context::AppContext, locator::ElementLocator, memory::MemoryDriver};
//! # async fn demo(driver: &MemoryDriver, ctx: &AppContext, dialog: &ElementLocator) {
//! let closed = element_absent(driver, ctx, dialog);
//! let never = not(predicate("always", || true));
//! assert!(!never.check().await);
//! # let _ = closed;
//! # }
//! ```

use std::future::Future;

use async_trait::async_trait;
use tracing::debug;

use crate::context::AppContext;
use crate::driver::UiDriver;
use crate::locator::ElementLocator;

/// A re-evaluable boolean probe.
#[async_trait]
pub trait Condition: Send + Sync {
    /// Evaluates the probe once.
    async fn check(&self) -> bool;

    /// What the probe waits for, for log and error messages.
    fn describe(&self) -> String;
}

/// Satisfied while `locator` addresses an element.
pub struct ElementExists<'a, D: ?Sized> {
    driver: &'a D,
    ctx: &'a AppContext,
    locator: &'a ElementLocator,
}

/// Satisfied while `locator` addresses nothing.
pub struct ElementAbsent<'a, D: ?Sized> {
    driver: &'a D,
    ctx: &'a AppContext,
    locator: &'a ElementLocator,
}

/// Satisfied when the element's text equals `expected`.
pub struct TextEquals<'a, D: ?Sized> {
    driver: &'a D,
    ctx: &'a AppContext,
    locator: &'a ElementLocator,
    expected: String,
}

/// How [`ContextCount`] compares the number of live contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountCheck {
    Exactly(usize),
    AtLeast(usize),
    AtMost(usize),
}

impl CountCheck {
    pub fn holds(self, count: usize) -> bool {
        match self {
            CountCheck::Exactly(n) => count == n,
            CountCheck::AtLeast(n) => count >= n,
            CountCheck::AtMost(n) => count <= n,
        }
    }
}

/// Satisfied when the number of live application contexts passes `check`.
pub struct ContextCount<'a, D: ?Sized> {
    driver: &'a D,
    check: CountCheck,
}

/// Satisfied when some live context's name starts with `prefix`.
pub struct ContextNamed<'a, D: ?Sized> {
    driver: &'a D,
    prefix: String,
}

/// Wraps a synchronous closure.
pub struct Predicate<F> {
    what: String,
    f: F,
}

/// Wraps an async closure.
pub struct Probe<F> {
    what: String,
    f: F,
}

/// Negates another condition.
pub struct Not<C>(C);

pub fn element_exists<'a, D: UiDriver + ?Sized>(
    driver: &'a D,
    ctx: &'a AppContext,
    locator: &'a ElementLocator,
) -> ElementExists<'a, D> {
    ElementExists { driver, ctx, locator }
}

pub fn element_absent<'a, D: UiDriver + ?Sized>(
    driver: &'a D,
    ctx: &'a AppContext,
    locator: &'a ElementLocator,
) -> ElementAbsent<'a, D> {
    ElementAbsent { driver, ctx, locator }
}

pub fn text_equals<'a, D: UiDriver + ?Sized>(
    driver: &'a D,
    ctx: &'a AppContext,
    locator: &'a ElementLocator,
    expected: impl Into<String>,
) -> TextEquals<'a, D> {
    TextEquals {
        driver,
        ctx,
        locator,
        expected: expected.into(),
    }
}

pub fn context_count<D: UiDriver + ?Sized>(driver: &D, check: CountCheck) -> ContextCount<'_, D> {
    ContextCount { driver, check }
}

pub fn context_named<D: UiDriver + ?Sized>(driver: &D, prefix: impl Into<String>) -> ContextNamed<'_, D> {
    ContextNamed {
        driver,
        prefix: prefix.into(),
    }
}

pub fn predicate<F>(what: impl Into<String>, f: F) -> Predicate<F>
where
    F: Fn() -> bool + Send + Sync,
{
    Predicate { what: what.into(), f }
}

pub fn probe<F, Fut>(what: impl Into<String>, f: F) -> Probe<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = bool> + Send,
{
    Probe { what: what.into(), f }
}

pub fn not<C: Condition>(condition: C) -> Not<C> {
    Not(condition)
}

#[async_trait]
impl<D: UiDriver + ?Sized> Condition for ElementExists<'_, D> {
    async fn check(&self) -> bool {
        match self.driver.exists(self.ctx, self.locator).await {
            Ok(found) => found,
            Err(e) => {
                debug!(error = %e, "existence probe failed");
                false
            }
        }
    }

    fn describe(&self) -> String {
        format!("{} to exist", self.locator)
    }
}

#[async_trait]
impl<D: UiDriver + ?Sized> Condition for ElementAbsent<'_, D> {
    async fn check(&self) -> bool {
        match self.driver.exists(self.ctx, self.locator).await {
            Ok(found) => !found,
            Err(e) => {
                debug!(error = %e, "absence probe failed");
                false
            }
        }
    }

    fn describe(&self) -> String {
        format!("{} to disappear", self.locator)
    }
}

#[async_trait]
impl<D: UiDriver + ?Sized> Condition for TextEquals<'_, D> {
    async fn check(&self) -> bool {
        match self.driver.find(self.ctx, self.locator).await {
            Ok(Some(element)) => element.text.as_deref().unwrap_or("") == self.expected,
            Ok(None) => false,
            Err(e) => {
                debug!(error = %e, "text probe failed");
                false
            }
        }
    }

    fn describe(&self) -> String {
        format!("text of {} to equal '{}'", self.locator, self.expected)
    }
}

#[async_trait]
impl<D: UiDriver + ?Sized> Condition for ContextCount<'_, D> {
    async fn check(&self) -> bool {
        match self.driver.application_contexts().await {
            Ok(contexts) => self.check.holds(contexts.len()),
            Err(e) => {
                debug!(error = %e, "context count probe failed");
                false
            }
        }
    }

    fn describe(&self) -> String {
        format!("application context count {:?}", self.check)
    }
}

#[async_trait]
impl<D: UiDriver + ?Sized> Condition for ContextNamed<'_, D> {
    async fn check(&self) -> bool {
        match self.driver.application_contexts().await {
            Ok(contexts) => contexts.iter().any(|c| c.name.starts_with(&self.prefix)),
            Err(e) => {
                debug!(error = %e, "context name probe failed");
                false
            }
        }
    }

    fn describe(&self) -> String {
        format!("an application context named '{}*'", self.prefix)
    }
}

#[async_trait]
impl<F> Condition for Predicate<F>
where
    F: Fn() -> bool + Send + Sync,
{
    async fn check(&self) -> bool {
        (self.f)()
    }

    fn describe(&self) -> String {
        self.what.clone()
    }
}

#[async_trait]
impl<F, Fut> Condition for Probe<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = bool> + Send,
{
    async fn check(&self) -> bool {
        (self.f)().await
    }

    fn describe(&self) -> String {
        self.what.clone()
    }
}

#[async_trait]
impl<C: Condition> Condition for Not<C> {
    async fn check(&self) -> bool {
        !self.0.check().await
    }

    fn describe(&self) -> String {
        format!("not ({})", self.0.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::UiElement;
    use crate::memory::MemoryDriver;

    fn ide() -> AppContext {
        AppContext::new(1, "devenv")
    }

    fn dialog() -> ElementLocator {
        ElementLocator::builder().element_type("Dialog").text("Options").build().unwrap()
    }

    async fn driver_with_dialog() -> MemoryDriver {
        let driver = MemoryDriver::new();
        driver
            .add_context(ide(), vec![UiElement::new("Dialog").with_text("Options")])
            .await;
        driver
    }

    #[tokio::test]
    async fn existence_checks_are_idempotent() {
        let driver = driver_with_dialog().await;
        let ctx = ide();
        let locator = dialog();
        let probe = element_exists(&driver, &ctx, &locator);
        for _ in 0..5 {
            assert!(probe.check().await);
        }
        assert!(driver.calls().await.is_empty());
    }

    #[tokio::test]
    async fn absent_is_negation_of_exists() {
        let driver = driver_with_dialog().await;
        let ctx = ide();
        let locator = dialog();
        assert!(!element_absent(&driver, &ctx, &locator).check().await);
        driver.update_tree(&ctx, |tree| tree.clear()).await.unwrap();
        assert!(element_absent(&driver, &ctx, &locator).check().await);
    }

    #[tokio::test]
    async fn driver_error_is_not_satisfied() {
        let driver = MemoryDriver::new();
        let gone = AppContext::new(9, "devenv");
        let locator = dialog();
        assert!(!element_exists(&driver, &gone, &locator).check().await);
        assert!(!element_absent(&driver, &gone, &locator).check().await);
    }

    #[tokio::test]
    async fn text_equals_compares_text() {
        let driver = driver_with_dialog().await;
        let ctx = ide();
        let locator = dialog();
        assert!(text_equals(&driver, &ctx, &locator, "Options").check().await);
        assert!(!text_equals(&driver, &ctx, &locator, "Other").check().await);
    }

    #[tokio::test]
    async fn context_probes() {
        let driver = driver_with_dialog().await;
        assert!(context_count(&driver, CountCheck::Exactly(1)).check().await);
        assert!(!context_count(&driver, CountCheck::AtLeast(2)).check().await);
        assert!(!context_named(&driver, "QtQuickApplication").check().await);

        driver.add_context(AppContext::new(2, "QtQuickApplication1"), vec![]).await;
        assert!(context_count(&driver, CountCheck::AtLeast(2)).check().await);
        assert!(context_named(&driver, "QtQuickApplication").check().await);
    }

    #[tokio::test]
    async fn not_inverts_and_describes() {
        let c = not(predicate("flag set", || false));
        assert!(c.check().await);
        assert_eq!(c.describe(), "not (flag set)");
    }

    #[test]
    fn count_check_holds() {
        assert!(CountCheck::AtMost(0).holds(0));
        assert!(!CountCheck::AtMost(0).holds(1));
        assert!(CountCheck::Exactly(2).holds(2));
    }
}
