//! Shared test helpers for vsui-core integration tests.
//!
//! Scripted drivers and conditions whose behavior depends on the (paused)
//! tokio clock or on how often they were poked, so that timing and retry
//! properties can be asserted exactly.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use vsui_core::condition::{predicate, Predicate};
use vsui_core::context::AppContext;
use vsui_core::driver::{DriverError, UiDriver};
use vsui_core::element::UiElement;
use vsui_core::locator::ElementLocator;
use vsui_core::memory::MemoryDriver;

// ---------------------------------------------------------------------------
// Contexts
// ---------------------------------------------------------------------------

pub fn ide() -> AppContext {
    AppContext::new(1, "devenv").with_pid(4100)
}

pub fn other() -> AppContext {
    AppContext::new(2, "other").with_pid(4200)
}

// ---------------------------------------------------------------------------
// Clock-driven conditions
// ---------------------------------------------------------------------------

/// A condition that becomes true `after` the moment it is created and
/// counts its evaluations.
pub fn flips_after(after: Duration, evaluations: Arc<AtomicU32>) -> Predicate<impl Fn() -> bool + Send + Sync> {
    let at = Instant::now() + after;
    predicate(format!("flag set after {}ms", after.as_millis()), move || {
        evaluations.fetch_add(1, Ordering::SeqCst);
        Instant::now() >= at
    })
}

// ---------------------------------------------------------------------------
// Menu that shows a loading placeholder
// ---------------------------------------------------------------------------

pub const MENU: &str = "Extensions";
pub const ENTRY: &str = "Qt VS Tools";
pub const BUSY: &str = "Initializing...";
pub const READY: &str = "Qt Versions";

pub fn menu_item(text: &str) -> ElementLocator {
    ElementLocator::builder()
        .element_type("MenuItem")
        .text(text)
        .build()
        .unwrap()
}

/// Builds a driver whose `Extensions > Qt VS Tools` submenu shows the
/// `Initializing...` placeholder for the first `busy_opens` times it is
/// opened.
///
/// Clicking `Extensions` toggles its popup; closing it also closes the
/// submenu.
pub async fn busy_menu_driver(busy_opens: u32) -> MemoryDriver {
    let driver = MemoryDriver::new();
    driver
        .add_context(
            ide(),
            vec![UiElement::new("Window")
                .with_text("Microsoft Visual Studio")
                .with_child(UiElement::new("MenuBar").with_child(UiElement::new("MenuItem").with_text(MENU)))],
        )
        .await;

    driver
        .on_click("devenv", menu_item(MENU), |tree| {
            let open = tree.iter().any(|e| e.element_type.as_deref() == Some("Popup"));
            if open {
                tree.retain(|e| e.element_type.as_deref() != Some("Popup"));
            } else {
                tree.push(
                    UiElement::new("Popup")
                        .with_name("PART_Popup")
                        .with_child(UiElement::new("MenuItem").with_text(ENTRY)),
                );
            }
        })
        .await;

    let remaining = Arc::new(AtomicU32::new(busy_opens));
    driver
        .on_click("devenv", menu_item(ENTRY), move |tree| {
            let busy = remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            let item = if busy { BUSY } else { READY };
            tree.push(
                UiElement::new("Popup")
                    .with_name("PART_Popup")
                    .with_child(UiElement::new("MenuItem").with_text(item)),
            );
        })
        .await;

    driver
}

// ---------------------------------------------------------------------------
// Driver that fails a fixed number of tree dumps
// ---------------------------------------------------------------------------

/// Wraps a [`MemoryDriver`] and fails the first `failures` tree dumps, as a
/// backend does while a window is being torn down.
pub struct FlakyDriver {
    pub inner: MemoryDriver,
    failures: AtomicU32,
    pub dumps: AtomicU32,
}

impl FlakyDriver {
    pub fn new(inner: MemoryDriver, failures: u32) -> Self {
        Self {
            inner,
            failures: AtomicU32::new(failures),
            dumps: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl UiDriver for FlakyDriver {
    async fn application_contexts(&self) -> Result<Vec<AppContext>, DriverError> {
        self.inner.application_contexts().await
    }

    async fn dump_tree(&self, ctx: &AppContext) -> Result<Vec<UiElement>, DriverError> {
        self.dumps.fetch_add(1, Ordering::SeqCst);
        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(DriverError::CommandFailed("window is being destroyed".to_string()));
        }
        self.inner.dump_tree(ctx).await
    }

    async fn click(&self, ctx: &AppContext, locator: &ElementLocator) -> Result<(), DriverError> {
        self.inner.click(ctx, locator).await
    }

    async fn type_text(&self, ctx: &AppContext, locator: &ElementLocator, text: &str) -> Result<(), DriverError> {
        self.inner.type_text(ctx, locator, text).await
    }

    async fn press_keys(&self, ctx: &AppContext, locator: &ElementLocator, keys: &str) -> Result<(), DriverError> {
        self.inner.press_keys(ctx, locator, keys).await
    }
}
