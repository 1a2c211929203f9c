//! # vsui-core
//!
//! Synchronization primitives for end-to-end GUI tests of an IDE plugin.
//!
//! GUI tests race against an application that updates its UI asynchronously:
//! dialogs appear late, menus are populated in the background and new
//! processes show up as separate application contexts. This crate provides
//! bounded waits over re-evaluable conditions, a retry loop for gestures that
//! must be repeated until a transient busy state clears, and the locator and
//! driver model those waits run against.
//!
//! ## Modules
//!
//! - [`wait`] - Poll-Wait over a [`condition::Condition`], blocking locate
//! - [`retry`] - Retry-Action Loop with a cycle cap
//! - [`condition`] - Condition probes over a driver or a closure
//! - [`locator`] - Validated `ElementLocator` with container chains
//! - [`object_map`] - Named locators loaded from JSON
//! - [`driver`] - The `UiDriver` trait implemented by automation backends
//! - [`memory`] - In-memory driver over recorded UI snapshots
//! - [`context`] - Application context handles and `fix_app_context`
//! - [`element`] - UI element snapshots
//! - [`report`] - Verdict reporting with sections and JSON Lines output
//! - [`config`] - Suite environment and persistent timing settings
//! - [`project`] - Project template expectations for wizard scenarios
//!
//! ## Example
//!
//! ```no_run
//! use vsui_core::context::{fix_app_context, IDE_CONTEXT_NAME};
//! use vsui_core::memory::MemoryDriver;
//! use vsui_core::object_map::ObjectMap;
//! use vsui_core::wait::{wait_for_object, WaitOptions};
//! use vsui_core::driver::UiDriver;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let names = ObjectMap::load("names.json")?;
//! let driver = MemoryDriver::load_snapshot("snapshot.json")?;
//!
//! let ide = fix_app_context(&driver, IDE_CONTEXT_NAME).await?;
//! let tools = names.get("qt_vs_tools_menu")?;
//! wait_for_object(&driver, &ide, &tools, WaitOptions::default()).await?;
//! driver.click(&ide, &tools).await?;
//! # Ok(())
//! # }
//! ```

pub mod condition;
pub mod config;
pub mod context;
pub mod driver;
pub mod element;
pub mod locator;
pub mod memory;
pub mod object_map;
pub mod project;
pub mod report;
pub mod retry;
pub mod wait;
