//! UI driver trait for backend-agnostic automation of the host application.
//!
//! This module defines the [`UiDriver`] trait, the seam between the
//! synchronization helpers and whatever actually talks to the automated IDE.
//! Every call that touches the UI takes the [`AppContext`] it is aimed at;
//! the driver keeps no notion of a "current" application instance.
//!
//! The trait includes default implementations of the locate operations that
//! fetch the whole element tree via [`dump_tree`](UiDriver::dump_tree) and
//! search it locally. Backends with server-side search can override them.

use async_trait::async_trait;
use thiserror::Error;

use crate::context::AppContext;
use crate::element::UiElement;
use crate::locator::ElementLocator;

/// Errors that can occur during driver operations.
#[derive(Error, Debug)]
pub enum DriverError {
    /// A gesture targeted a locator that matched nothing.
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// The application context is no longer alive.
    #[error("Application context '{0}' is gone")]
    ContextGone(String),

    /// A command or operation failed with the given message.
    #[error("Command failed: {0}")]
    CommandFailed(String),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse JSON data.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Operations the synchronization helpers need from an automation backend.
///
/// # Required Methods
///
/// Implementors must provide [`application_contexts`](UiDriver::application_contexts),
/// [`dump_tree`](UiDriver::dump_tree), [`click`](UiDriver::click),
/// [`type_text`](UiDriver::type_text) and [`press_keys`](UiDriver::press_keys).
#[async_trait]
pub trait UiDriver: Send + Sync {
    /// Enumerate the live application instances the backend can talk to.
    async fn application_contexts(&self) -> Result<Vec<AppContext>, DriverError>;

    /// Get the full element tree of one application context.
    ///
    /// Returns the top-level windows, dialogs and popups; each element may
    /// contain nested children.
    async fn dump_tree(&self, ctx: &AppContext) -> Result<Vec<UiElement>, DriverError>;

    /// Non-blocking locate: the first element `locator` addresses right now.
    async fn find(
        &self,
        ctx: &AppContext,
        locator: &ElementLocator,
    ) -> Result<Option<UiElement>, DriverError> {
        let tree = self.dump_tree(ctx).await?;
        Ok(locator.find_in(&tree))
    }

    /// Non-blocking existence check.
    async fn exists(&self, ctx: &AppContext, locator: &ElementLocator) -> Result<bool, DriverError> {
        Ok(self.find(ctx, locator).await?.is_some())
    }

    /// Click the element `locator` addresses.
    async fn click(&self, ctx: &AppContext, locator: &ElementLocator) -> Result<(), DriverError>;

    /// Double-click the element `locator` addresses.
    ///
    /// The default implementation clicks twice.
    async fn double_click(&self, ctx: &AppContext, locator: &ElementLocator) -> Result<(), DriverError> {
        self.click(ctx, locator).await?;
        self.click(ctx, locator).await
    }

    /// Type text into the element `locator` addresses.
    async fn type_text(
        &self,
        ctx: &AppContext,
        locator: &ElementLocator,
        text: &str,
    ) -> Result<(), DriverError>;

    /// Send a key chord such as `<F5>` or `<Alt+F4>` to the element.
    async fn press_keys(
        &self,
        ctx: &AppContext,
        locator: &ElementLocator,
        keys: &str,
    ) -> Result<(), DriverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_display() {
        let err = DriverError::ElementNotFound("{type='Button'}".to_string());
        assert!(err.to_string().contains("{type='Button'}"));

        let err = DriverError::ContextGone("devenv".to_string());
        assert!(err.to_string().contains("devenv"));

        let err = DriverError::CommandFailed("click failed".to_string());
        assert!(err.to_string().contains("click failed"));
    }
}
