//! Application context handles.
//!
//! The automated IDE may spawn further instances of itself or of the
//! applications it builds (a debuggee, a wizard host). Each live instance is
//! an [`AppContext`]. Helpers pass the context they target explicitly to
//! every [`UiDriver`] call; [`fix_app_context`] picks the right one after a
//! step that may have started or ended processes.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::driver::{DriverError, UiDriver};

/// Context name of the IDE's main process.
pub const IDE_CONTEXT_NAME: &str = "devenv";

/// One live instance of an automated process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppContext {
    /// Backend-assigned identifier, unique among live contexts.
    pub id: u64,
    /// Process name without extension (e.g. `devenv`).
    pub name: String,
    /// Operating-system process id, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

impl AppContext {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            pid: None,
        }
    }

    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }
}

impl std::fmt::Display for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.pid {
            Some(pid) => write!(f, "{}#{} (pid {})", self.name, self.id, pid),
            None => write!(f, "{}#{}", self.name, self.id),
        }
    }
}

/// Errors from context selection.
#[derive(Error, Debug)]
pub enum ContextError {
    /// No live context carries the expected name.
    #[error("no application context named '{expected}' (found: [{}])", found.join(", "))]
    Unexpected { expected: String, found: Vec<String> },

    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Selects the live context named `expected`.
///
/// With a single live context that carries the expected name, that context
/// is returned unchanged. With several, the first one named `expected` is
/// selected. When none matches, the result is
/// [`ContextError::Unexpected`]; scenarios treat that as fatal.
pub async fn fix_app_context<D>(driver: &D, expected: &str) -> Result<AppContext, ContextError>
where
    D: UiDriver + ?Sized,
{
    let contexts = driver.application_contexts().await?;
    debug!(count = contexts.len(), expected, "checking application contexts");

    let selected = contexts.iter().find(|ctx| ctx.name == expected).cloned();
    match selected {
        Some(ctx) => {
            if contexts.len() > 1 {
                info!(context = %ctx, live = contexts.len(), "switched application context");
            }
            Ok(ctx)
        }
        None => Err(ContextError::Unexpected {
            expected: expected.to_string(),
            found: contexts.into_iter().map(|c| c.name).collect(),
        }),
    }
}
