//! In-memory [`UiDriver`] backed by recorded element trees.
//!
//! [`MemoryDriver`] holds one element tree per application context and
//! records every gesture it receives. Reactions registered with
//! [`MemoryDriver::on_click`] mutate the trees when a matching element is
//! clicked, which is enough to script menus that open, dialogs that close,
//! and placeholders that disappear after a few attempts.
//!
//! Snapshots load from JSON:
//!
//! ```json
//! { "contexts": [ { "id": 1, "name": "devenv", "tree": [ { "type": "Window", "text": "..." } ] } ] }
//! ```

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::context::AppContext;
use crate::driver::{DriverError, UiDriver};
use crate::element::UiElement;
use crate::locator::ElementLocator;

/// A gesture received by a [`MemoryDriver`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DriverCall {
    Click { context: String, target: String },
    DoubleClick { context: String, target: String },
    TypeText { context: String, target: String, text: String },
    PressKeys { context: String, target: String, keys: String },
}

impl DriverCall {
    pub fn target(&self) -> &str {
        match self {
            DriverCall::Click { target, .. }
            | DriverCall::DoubleClick { target, .. }
            | DriverCall::TypeText { target, .. }
            | DriverCall::PressKeys { target, .. } => target,
        }
    }
}

/// Serialized form of one context in a snapshot file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSnapshot {
    #[serde(flatten)]
    pub context: AppContext,
    #[serde(default)]
    pub tree: Vec<UiElement>,
}

/// Serialized form of a whole [`MemoryDriver`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub contexts: Vec<ContextSnapshot>,
}

type ClickReaction = Arc<dyn Fn(&mut Vec<UiElement>) + Send + Sync>;

struct Reaction {
    context: String,
    locator: ElementLocator,
    apply: ClickReaction,
}

#[derive(Default)]
struct State {
    contexts: Vec<ContextSnapshot>,
    calls: Vec<DriverCall>,
    reactions: Vec<Reaction>,
}

impl State {
    fn tree_mut(&mut self, ctx: &AppContext) -> Result<&mut Vec<UiElement>, DriverError> {
        self.contexts
            .iter_mut()
            .find(|c| c.context.id == ctx.id)
            .map(|c| &mut c.tree)
            .ok_or_else(|| DriverError::ContextGone(ctx.name.clone()))
    }

    fn tree(&self, ctx: &AppContext) -> Result<&Vec<UiElement>, DriverError> {
        self.contexts
            .iter()
            .find(|c| c.context.id == ctx.id)
            .map(|c| &c.tree)
            .ok_or_else(|| DriverError::ContextGone(ctx.name.clone()))
    }

    /// Index path from the roots to the element `locator` addresses.
    fn locate(&self, ctx: &AppContext, locator: &ElementLocator) -> Result<Vec<usize>, DriverError> {
        let tree = self.tree(ctx)?;
        let target = locator
            .find_all(tree)
            .into_iter()
            .next()
            .ok_or_else(|| DriverError::ElementNotFound(locator.describe()))?;
        let mut path = Vec::new();
        if path_to(tree, target, &mut path) {
            Ok(path)
        } else {
            Err(DriverError::ElementNotFound(locator.describe()))
        }
    }

    /// Records `call` against the element `locator` addresses and returns
    /// the element's index path.
    fn gesture(&mut self, ctx: &AppContext, locator: &ElementLocator, call: DriverCall) -> Result<Vec<usize>, DriverError> {
        let path = self.locate(ctx, locator)?;
        debug!(context = %ctx, target = call.target(), "memory driver gesture");
        self.calls.push(call);
        Ok(path)
    }

    fn react(&mut self, ctx: &AppContext, locator: &ElementLocator) {
        let clicked: Vec<ClickReaction> = self
            .reactions
            .iter()
            .filter(|r| r.context == ctx.name && r.locator == *locator)
            .map(|r| r.apply.clone())
            .collect();
        if let Ok(tree) = self.tree_mut(ctx) {
            for apply in clicked {
                apply(tree);
            }
        }
    }
}

fn path_to(elements: &[UiElement], target: &UiElement, path: &mut Vec<usize>) -> bool {
    for (i, element) in elements.iter().enumerate() {
        path.push(i);
        if std::ptr::eq(element, target) || path_to(&element.children, target, path) {
            return true;
        }
        path.pop();
    }
    false
}

fn element_at<'a>(elements: &'a mut [UiElement], path: &[usize]) -> Option<&'a mut UiElement> {
    let (first, rest) = path.split_first()?;
    let element = elements.get_mut(*first)?;
    if rest.is_empty() {
        Some(element)
    } else {
        element_at(&mut element.children, rest)
    }
}

/// Driver over in-memory element trees.
#[derive(Default)]
pub struct MemoryDriver {
    state: Mutex<State>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a driver from a parsed snapshot.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            state: Mutex::new(State {
                contexts: snapshot.contexts,
                ..State::default()
            }),
        }
    }

    pub fn from_snapshot_json(json: &str) -> Result<Self, DriverError> {
        Ok(Self::from_snapshot(serde_json::from_str(json)?))
    }

    pub fn load_snapshot(path: impl AsRef<Path>) -> Result<Self, DriverError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_snapshot_json(&json)
    }

    /// Adds a live context with its element tree.
    pub async fn add_context(&self, context: AppContext, tree: Vec<UiElement>) {
        self.state.lock().await.contexts.push(ContextSnapshot { context, tree });
    }

    /// Ends a context; later calls against it fail with [`DriverError::ContextGone`].
    pub async fn remove_context(&self, id: u64) {
        self.state.lock().await.contexts.retain(|c| c.context.id != id);
    }

    /// Applies `f` to the tree of context `ctx`.
    pub async fn update_tree<F>(&self, ctx: &AppContext, f: F) -> Result<(), DriverError>
    where
        F: FnOnce(&mut Vec<UiElement>),
    {
        let mut state = self.state.lock().await;
        f(state.tree_mut(ctx)?);
        Ok(())
    }

    /// Registers a reaction run whenever `locator` is clicked in a context
    /// named `context`.
    pub async fn on_click<F>(&self, context: &str, locator: ElementLocator, apply: F)
    where
        F: Fn(&mut Vec<UiElement>) + Send + Sync + 'static,
    {
        self.state.lock().await.reactions.push(Reaction {
            context: context.to_string(),
            locator,
            apply: Arc::new(apply),
        });
    }

    /// Gestures received so far, oldest first.
    pub async fn calls(&self) -> Vec<DriverCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }

    /// Current trees as a snapshot.
    pub async fn snapshot(&self) -> Snapshot {
        Snapshot {
            contexts: self.state.lock().await.contexts.clone(),
        }
    }
}

#[async_trait]
impl UiDriver for MemoryDriver {
    async fn application_contexts(&self) -> Result<Vec<AppContext>, DriverError> {
        Ok(self
            .state
            .lock()
            .await
            .contexts
            .iter()
            .map(|c| c.context.clone())
            .collect())
    }

    async fn dump_tree(&self, ctx: &AppContext) -> Result<Vec<UiElement>, DriverError> {
        self.state.lock().await.tree(ctx).cloned()
    }

    async fn click(&self, ctx: &AppContext, locator: &ElementLocator) -> Result<(), DriverError> {
        let call = DriverCall::Click {
            context: ctx.name.clone(),
            target: locator.describe(),
        };
        let mut state = self.state.lock().await;
        state.gesture(ctx, locator, call)?;
        state.react(ctx, locator);
        Ok(())
    }

    /// Recorded as one gesture; click reactions run once.
    async fn double_click(&self, ctx: &AppContext, locator: &ElementLocator) -> Result<(), DriverError> {
        let call = DriverCall::DoubleClick {
            context: ctx.name.clone(),
            target: locator.describe(),
        };
        let mut state = self.state.lock().await;
        state.gesture(ctx, locator, call)?;
        state.react(ctx, locator);
        Ok(())
    }

    /// Appends `text` to the target element's text.
    async fn type_text(
        &self,
        ctx: &AppContext,
        locator: &ElementLocator,
        text: &str,
    ) -> Result<(), DriverError> {
        let call = DriverCall::TypeText {
            context: ctx.name.clone(),
            target: locator.describe(),
            text: text.to_string(),
        };
        let mut state = self.state.lock().await;
        let path = state.gesture(ctx, locator, call)?;
        let element = element_at(state.tree_mut(ctx)?, &path)
            .ok_or_else(|| DriverError::ElementNotFound(locator.describe()))?;
        element.text.get_or_insert_with(String::new).push_str(text);
        Ok(())
    }

    async fn press_keys(
        &self,
        ctx: &AppContext,
        locator: &ElementLocator,
        keys: &str,
    ) -> Result<(), DriverError> {
        let call = DriverCall::PressKeys {
            context: ctx.name.clone(),
            target: locator.describe(),
            keys: keys.to_string(),
        };
        self.state.lock().await.gesture(ctx, locator, call)?;
        Ok(())
    }
}
