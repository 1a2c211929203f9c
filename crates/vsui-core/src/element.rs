//! Shared UI element types for hierarchy-based automation.
//!
//! This module defines the snapshot of a single control as a driver reports
//! it. Elements form a tree via the `children` field; drivers return the
//! roots (top-level windows, dialogs and popups) of one application context.

use serde::{Deserialize, Serialize};

/// A UI control from the automated application's element hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct UiElement {
    /// The control type (e.g. "Window", "MenuItem", "Button", "Edit").
    #[serde(rename = "type", default)]
    pub element_type: Option<String>,

    /// The visible text of the control.
    #[serde(default)]
    pub text: Option<String>,

    /// The automation name of the control (e.g. `PART_Popup`).
    #[serde(default)]
    pub name: Option<String>,

    /// The automation identifier of the control.
    #[serde(default)]
    pub id: Option<String>,

    /// The native class name of the control.
    #[serde(default)]
    pub class_name: Option<String>,

    /// Whether the control accepts input.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Row index for table cells.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<u32>,

    /// Column index for table cells.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,

    /// Child controls nested within this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<UiElement>,
}

fn default_enabled() -> bool {
    true
}

impl UiElement {
    /// Creates an enabled element of the given type with no other attributes.
    pub fn new(element_type: impl Into<String>) -> Self {
        Self {
            element_type: Some(element_type.into()),
            enabled: true,
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn with_cell(mut self, row: u32, column: u32) -> Self {
        self.row = Some(row);
        self.column = Some(column);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_child(mut self, child: UiElement) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = UiElement>) -> Self {
        self.children.extend(children);
        self
    }

    /// Short human-readable description used in log and error messages.
    pub fn describe(&self) -> String {
        let kind = self.element_type.as_deref().unwrap_or("Element");
        match (&self.text, &self.name) {
            (Some(text), _) => format!("{} '{}'", kind, text),
            (None, Some(name)) => format!("{} [{}]", kind, name),
            (None, None) => kind.to_string(),
        }
    }

    /// Total number of elements in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(UiElement::subtree_len).sum::<usize>()
    }
}
