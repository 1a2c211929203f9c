//! Named locator tables loaded from JSON.
//!
//! Object maps are the static configuration scenarios use to address
//! controls by name. Each entry is a JSON object of match criteria; the
//! `container` field names another entry in the same map. References are
//! resolved once at load time into shared [`ElementLocator`]s, so a map that
//! loads successfully has no dangling or cyclic container chains.
//!
//! ```json
//! {
//!   "main_window": { "type": "Window", "text": { "wildcard": "*Microsoft Visual Studio" } },
//!   "menu_bar":    { "container": "main_window", "type": "MenuBar" },
//!   "tools_menu":  { "container": "menu_bar", "type": "MenuItem", "text": "Tools" },
//!   "yes_button":  { "type": "Button", "text": { "regex": "Yes|Ja" } }
//! }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::locator::{ElementLocator, LocatorError, TextMatch};

/// Errors that can occur while loading or querying an object map.
#[derive(Error, Debug)]
pub enum ObjectMapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("'{name}' refers to unknown container '{container}'")]
    UnknownContainer { name: String, container: String },

    #[error("container chain of '{name}' is cyclic")]
    Cycle { name: String },

    #[error("'{name}' sets only one of row/column")]
    IncompleteCell { name: String },

    #[error("invalid locator '{name}': {source}")]
    Locator {
        name: String,
        #[source]
        source: LocatorError,
    },

    #[error("no locator named '{0}'")]
    UnknownName(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawWildcard {
    wildcard: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRegex {
    regex: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawText {
    Exact(String),
    Wildcard(RawWildcard),
    Regex(RawRegex),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLocator {
    #[serde(default)]
    container: Option<String>,
    #[serde(rename = "type", default)]
    element_type: Option<String>,
    #[serde(default)]
    text: Option<RawText>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "class", default)]
    class_name: Option<String>,
    #[serde(default)]
    occurrence: Option<u32>,
    #[serde(default)]
    row: Option<u32>,
    #[serde(default)]
    column: Option<u32>,
}

/// A validated table of named locators.
#[derive(Debug, Clone, Default)]
pub struct ObjectMap {
    entries: BTreeMap<String, Arc<ElementLocator>>,
}

impl ObjectMap {
    /// Parses and resolves an object map from JSON text.
    pub fn from_json(json: &str) -> Result<Self, ObjectMapError> {
        let raw: BTreeMap<String, RawLocator> = serde_json::from_str(json)?;
        let mut entries = BTreeMap::new();
        for name in raw.keys() {
            let mut visiting = HashSet::new();
            resolve(name, &raw, &mut entries, &mut visiting)?;
        }
        tracing::debug!(entries = entries.len(), "object map loaded");
        Ok(Self { entries })
    }

    /// Reads and resolves an object map file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ObjectMapError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Looks up a locator by name.
    pub fn get(&self, name: &str) -> Result<Arc<ElementLocator>, ObjectMapError> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| ObjectMapError::UnknownName(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<ElementLocator>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Names of entries without container.
    pub fn roots(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, loc)| loc.container().is_none())
            .map(|(name, _)| name)
            .collect()
    }
}

fn resolve(
    name: &str,
    raw: &BTreeMap<String, RawLocator>,
    resolved: &mut BTreeMap<String, Arc<ElementLocator>>,
    visiting: &mut HashSet<String>,
) -> Result<Arc<ElementLocator>, ObjectMapError> {
    if let Some(done) = resolved.get(name) {
        return Ok(done.clone());
    }
    if !visiting.insert(name.to_string()) {
        return Err(ObjectMapError::Cycle { name: name.to_string() });
    }
    let entry = &raw[name];

    let mut builder = ElementLocator::builder();
    if let Some(container) = &entry.container {
        if !raw.contains_key(container) {
            return Err(ObjectMapError::UnknownContainer {
                name: name.to_string(),
                container: container.clone(),
            });
        }
        let parent = resolve(container, raw, resolved, visiting).map_err(|e| match e {
            ObjectMapError::Cycle { .. } => ObjectMapError::Cycle { name: name.to_string() },
            other => other,
        })?;
        builder = builder.container(parent);
    }
    if let Some(t) = &entry.element_type {
        builder = builder.element_type(t.clone());
    }
    match &entry.text {
        Some(RawText::Exact(s)) => builder = builder.text(TextMatch::exact(s.clone())),
        Some(RawText::Wildcard(RawWildcard { wildcard })) => {
            builder = builder.text(TextMatch::wildcard(wildcard.clone()))
        }
        Some(RawText::Regex(RawRegex { regex })) => builder = builder.text_pattern(regex.clone()),
        None => {}
    }
    if let Some(n) = &entry.name {
        builder = builder.name(n.clone());
    }
    if let Some(id) = &entry.id {
        builder = builder.id(id.clone());
    }
    if let Some(c) = &entry.class_name {
        builder = builder.class_name(c.clone());
    }
    match (entry.row, entry.column) {
        (Some(row), Some(column)) => builder = builder.cell(row, column),
        (None, None) => {}
        _ => return Err(ObjectMapError::IncompleteCell { name: name.to_string() }),
    }
    if let Some(n) = entry.occurrence {
        builder = builder.occurrence(n);
    }

    let locator = Arc::new(builder.build().map_err(|source| ObjectMapError::Locator {
        name: name.to_string(),
        source,
    })?);
    visiting.remove(name);
    resolved.insert(name.to_string(), locator.clone());
    Ok(locator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::UiElement;

    const MAP: &str = r#"{
        "main_window": { "type": "Window", "text": { "wildcard": "*Microsoft Visual Studio" } },
        "menu_bar": { "container": "main_window", "type": "MenuBar" },
        "tools_menu": { "container": "menu_bar", "type": "MenuItem", "text": "Tools" },
        "popup": { "id": "", "name": "PART_Popup", "type": "Popup" },
        "yes_button": { "type": "Button", "text": { "regex": "Yes|Ja" } }
    }"#;

    #[test]
    fn loads_and_resolves_containers() {
        let map = ObjectMap::from_json(MAP).unwrap();
        assert_eq!(map.len(), 5);
        let tools = map.get("tools_menu").unwrap();
        assert_eq!(tools.depth(), 2);
        // Shared, not copied.
        assert!(Arc::ptr_eq(tools.container().unwrap(), &map.get("menu_bar").unwrap()));
    }

    #[test]
    fn roots_have_no_container() {
        let map = ObjectMap::from_json(MAP).unwrap();
        assert_eq!(map.roots(), vec!["main_window", "popup", "yes_button"]);
    }

    #[test]
    fn regex_text_entry_matches() {
        let map = ObjectMap::from_json(MAP).unwrap();
        let tree = vec![UiElement::new("Button").with_text("Ja")];
        assert!(map.get("yes_button").unwrap().find_in(&tree).is_some());
    }

    #[test]
    fn unknown_container_rejected() {
        let err = ObjectMap::from_json(r#"{ "a": { "container": "missing", "type": "Button" } }"#)
            .unwrap_err();
        assert!(matches!(err, ObjectMapError::UnknownContainer { ref container, .. } if container == "missing"));
    }

    #[test]
    fn cyclic_chain_rejected() {
        let err = ObjectMap::from_json(
            r#"{ "a": { "container": "b", "type": "X" }, "b": { "container": "a", "type": "Y" } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ObjectMapError::Cycle { .. }));
    }

    #[test]
    fn self_container_rejected() {
        let err = ObjectMap::from_json(r#"{ "a": { "container": "a", "type": "X" } }"#).unwrap_err();
        assert!(matches!(err, ObjectMapError::Cycle { ref name } if name == "a"));
    }

    #[test]
    fn empty_entry_rejected() {
        let err = ObjectMap::from_json(r#"{ "a": {} }"#).unwrap_err();
        assert!(matches!(err, ObjectMapError::Locator { source: LocatorError::Empty, .. }));
    }

    #[test]
    fn unknown_field_rejected() {
        let err = ObjectMap::from_json(r#"{ "a": { "type": "X", "leftObject": "b" } }"#).unwrap_err();
        assert!(matches!(err, ObjectMapError::Json(_)));
    }

    #[test]
    fn ambiguous_text_rejected() {
        let both = r#"{ "a": { "type": "Label", "text": { "wildcard": "a*", "regex": "b" } } }"#;
        assert!(matches!(ObjectMap::from_json(both), Err(ObjectMapError::Json(_))));
        let typo = r#"{ "a": { "type": "Label", "text": { "wildcard": "a*", "caseSensitive": false } } }"#;
        assert!(matches!(ObjectMap::from_json(typo), Err(ObjectMapError::Json(_))));
    }

    #[test]
    fn half_cell_rejected() {
        let err = ObjectMap::from_json(r#"{ "a": { "type": "TableCell", "row": 1 } }"#).unwrap_err();
        assert!(matches!(err, ObjectMapError::IncompleteCell { .. }));
    }

    #[test]
    fn unknown_name_lookup() {
        let map = ObjectMap::from_json(MAP).unwrap();
        assert!(matches!(map.get("nope"), Err(ObjectMapError::UnknownName(_))));
        assert!(map.contains("popup"));
    }
}
