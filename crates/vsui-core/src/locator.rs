//! Structured element locators.
//!
//! An [`ElementLocator`] is an immutable set of match criteria that
//! addresses one control in an application's element tree. Locators can name
//! another locator as their container; matching then only considers
//! descendants of the container's matches. Container chains form a tree
//! rooted at top-level locators (windows, dialogs, popups) that have no
//! container of their own.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use vsui_core::locator::{ElementLocator, TextMatch};
//!
//! let main_window = Arc::new(
//!     ElementLocator::builder()
//!         .element_type("Window")
//!         .text(TextMatch::wildcard("*Microsoft Visual Studio"))
//!         .build()
//!         .unwrap(),
//! );
//! let menu_bar = Arc::new(
//!     ElementLocator::builder()
//!         .container(main_window)
//!         .element_type("MenuBar")
//!         .build()
//!         .unwrap(),
//! );
//! let tools = ElementLocator::builder()
//!     .container(menu_bar)
//!     .element_type("MenuItem")
//!     .text("Tools")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(tools.depth(), 2);
//! ```

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use thiserror::Error;

use crate::element::UiElement;

/// Errors raised while constructing a locator.
#[derive(Error, Debug)]
pub enum LocatorError {
    /// The locator carries no match criteria and would match anything.
    #[error("locator has no match criteria")]
    Empty,

    /// Occurrences are 1-based.
    #[error("occurrence must be at least 1")]
    ZeroOccurrence,

    /// A regular-expression text pattern failed to compile.
    #[error("invalid text pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// How an element's text is compared against a locator.
#[derive(Debug, Clone)]
pub enum TextMatch {
    /// Text must equal the string exactly.
    Exact(String),
    /// `*` matches any run of characters, `?` exactly one.
    Wildcard(String),
    /// Text must match the whole regular expression.
    Pattern(Regex),
}

impl TextMatch {
    pub fn exact(text: impl Into<String>) -> Self {
        TextMatch::Exact(text.into())
    }

    pub fn wildcard(pattern: impl Into<String>) -> Self {
        TextMatch::Wildcard(pattern.into())
    }

    /// Compiles a regular expression anchored at both ends.
    pub fn pattern(pattern: &str) -> Result<Self, LocatorError> {
        Regex::new(&format!("^(?:{})$", pattern))
            .map(TextMatch::Pattern)
            .map_err(|source| LocatorError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    /// The source string of the match, without anchors for patterns.
    pub fn as_str(&self) -> &str {
        match self {
            TextMatch::Exact(s) | TextMatch::Wildcard(s) => s,
            TextMatch::Pattern(re) => {
                let src = re.as_str();
                src.strip_prefix("^(?:")
                    .and_then(|s| s.strip_suffix(")$"))
                    .unwrap_or(src)
            }
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        match self {
            TextMatch::Exact(s) => s == text,
            TextMatch::Wildcard(p) => glob_match(p, text),
            TextMatch::Pattern(re) => re.is_match(text),
        }
    }
}

impl PartialEq for TextMatch {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TextMatch::Exact(a), TextMatch::Exact(b)) => a == b,
            (TextMatch::Wildcard(a), TextMatch::Wildcard(b)) => a == b,
            (TextMatch::Pattern(a), TextMatch::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl From<&str> for TextMatch {
    fn from(text: &str) -> Self {
        TextMatch::Exact(text.to_string())
    }
}

impl From<String> for TextMatch {
    fn from(text: String) -> Self {
        TextMatch::Exact(text)
    }
}

impl fmt::Display for TextMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextMatch::Exact(s) => write!(f, "text='{}'", s),
            TextMatch::Wildcard(s) => write!(f, "text~'{}'", s),
            TextMatch::Pattern(_) => write!(f, "text=/{}/", self.as_str()),
        }
    }
}

/// Matches a string against a glob pattern with `*` (any chars) and `?` (single char).
///
/// When the pattern has no wildcards, falls back to exact equality.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    if !pattern.contains('*') && !pattern.contains('?') {
        return pattern == text;
    }

    let pat: Vec<char> = pattern.chars().collect();
    let txt: Vec<char> = text.chars().collect();
    let (plen, tlen) = (pat.len(), txt.len());

    // dp[i][j] = pattern[..i] matches text[..j]
    let mut dp = vec![vec![false; tlen + 1]; plen + 1];
    dp[0][0] = true;

    for i in 1..=plen {
        if pat[i - 1] == '*' {
            dp[i][0] = dp[i - 1][0];
        }
    }

    for i in 1..=plen {
        for j in 1..=tlen {
            if pat[i - 1] == '*' {
                dp[i][j] = dp[i - 1][j] || dp[i][j - 1];
            } else if pat[i - 1] == '?' || pat[i - 1] == txt[j - 1] {
                dp[i][j] = dp[i - 1][j - 1];
            }
        }
    }

    dp[plen][tlen]
}

/// A single match criterion. A locator matches an element when all of its
/// criteria match.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    Type(String),
    Text(TextMatch),
    Name(String),
    Id(String),
    ClassName(String),
    /// Table cell position.
    Cell { row: u32, column: u32 },
}

impl Criterion {
    /// Attributes missing on the element compare as the empty string, so
    /// `Id("")` matches an element without identifier.
    pub fn matches(&self, element: &UiElement) -> bool {
        fn attr(value: &Option<String>) -> &str {
            value.as_deref().unwrap_or("")
        }
        match self {
            Criterion::Type(t) => attr(&element.element_type) == t,
            Criterion::Text(m) => m.matches(attr(&element.text)),
            Criterion::Name(n) => attr(&element.name) == n,
            Criterion::Id(id) => attr(&element.id) == id,
            Criterion::ClassName(c) => attr(&element.class_name) == c,
            Criterion::Cell { row, column } => {
                element.row == Some(*row) && element.column == Some(*column)
            }
        }
    }

    fn same_kind(&self, other: &Criterion) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criterion::Type(t) => write!(f, "type='{}'", t),
            Criterion::Text(m) => write!(f, "{}", m),
            Criterion::Name(n) => write!(f, "name='{}'", n),
            Criterion::Id(id) => write!(f, "id='{}'", id),
            Criterion::ClassName(c) => write!(f, "class='{}'", c),
            Criterion::Cell { row, column } => write!(f, "cell=({},{})", row, column),
        }
    }
}

/// Immutable description of how to find one UI element.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementLocator {
    container: Option<Arc<ElementLocator>>,
    criteria: Vec<Criterion>,
    occurrence: Option<u32>,
}

/// Builder for [`ElementLocator`]; validation happens in [`build`](LocatorBuilder::build).
#[derive(Debug, Default, Clone)]
pub struct LocatorBuilder {
    container: Option<Arc<ElementLocator>>,
    criteria: Vec<Criterion>,
    occurrence: Option<u32>,
    pattern: Option<String>,
}

impl LocatorBuilder {
    pub fn container(mut self, container: Arc<ElementLocator>) -> Self {
        self.container = Some(container);
        self
    }

    pub fn element_type(self, element_type: impl Into<String>) -> Self {
        self.criterion(Criterion::Type(element_type.into()))
    }

    pub fn text(mut self, text: impl Into<TextMatch>) -> Self {
        self.pattern = None;
        self.criterion(Criterion::Text(text.into()))
    }

    /// Regular-expression text match, compiled in [`build`](Self::build).
    pub fn text_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.criteria.retain(|c| !matches!(c, Criterion::Text(_)));
        self.pattern = Some(pattern.into());
        self
    }

    pub fn name(self, name: impl Into<String>) -> Self {
        self.criterion(Criterion::Name(name.into()))
    }

    pub fn id(self, id: impl Into<String>) -> Self {
        self.criterion(Criterion::Id(id.into()))
    }

    pub fn class_name(self, class_name: impl Into<String>) -> Self {
        self.criterion(Criterion::ClassName(class_name.into()))
    }

    pub fn cell(self, row: u32, column: u32) -> Self {
        self.criterion(Criterion::Cell { row, column })
    }

    /// Selects the n-th match (1-based) in document order.
    pub fn occurrence(mut self, occurrence: u32) -> Self {
        self.occurrence = Some(occurrence);
        self
    }

    /// Adds a criterion, replacing any earlier criterion of the same kind.
    pub fn criterion(mut self, criterion: Criterion) -> Self {
        if matches!(criterion, Criterion::Text(_)) {
            self.pattern = None;
        }
        self.criteria.retain(|c| !c.same_kind(&criterion));
        self.criteria.push(criterion);
        self
    }

    pub fn build(mut self) -> Result<ElementLocator, LocatorError> {
        if let Some(pattern) = self.pattern.take() {
            self.criteria.push(Criterion::Text(TextMatch::pattern(&pattern)?));
        }
        if self.criteria.is_empty() {
            return Err(LocatorError::Empty);
        }
        if self.occurrence == Some(0) {
            return Err(LocatorError::ZeroOccurrence);
        }
        Ok(ElementLocator {
            container: self.container,
            criteria: self.criteria,
            occurrence: self.occurrence,
        })
    }
}

impl ElementLocator {
    pub fn builder() -> LocatorBuilder {
        LocatorBuilder::default()
    }

    /// Starts a builder pre-filled with this locator's fields, for merging
    /// extra criteria into a mapped locator.
    pub fn to_builder(&self) -> LocatorBuilder {
        LocatorBuilder {
            container: self.container.clone(),
            criteria: self.criteria.clone(),
            occurrence: self.occurrence,
            pattern: None,
        }
    }

    pub fn container(&self) -> Option<&Arc<ElementLocator>> {
        self.container.as_ref()
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    pub fn occurrence(&self) -> Option<u32> {
        self.occurrence
    }

    /// Returns a copy selecting the n-th match.
    pub fn with_occurrence(&self, occurrence: u32) -> Result<Self, LocatorError> {
        self.to_builder().occurrence(occurrence).build()
    }

    /// Returns a copy with the text criterion replaced.
    pub fn with_text(&self, text: impl Into<TextMatch>) -> Self {
        let mut copy = self.clone();
        let criterion = Criterion::Text(text.into());
        copy.criteria.retain(|c| !c.same_kind(&criterion));
        copy.criteria.push(criterion);
        copy
    }

    /// Returns a copy scoped to a different container.
    pub fn within(&self, container: Arc<ElementLocator>) -> Self {
        Self {
            container: Some(container),
            ..self.clone()
        }
    }

    /// Number of containers above this locator.
    pub fn depth(&self) -> usize {
        self.chain().len() - 1
    }

    /// The top-level locator this chain terminates at.
    pub fn root(&self) -> &ElementLocator {
        let mut current = self;
        while let Some(parent) = current.container.as_deref() {
            current = parent;
        }
        current
    }

    /// Locators from the root down to `self`.
    pub fn chain(&self) -> Vec<&ElementLocator> {
        let mut chain = vec![self];
        let mut current = self;
        while let Some(parent) = current.container.as_deref() {
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        chain
    }

    /// Whether `element` satisfies this locator's own criteria, ignoring the
    /// container and occurrence.
    pub fn matches(&self, element: &UiElement) -> bool {
        self.criteria.iter().all(|c| c.matches(element))
    }

    /// Finds every element this locator addresses, in document order.
    ///
    /// Without a container the whole forest is searched. With a container,
    /// only strict descendants of the container's matches are considered.
    /// An occurrence narrows the result to at most one element.
    pub fn find_all<'a>(&self, roots: &'a [UiElement]) -> Vec<&'a UiElement> {
        let mut matches: Vec<&'a UiElement> = Vec::new();
        match &self.container {
            None => collect_matching(roots, self, &mut matches),
            Some(container) => {
                for scope in container.find_all(roots) {
                    collect_matching(&scope.children, self, &mut matches);
                }
                dedup_by_address(&mut matches);
            }
        }
        match self.occurrence {
            Some(n) => matches.into_iter().nth(n as usize - 1).into_iter().collect(),
            None => matches,
        }
    }

    /// Finds the first element this locator addresses.
    pub fn find_in(&self, roots: &[UiElement]) -> Option<UiElement> {
        self.find_all(roots).first().map(|el| (*el).clone())
    }

    /// Human-readable description of the whole chain, innermost first.
    pub fn describe(&self) -> String {
        self.chain()
            .iter()
            .rev()
            .map(|loc| loc.describe_own())
            .collect::<Vec<_>>()
            .join(" in ")
    }

    fn describe_own(&self) -> String {
        let mut parts: Vec<String> = self.criteria.iter().map(Criterion::to_string).collect();
        if let Some(n) = self.occurrence {
            parts.push(format!("occurrence={}", n));
        }
        format!("{{{}}}", parts.join(" "))
    }
}

impl fmt::Display for ElementLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

fn collect_matching<'a>(
    elements: &'a [UiElement],
    locator: &ElementLocator,
    out: &mut Vec<&'a UiElement>,
) {
    for element in elements {
        if locator.matches(element) {
            out.push(element);
        }
        collect_matching(&element.children, locator, out);
    }
}

// Nested container matches can yield the same descendant twice.
fn dedup_by_address(elements: &mut Vec<&UiElement>) {
    let mut seen: Vec<*const UiElement> = Vec::with_capacity(elements.len());
    elements.retain(|el| {
        let ptr = *el as *const UiElement;
        if seen.contains(&ptr) {
            false
        } else {
            seen.push(ptr);
            true
        }
    });
}
