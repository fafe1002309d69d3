//! The page DOM seam.
//!
//! The injector never touches a browser directly: it talks to a
//! [`PageDom`] implementation supplied by the embedding. [`MemoryDom`] is
//! an in-process tree used by tests.

pub mod memory;
pub mod selector;

use thiserror::Error;

pub use memory::MemoryDom;
pub use selector::parse_selector;

/// Opaque handle to a node owned by a [`PageDom`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u64);

/// Errors raised by DOM operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    /// The handle refers to a node that no longer exists.
    #[error("element {0:?} is no longer in the document")]
    Detached(ElementId),

    /// A selector could not be parsed.
    #[error("invalid selector {0}")]
    InvalidSelector(String),

    /// The operation is not supported on this node.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Failure reported by the embedding.
    #[error("{0}")]
    Host(String),
}

/// Description of a node to create.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ElementSpec {
    /// Lowercase tag name.
    pub tag: String,
    /// Attributes in insertion order (`class` included).
    pub attributes: Vec<(String, String)>,
    /// Initial text content.
    pub text: Option<String>,
}

impl ElementSpec {
    /// Starts a spec for `tag`.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            ..Default::default()
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Sets the `class` attribute.
    #[must_use]
    pub fn class(self, class: impl Into<String>) -> Self {
        self.attr("class", class)
    }

    /// Sets the text content.
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// Operations the injector needs from a live page.
///
/// All methods take `&self`; implementations synchronize internally.
pub trait PageDom: Send + Sync {
    /// Current document URL.
    fn current_url(&self) -> String;

    /// All elements matching `selector`, in document order.
    fn query_all(&self, selector: &str) -> Result<Vec<ElementId>, DomError>;

    /// First element matching `selector`.
    fn query_first(&self, selector: &str) -> Result<Option<ElementId>, DomError> {
        Ok(self.query_all(selector)?.into_iter().next())
    }

    /// Nearest inclusive ancestor of `element` matching `selector`.
    fn closest(&self, element: ElementId, selector: &str) -> Result<Option<ElementId>, DomError>;

    /// Parent element, if any.
    fn parent(&self, element: ElementId) -> Result<Option<ElementId>, DomError>;

    /// Direct children in order.
    fn children(&self, element: ElementId) -> Result<Vec<ElementId>, DomError>;

    /// Whether the handle still refers to a node in the document.
    fn is_connected(&self, element: ElementId) -> bool;

    /// Lowercase tag name.
    fn tag_name(&self, element: ElementId) -> Result<String, DomError>;

    /// Attribute value.
    fn attribute(&self, element: ElementId, name: &str) -> Result<Option<String>, DomError>;

    /// Sets an attribute.
    fn set_attribute(&self, element: ElementId, name: &str, value: &str) -> Result<(), DomError>;

    /// Whether the element is editable as rich text.
    fn is_content_editable(&self, element: ElementId) -> Result<bool, DomError>;

    /// The `value` property of form controls.
    fn value(&self, element: ElementId) -> Result<String, DomError>;

    /// Writes the `value` property of form controls.
    fn set_value(&self, element: ElementId, value: &str) -> Result<(), DomError>;

    /// Text content of the element and its descendants.
    fn text_content(&self, element: ElementId) -> Result<String, DomError>;

    /// Replaces the element's children with a single text node.
    fn set_text_content(&self, element: ElementId, text: &str) -> Result<(), DomError>;

    /// Dispatches a bubbling event of type `event`.
    fn dispatch_event(&self, element: ElementId, event: &str) -> Result<(), DomError>;

    /// Creates a detached element.
    fn create_element(&self, spec: &ElementSpec) -> Result<ElementId, DomError>;

    /// Appends `child` (detaching it first if needed) to `parent`.
    fn append_child(&self, parent: ElementId, child: ElementId) -> Result<(), DomError>;

    /// Swaps `old` for `new` inside `parent`.
    fn replace_child(
        &self,
        parent: ElementId,
        new: ElementId,
        old: ElementId,
    ) -> Result<(), DomError>;

    /// Removes the element and its subtree from the document.
    fn remove(&self, element: ElementId) -> Result<(), DomError>;

    /// Registers a stylesheet once under `id`.
    fn add_style_sheet(&self, id: &str, css: &str) -> Result<(), DomError>;
}

/// `<input>` types that accept free text.
pub const TEXT_INPUT_TYPES: &[&str] = &["text", "search", "url", "tel", "email", "password"];

/// Whether `element` accepts typed text: a textarea, a text-like input or
/// a contenteditable node.
pub fn is_text_input(dom: &dyn PageDom, element: ElementId) -> Result<bool, DomError> {
    match dom.tag_name(element)?.as_str() {
        "textarea" => Ok(true),
        "input" => {
            let kind = dom
                .attribute(element, "type")?
                .map(|t| t.to_ascii_lowercase())
                .unwrap_or_else(|| "text".to_string());
            Ok(TEXT_INPUT_TYPES.contains(&kind.as_str()))
        }
        _ => dom.is_content_editable(element),
    }
}
