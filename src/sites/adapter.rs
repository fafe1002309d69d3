//! Uniform read/write access to a site's chat input.

use std::sync::Arc;

use tracing::debug;

use super::{InputKind, SiteDescriptor};
use crate::dom::{is_text_input, DomError, ElementId, PageDom};

/// Events dispatched after a programmatic write so page frameworks notice.
const WRITE_EVENTS: [&str; 2] = ["input", "change"];

/// Reads and writes the chat input of one site.
///
/// DOM failures never escape: reads fall back to an empty string and writes
/// report `false`.
#[derive(Clone)]
pub struct SiteAdapter {
    descriptor: SiteDescriptor,
    dom: Arc<dyn PageDom>,
}

impl SiteAdapter {
    /// Binds a descriptor to a page.
    pub fn new(descriptor: SiteDescriptor, dom: Arc<dyn PageDom>) -> Self {
        Self { descriptor, dom }
    }

    /// The site this adapter serves.
    pub fn descriptor(&self) -> &SiteDescriptor {
        &self.descriptor
    }

    /// First element matching the input selector that accepts text.
    pub fn find_input(&self) -> Option<ElementId> {
        let candidates = self
            .dom
            .query_all(&self.descriptor.input_selector)
            .map_err(|e| debug!(error = %e, site_id = %self.descriptor.site_id, "Input query failed"))
            .ok()?;
        candidates
            .into_iter()
            .find(|el| is_text_input(self.dom.as_ref(), *el).unwrap_or(false))
    }

    /// Whether the chat input is currently present.
    pub fn is_available(&self) -> bool {
        self.find_input().is_some()
    }

    /// Current text of the chat input, or `""`.
    pub fn value(&self) -> String {
        self.find_input()
            .map(|el| self.value_of(el))
            .unwrap_or_default()
    }

    /// Replaces the chat input's text.
    pub fn set_value(&self, text: &str) -> bool {
        self.find_input().is_some_and(|el| self.write_to(el, text))
    }

    /// Appends `text` to the chat input.
    pub fn insert_text(&self, text: &str) -> bool {
        self.find_input().is_some_and(|el| self.insert_into(el, text))
    }

    /// Text of a specific input element, or `""`.
    pub fn value_of(&self, element: ElementId) -> String {
        self.read(element).unwrap_or_else(|e| {
            debug!(error = %e, "Failed to read input value");
            String::new()
        })
    }

    /// Writes `text` into a specific input element and notifies the page.
    pub fn write_to(&self, element: ElementId, text: &str) -> bool {
        match self.write(element, text) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "Failed to write input value");
                false
            }
        }
    }

    /// Appends `text` to a specific input element.
    pub fn insert_into(&self, element: ElementId, text: &str) -> bool {
        match self.read(element) {
            Ok(current) => self.write_to(element, &format!("{current}{text}")),
            Err(e) => {
                debug!(error = %e, "Failed to read input before insertion");
                false
            }
        }
    }

    fn read(&self, element: ElementId) -> Result<String, DomError> {
        match self.descriptor.input_kind {
            InputKind::Textarea => self.dom.value(element),
            InputKind::ContentEditable => self.dom.text_content(element),
        }
    }

    fn write(&self, element: ElementId, text: &str) -> Result<(), DomError> {
        match self.descriptor.input_kind {
            InputKind::Textarea => self.dom.set_value(element, text)?,
            InputKind::ContentEditable => self.dom.set_text_content(element, text)?,
        }
        for event in WRITE_EVENTS {
            self.dom.dispatch_event(element, event)?;
        }
        Ok(())
    }
}
