//! Outbound UI callbacks: toasts, busy state and the result preview.

use std::sync::{Mutex, PoisonError};

use crate::dom::ElementId;
use crate::sites::SiteAdapter;

/// Surface the host renders feedback on.
pub trait UiSurface: Send + Sync {
    /// Shows an error message.
    fn error(&self, message: &str);

    /// Toggles the optimize control's loading state.
    fn busy(&self, busy: bool);

    /// Offers an optimized prompt for review.
    fn preview(&self, preview: Preview);
}

/// An optimized prompt awaiting the user's decision.
pub struct Preview {
    original_text: String,
    optimized_text: String,
    adapter: SiteAdapter,
    input: ElementId,
}

impl Preview {
    pub(crate) fn new(
        original_text: String,
        optimized_text: String,
        adapter: SiteAdapter,
        input: ElementId,
    ) -> Self {
        Self {
            original_text,
            optimized_text,
            adapter,
            input,
        }
    }

    /// Text the user wrote.
    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    /// Text the provider returned.
    pub fn optimized_text(&self) -> &str {
        &self.optimized_text
    }

    /// Writes the optimized text into the input; `false` if the input is gone.
    pub fn apply(&self) -> bool {
        self.adapter.write_to(self.input, &self.optimized_text)
    }

    /// Writes caller-edited text into the input instead.
    pub fn apply_edited(&self, text: &str) -> bool {
        self.adapter.write_to(self.input, text)
    }
}

impl std::fmt::Debug for Preview {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preview")
            .field("original_text", &self.original_text)
            .field("optimized_text", &self.optimized_text)
            .field("input", &self.input)
            .finish()
    }
}

/// One callback received by a [`RecordingUi`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UiEvent {
    /// [`UiSurface::error`]
    Error(String),
    /// [`UiSurface::busy`]
    Busy(bool),
    /// [`UiSurface::preview`], with the optimized text.
    Preview(String),
}

/// A [`UiSurface`] that records every callback and keeps previews.
#[derive(Debug, Default)]
pub struct RecordingUi {
    events: Mutex<Vec<UiEvent>>,
    previews: Mutex<Vec<Preview>>,
}

impl RecordingUi {
    /// Callbacks received so far.
    pub fn events(&self) -> Vec<UiEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Error messages received so far.
    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::Error(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    /// Removes and returns the oldest pending preview.
    pub fn take_preview(&self) -> Option<Preview> {
        let mut previews = self.previews.lock().unwrap_or_else(PoisonError::into_inner);
        if previews.is_empty() {
            None
        } else {
            Some(previews.remove(0))
        }
    }

    fn push(&self, event: UiEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl UiSurface for RecordingUi {
    fn error(&self, message: &str) {
        self.push(UiEvent::Error(message.to_string()));
    }

    fn busy(&self, busy: bool) {
        self.push(UiEvent::Busy(busy));
    }

    fn preview(&self, preview: Preview) {
        self.push(UiEvent::Preview(preview.optimized_text.clone()));
        self.previews
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(preview);
    }
}
