//! DOM injection: attaches the optimize controls to a chat page and wires
//! them to the optimization pipeline.

pub mod controls;
pub mod instance;
pub mod session;
pub mod ui;

pub use controls::{Controls, CONTAINER_CLASS, CONTAINER_SELECTOR};
pub use instance::{ControlAction, InjectionInstance};
pub use session::{InjectorSession, SETTLE_DELAY};
pub use ui::{Preview, RecordingUi, UiEvent, UiSurface};
