//! One control group bound to one chat input.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::controls::Controls;
use super::ui::{Preview, UiSurface};
use crate::api::{OptimizeOptions, Optimizer};
use crate::config::InjectContext;
use crate::dom::{ElementId, PageDom};
use crate::history::HistoryItem;
use crate::prompts::set_selected;
use crate::rpc::ConfigClient;
use crate::sites::SiteAdapter;

/// Shown when the optimize control is used on an empty input.
pub const EMPTY_INPUT_MESSAGE: &str = "Please enter a prompt to optimize";
/// Shown when no API key is configured.
pub const MISSING_KEY_MESSAGE: &str = "Please configure an API key first";
/// Shown when the template control is used with no templates saved.
pub const NO_TEMPLATES_MESSAGE: &str = "No saved templates";
/// Shown when a requested template does not exist.
pub const TEMPLATE_NOT_FOUND_MESSAGE: &str = "Template not found";
/// Shown when the optimized text could not be written back.
pub const WRITE_FAILED_MESSAGE: &str = "Failed to replace the input text";

/// A user action on the control group, as routed by the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlAction {
    /// The optimize button was clicked.
    Optimize,
    /// The user dismissed a running optimization.
    Cancel,
    /// A template was picked (`None` inserts the first one).
    InsertTemplate(Option<String>),
    /// The strategy selector changed.
    SelectStrategy(String),
}

struct InFlight {
    run: u64,
    token: CancellationToken,
}

struct InstanceState {
    context: InjectContext,
    controls: Controls,
    in_flight: Option<InFlight>,
    next_run: u64,
    disposed: bool,
}

/// Binds an input element to its control group and runs optimizations.
///
/// At most one optimization is live per instance: starting a new one
/// cancels the previous run, whose result is then discarded without
/// touching the page.
pub struct InjectionInstance {
    dom: Arc<dyn PageDom>,
    adapter: SiteAdapter,
    input: ElementId,
    optimizer: Optimizer,
    rpc: ConfigClient,
    ui: Arc<dyn UiSurface>,
    options: OptimizeOptions,
    state: Mutex<InstanceState>,
}

impl InjectionInstance {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        dom: Arc<dyn PageDom>,
        adapter: SiteAdapter,
        input: ElementId,
        controls: Controls,
        context: InjectContext,
        optimizer: Optimizer,
        rpc: ConfigClient,
        ui: Arc<dyn UiSurface>,
        options: OptimizeOptions,
    ) -> Self {
        Self {
            dom,
            adapter,
            input,
            optimizer,
            rpc,
            ui,
            options,
            state: Mutex::new(InstanceState {
                context,
                controls,
                in_flight: None,
                next_run: 0,
                disposed: false,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, InstanceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The bound input element.
    pub fn input(&self) -> ElementId {
        self.input
    }

    /// Handles to the control group.
    pub fn controls(&self) -> Controls {
        self.state().controls
    }

    /// Current configuration snapshot.
    pub fn context(&self) -> InjectContext {
        self.state().context.clone()
    }

    /// Whether an optimization is running.
    pub fn is_busy(&self) -> bool {
        self.state().in_flight.is_some()
    }

    /// Whether both the input and the control group are still in the page.
    pub fn is_intact(&self) -> bool {
        let controls = self.state().controls;
        self.dom.is_connected(self.input) && controls.is_attached(self.dom.as_ref())
    }

    /// Routes a control action to the matching operation.
    pub async fn handle(&self, action: ControlAction) {
        match action {
            ControlAction::Optimize => self.optimize().await,
            ControlAction::Cancel => self.cancel(),
            ControlAction::InsertTemplate(id) => {
                self.insert_template(id.as_deref());
            }
            ControlAction::SelectStrategy(id) => self.select_strategy(&id).await,
        }
    }

    /// Rewrites the input's current text with the selected strategy.
    pub async fn optimize(&self) {
        let text = self.adapter.value_of(self.input);
        if text.trim().is_empty() {
            self.ui.error(EMPTY_INPUT_MESSAGE);
            return;
        }

        let (run, token, context) = {
            let mut state = self.state();
            if state.disposed {
                return;
            }
            if state.context.provider.api_key.trim().is_empty() {
                drop(state);
                self.ui.error(MISSING_KEY_MESSAGE);
                return;
            }
            if let Some(previous) = state.in_flight.take() {
                debug!(run = previous.run, "Cancelling superseded optimization");
                previous.token.cancel();
            }
            let run = state.next_run;
            state.next_run += 1;
            let token = CancellationToken::new();
            state.in_flight = Some(InFlight {
                run,
                token: token.clone(),
            });
            (run, token, state.context.clone())
        };

        self.ui.busy(true);
        let result = self
            .optimizer
            .optimize(
                &text,
                &context.provider,
                &context.prompts,
                &self.options,
                &token,
            )
            .await;

        let written = {
            let mut state = self.state();
            let latest = state.in_flight.as_ref().is_some_and(|f| f.run == run);
            if latest {
                state.in_flight = None;
            }
            if !latest || state.disposed || token.is_cancelled() {
                debug!(run, "Discarding result of superseded optimization");
                return;
            }
            // Written under the lock so `dispose` cannot interleave.
            match result.optimized_text.as_deref() {
                Some(optimized) if result.success && context.skip_preview => {
                    Some(self.adapter.write_to(self.input, optimized))
                }
                _ => None,
            }
        };

        let Some(optimized) = result.optimized_text.filter(|_| result.success) else {
            let message = result
                .error_message
                .as_deref()
                .unwrap_or("Optimization failed");
            self.ui.error(message);
            self.ui.busy(false);
            return;
        };

        info!(run, chars = optimized.chars().count(), "Optimization succeeded");
        match written {
            Some(true) => {}
            Some(false) => self.ui.error(WRITE_FAILED_MESSAGE),
            None => self.ui.preview(Preview::new(
                text.clone(),
                optimized.clone(),
                self.adapter.clone(),
                self.input,
            )),
        }
        self.ui.busy(false);

        self.record_history(&text, &optimized).await;
    }

    async fn record_history(&self, original: &str, optimized: &str) {
        let item = HistoryItem::now(original, optimized, &self.adapter.descriptor().site_id);
        if let Err(e) = self.rpc.record_history(item).await {
            warn!(error = %e, "Failed to record optimization history");
        }
    }

    /// Aborts the running optimization without showing an error.
    pub fn cancel(&self) {
        let in_flight = self.state().in_flight.take();
        if let Some(flight) = in_flight {
            debug!(run = flight.run, "Optimization cancelled by user");
            flight.token.cancel();
            self.ui.busy(false);
        }
    }

    /// Inserts a saved template at the end of the input.
    ///
    /// Returns whether text was inserted.
    pub fn insert_template(&self, template_id: Option<&str>) -> bool {
        let templates = self.state().context.templates.clone();
        if templates.is_empty() {
            self.ui.error(NO_TEMPLATES_MESSAGE);
            return false;
        }

        let template = match template_id {
            Some(id) => templates.iter().find(|t| t.id == id),
            None => templates.first(),
        };
        let Some(template) = template else {
            self.ui.error(TEMPLATE_NOT_FOUND_MESSAGE);
            return false;
        };

        self.adapter.insert_into(self.input, &template.insertion_text())
    }

    /// Persists a new strategy selection and updates the local snapshot.
    pub async fn select_strategy(&self, strategy_id: &str) {
        {
            let mut state = self.state();
            state.context.prompts = set_selected(&state.context.prompts, strategy_id);
        }
        if let Err(e) = self.rpc.select_strategy(strategy_id).await {
            warn!(error = %e, strategy_id, "Failed to persist strategy selection");
        }
    }

    /// Replaces the configuration snapshot and rebuilds the selector.
    ///
    /// The input element is never touched.
    pub fn update_config(&self, context: InjectContext) {
        let mut state = self.state();
        if state.disposed {
            return;
        }
        let mut controls = state.controls;
        if let Err(e) = controls.replace_selector(self.dom.as_ref(), &context.prompts) {
            debug!(error = %e, "Failed to rebuild strategy selector");
        }
        state.controls = controls;
        state.context = context;
    }

    /// Cancels any running optimization and removes the control group.
    pub fn dispose(&self) {
        let (in_flight, controls) = {
            let mut state = self.state();
            state.disposed = true;
            (state.in_flight.take(), state.controls)
        };
        if let Some(flight) = in_flight {
            flight.token.cancel();
        }
        controls.remove(self.dom.as_ref());
    }
}
