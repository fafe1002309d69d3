//! Page-level lifecycle: locate the input, attach exactly one control
//! group, and follow SPA navigation and DOM churn.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::controls::{self, Controls, STYLES, STYLE_ID};
use super::instance::InjectionInstance;
use super::ui::UiSurface;
use crate::api::{OptimizeOptions, Optimizer};
use crate::config::InjectContext;
use crate::dom::PageDom;
use crate::rpc::ConfigClient;
use crate::sites::{resolve_for_url, SiteAdapter, SiteDescriptor};

/// Pause after a URL change before the page is scanned again.
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Owns all injector state for one page.
pub struct InjectorSession {
    dom: Arc<dyn PageDom>,
    optimizer: Optimizer,
    rpc: ConfigClient,
    ui: Arc<dyn UiSurface>,
    options: OptimizeOptions,
    descriptor: Option<SiteDescriptor>,
    context: InjectContext,
    instance: Option<Arc<InjectionInstance>>,
    last_url: String,
    styles_registered: bool,
    inert: bool,
}

impl InjectorSession {
    /// Creates an idle session; call [`start`](Self::start) to attach.
    pub fn new(
        dom: Arc<dyn PageDom>,
        optimizer: Optimizer,
        rpc: ConfigClient,
        ui: Arc<dyn UiSurface>,
    ) -> Self {
        Self {
            dom,
            optimizer,
            rpc,
            ui,
            options: OptimizeOptions::default(),
            descriptor: None,
            context: InjectContext::default(),
            instance: None,
            last_url: String::new(),
            styles_registered: false,
            inert: false,
        }
    }

    /// Overrides the per-optimization timeout and retry settings.
    #[must_use]
    pub fn with_options(mut self, options: OptimizeOptions) -> Self {
        self.options = options;
        self
    }

    /// The site this page matched, if any.
    pub fn descriptor(&self) -> Option<&SiteDescriptor> {
        self.descriptor.as_ref()
    }

    /// The live instance, if a control group is attached.
    pub fn instance(&self) -> Option<Arc<InjectionInstance>> {
        self.instance.clone()
    }

    /// Whether the session has been shut down.
    pub fn is_inert(&self) -> bool {
        self.inert
    }

    /// Resolves the site, loads configuration and attaches to the input.
    ///
    /// Unsupported pages are left untouched. Returns whether a control
    /// group is attached afterwards.
    pub async fn start(&mut self) -> bool {
        if self.inert {
            return false;
        }

        self.last_url = self.dom.current_url();
        self.descriptor = resolve_for_url(&self.last_url).cloned();
        let Some(ref descriptor) = self.descriptor else {
            debug!(url = %self.last_url, "Page is not a supported site");
            return false;
        };
        info!(site_id = %descriptor.site_id, "Starting injector");

        self.context = self.rpc.load_context().await;
        self.inject()
    }

    /// Reacts to a batch of DOM mutations observed by the host.
    pub async fn on_mutations(&mut self) {
        if self.inert {
            return;
        }

        let url = self.dom.current_url();
        if url != self.last_url {
            debug!(from = %self.last_url, to = %url, "Navigation detected");
            self.last_url = url;
            tokio::time::sleep(SETTLE_DELAY).await;
            if self.inert {
                return;
            }
            self.teardown();
            self.start().await;
            return;
        }

        if self.descriptor.is_none() {
            return;
        }

        match self.instance.as_ref().map(|instance| instance.is_intact()) {
            Some(true) => {}
            Some(false) => {
                debug!("Control group lost, re-injecting");
                self.teardown();
                self.inject();
            }
            None => {
                self.inject();
            }
        }
    }

    /// Shuts the session down after the extension context went away.
    pub fn on_context_invalidated(&mut self) {
        info!("Context invalidated, disposing injector");
        self.teardown();
        self.inert = true;
    }

    /// Pushes a new configuration snapshot to the live instance.
    pub fn update_config(&mut self, context: InjectContext) {
        self.context = context.clone();
        if let Some(ref instance) = self.instance {
            instance.update_config(context);
        }
    }

    fn teardown(&mut self) {
        if let Some(instance) = self.instance.take() {
            instance.dispose();
        }
        controls::remove_all(self.dom.as_ref());
    }

    fn ensure_styles(&mut self) {
        if self.styles_registered {
            return;
        }
        match self.dom.add_style_sheet(STYLE_ID, STYLES) {
            Ok(()) => self.styles_registered = true,
            Err(e) => debug!(error = %e, "Failed to register styles"),
        }
    }

    fn inject(&mut self) -> bool {
        let Some(descriptor) = self.descriptor.clone() else {
            return false;
        };
        let adapter = SiteAdapter::new(descriptor.clone(), self.dom.clone());
        let Some(input) = adapter.find_input() else {
            debug!(site_id = %descriptor.site_id, "Input not present yet");
            return false;
        };

        self.ensure_styles();
        self.teardown();

        let controls = match Controls::build(self.dom.as_ref(), &self.context.prompts) {
            Ok(controls) => controls,
            Err(e) => {
                debug!(error = %e, "Failed to build control group");
                return false;
            }
        };
        if let Err(e) = controls.attach(
            self.dom.as_ref(),
            input,
            descriptor.container_selector.as_deref(),
        ) {
            debug!(error = %e, "Failed to attach control group");
            controls.remove(self.dom.as_ref());
            return false;
        }

        info!(site_id = %descriptor.site_id, "Control group attached");
        self.instance = Some(Arc::new(InjectionInstance::new(
            self.dom.clone(),
            adapter,
            input,
            controls,
            self.context.clone(),
            self.optimizer.clone(),
            self.rpc.clone(),
            self.ui.clone(),
            self.options,
        )));
        true
    }
}
