//! The control group attached next to a chat input.

use tracing::debug;

use crate::dom::{DomError, ElementId, ElementSpec, PageDom};
use crate::prompts::{self, UserPromptConfig};

/// Class marking every attached control group.
pub const CONTAINER_CLASS: &str = "apo-container";
/// Selector for attached control groups.
pub const CONTAINER_SELECTOR: &str = ".apo-container";
/// Class of the strategy selector.
pub const SELECTOR_CLASS: &str = "apo-strategy-select";
/// Id of the stylesheet registered once per page.
pub const STYLE_ID: &str = "apo-injector-styles";
/// Attribute naming the action a control triggers.
pub const ACTION_ATTR: &str = "data-apo-action";

/// Minimal layout for the control group; hosts may restyle freely.
pub const STYLES: &str = "\
.apo-container { display: inline-flex; align-items: center; gap: 6px; margin-left: 8px; }
.apo-btn { padding: 6px 12px; border-radius: 6px; font-size: 13px; cursor: pointer; border: none; }
.apo-btn-primary { background: #667eea; color: #fff; }
.apo-btn-primary:disabled { opacity: 0.6; cursor: not-allowed; }
.apo-btn-secondary { background: #f3f4f6; color: #374151; }
.apo-strategy-select { padding: 5px 10px; border: 1px solid #d1d5db; border-radius: 6px; font-size: 12px; }
";

/// Handles to the nodes of one control group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Controls {
    /// The `.apo-container` element.
    pub container: ElementId,
    /// The strategy `<select>`.
    pub selector: ElementId,
    /// The optimize button.
    pub optimize_button: ElementId,
    /// The template button.
    pub template_button: ElementId,
}

impl Controls {
    /// Creates a detached control group.
    pub fn build(dom: &dyn PageDom, prompt_config: &UserPromptConfig) -> Result<Self, DomError> {
        let container = dom.create_element(&ElementSpec::new("div").class(CONTAINER_CLASS))?;
        let selector = build_selector(dom, prompt_config)?;
        let optimize_button = dom.create_element(
            &ElementSpec::new("button")
                .class("apo-btn apo-btn-primary")
                .attr(ACTION_ATTR, "optimize")
                .attr("title", "Optimize the current prompt")
                .text("✨ Optimize"),
        )?;
        let template_button = dom.create_element(
            &ElementSpec::new("button")
                .class("apo-btn apo-btn-secondary")
                .attr(ACTION_ATTR, "template")
                .attr("title", "Insert a prompt template")
                .text("📋 Templates"),
        )?;

        for child in [selector, optimize_button, template_button] {
            dom.append_child(container, child)?;
        }

        Ok(Self {
            container,
            selector,
            optimize_button,
            template_button,
        })
    }

    /// Attaches the group inside the input's container, or its parent.
    pub fn attach(
        &self,
        dom: &dyn PageDom,
        input: ElementId,
        container_selector: Option<&str>,
    ) -> Result<ElementId, DomError> {
        let target = match container_selector {
            Some(selector) => dom.closest(input, selector)?,
            None => None,
        };
        let target = match target {
            Some(t) => t,
            None => dom
                .parent(input)?
                .ok_or_else(|| DomError::Unsupported("input has no parent".into()))?,
        };
        dom.append_child(target, self.container)?;
        Ok(target)
    }

    /// Whether the group is still in the document.
    pub fn is_attached(&self, dom: &dyn PageDom) -> bool {
        dom.is_connected(self.container)
    }

    /// Swaps the strategy selector for a freshly built one.
    pub fn replace_selector(
        &mut self,
        dom: &dyn PageDom,
        prompt_config: &UserPromptConfig,
    ) -> Result<(), DomError> {
        let fresh = build_selector(dom, prompt_config)?;
        dom.replace_child(self.container, fresh, self.selector)?;
        self.selector = fresh;
        Ok(())
    }

    /// Detaches the group.
    pub fn remove(&self, dom: &dyn PageDom) {
        if let Err(e) = dom.remove(self.container) {
            debug!(error = %e, "Control group already gone");
        }
    }
}

/// Builds a `<select>` listing every strategy, the selected one marked.
pub fn build_selector(
    dom: &dyn PageDom,
    prompt_config: &UserPromptConfig,
) -> Result<ElementId, DomError> {
    let select = dom.create_element(
        &ElementSpec::new("select")
            .class(SELECTOR_CLASS)
            .attr(ACTION_ATTR, "select-strategy"),
    )?;
    let selected_id = prompts::selected(prompt_config).id;

    for strategy in prompts::list_all(prompt_config) {
        let mut spec = ElementSpec::new("option")
            .attr("value", strategy.id.clone())
            .text(strategy.name.clone());
        if strategy.id == selected_id {
            spec = spec.attr("selected", "");
        }
        let option = dom.create_element(&spec)?;
        dom.append_child(select, option)?;
    }

    Ok(select)
}

/// Removes every control group on the page; returns how many were removed.
pub fn remove_all(dom: &dyn PageDom) -> usize {
    let groups = match dom.query_all(CONTAINER_SELECTOR) {
        Ok(groups) => groups,
        Err(e) => {
            debug!(error = %e, "Failed to query control groups");
            return 0;
        }
    };
    groups
        .into_iter()
        .filter(|group| dom.remove(*group).is_ok())
        .count()
}
