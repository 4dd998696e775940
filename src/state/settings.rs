//! Active model and composer settings.
//!
//! Every model switch recomputes the derived `can_*` flags from the model's
//! declared capabilities and controls. Toggling a capability flips a local
//! flag; for `"switch"` capabilities it also moves to the declared variant.

use std::sync::Arc;

use crate::config::ChatConfig;
use crate::model::{
    Capabilities, Capability, CapabilityMode, ControlMode, Controls, ModelCatalog, Variants,
};

/// Toggle values restored from a stored conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitialSettings {
    /// Reasoning mode.
    pub is_inference: bool,
    /// Web search mode.
    pub is_search: bool,
    /// Deep research mode.
    pub is_deep_research: bool,
}

/// Composer settings and the flags derived from the active model.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsState {
    /// Models fetched from the backend.
    pub catalog: Arc<ModelCatalog>,
    /// Model used for the next request.
    pub model: String,
    /// Alias of the open conversation, shown in the header.
    pub alias: String,
    pub temperature: f64,
    pub reason: f64,
    pub verbosity: f64,
    pub system_message: String,
    /// Image-generation mode in the composer.
    pub is_image: bool,
    pub is_inference: bool,
    pub is_search: bool,
    pub is_deep_research: bool,
    pub is_dan: bool,
    /// Selected MCP server ids.
    pub mcp_list: Vec<String>,

    pub can_read_image: bool,
    pub can_control_temperature: bool,
    pub can_control_reason: bool,
    pub can_control_verbosity: bool,
    pub can_control_system_message: bool,
    pub can_toggle_inference: bool,
    pub can_toggle_search: bool,
    pub can_toggle_deep_research: bool,
    pub can_toggle_mcp: bool,
}

impl SettingsState {
    /// Settings for `catalog` with the configured default model applied.
    pub fn new(catalog: Arc<ModelCatalog>, chat: &ChatConfig) -> Self {
        let mut state = Self {
            catalog,
            model: chat.default_model.clone(),
            alias: String::new(),
            temperature: chat.temperature,
            reason: chat.reason,
            verbosity: chat.verbosity,
            system_message: String::new(),
            is_image: false,
            is_inference: false,
            is_search: false,
            is_deep_research: false,
            is_dan: false,
            mcp_list: Vec::new(),
            can_read_image: false,
            can_control_temperature: false,
            can_control_reason: false,
            can_control_verbosity: false,
            can_control_system_message: false,
            can_toggle_inference: false,
            can_toggle_search: false,
            can_toggle_deep_research: false,
            can_toggle_mcp: false,
        };
        let model = state.model.clone();
        state.update_model(&model, None);
        state
    }

    /// Replace the catalog and re-derive flags for the current model.
    pub fn set_catalog(&mut self, catalog: Arc<ModelCatalog>) {
        self.catalog = catalog;
        let model = self.model.clone();
        self.update_model(&model, None);
    }

    fn declared(&self, model: &str) -> (Capabilities, Controls, Variants) {
        match self.catalog.find(model) {
            Some(m) => (m.capabilities.clone(), m.controls.clone(), m.variants.clone()),
            None => (Capabilities::default(), Controls::default(), Variants::default()),
        }
    }

    /// Switch to `model` and recompute every derived flag.
    ///
    /// With `initial` (conversation restore) toggleable flags take the stored
    /// values; without it they keep their current values. Non-toggleable
    /// flags are forced to the declared value either way. An unknown model
    /// name is accepted and behaves as a model without capabilities.
    pub fn update_model(&mut self, model: &str, initial: Option<&InitialSettings>) {
        let (capabilities, controls, _) = self.declared(model);
        self.model = model.to_string();

        self.can_toggle_inference = capabilities.inference.is_toggleable();
        self.is_inference = resolve_flag(
            capabilities.inference,
            self.is_inference,
            initial.map(|s| s.is_inference),
        );

        self.can_toggle_search = capabilities.search.is_toggleable();
        self.is_search =
            resolve_flag(capabilities.search, self.is_search, initial.map(|s| s.is_search));

        self.can_toggle_deep_research = capabilities.deep_research.is_toggleable();
        self.is_deep_research = resolve_flag(
            capabilities.deep_research,
            self.is_deep_research,
            initial.map(|s| s.is_deep_research),
        );

        self.apply_controls(&controls);

        self.can_control_system_message = controls.system_message;
        if !controls.system_message {
            self.system_message.clear();
            self.is_dan = false;
        }

        self.can_read_image = capabilities.image;
        self.can_toggle_mcp = capabilities.mcp;
        if !capabilities.mcp {
            self.mcp_list.clear();
        }
    }

    fn apply_controls(&mut self, controls: &Controls) {
        self.can_control_temperature = controls.temperature.is_enabled();
        self.can_control_reason = controls.reason == ControlMode::Enabled && self.is_inference;
        self.can_control_verbosity = controls.verbosity == ControlMode::Enabled;
    }

    /// Current value of a capability flag.
    pub fn flag(&self, capability: Capability) -> bool {
        match capability {
            Capability::Inference => self.is_inference,
            Capability::Search => self.is_search,
            Capability::DeepResearch => self.is_deep_research,
        }
    }

    fn set_flag(&mut self, capability: Capability, value: bool) {
        match capability {
            Capability::Inference => self.is_inference = value,
            Capability::Search => self.is_search = value,
            Capability::DeepResearch => self.is_deep_research = value,
        }
    }

    /// Whether the active model lets the user flip `capability`.
    pub fn can_toggle(&self, capability: Capability) -> bool {
        match capability {
            Capability::Inference => self.can_toggle_inference,
            Capability::Search => self.can_toggle_search,
            Capability::DeepResearch => self.can_toggle_deep_research,
        }
    }

    /// Flip `capability`.
    ///
    /// For a `"switch"` capability the model moves to the declared variant
    /// (or back to `variants.base`); a missing variant leaves the model
    /// unchanged but the flag still flips. Returns `false` and changes
    /// nothing when the capability is not toggleable on the active model.
    pub fn toggle(&mut self, capability: Capability) -> bool {
        if !self.can_toggle(capability) {
            return false;
        }
        let (capabilities, _, variants) = self.declared(&self.model);
        let next = !self.flag(capability);

        if capabilities.mode(capability) == CapabilityMode::Switch
            && let Some(target) = variants.target(capability, next)
        {
            let target = target.to_string();
            self.update_model(&target, None);
        }

        self.set_flag(capability, next);
        if capability == Capability::Inference {
            let (_, controls, _) = self.declared(&self.model);
            self.apply_controls(&controls);
        }
        true
    }

    /// Convenience for [`toggle`](Self::toggle) with [`Capability::Inference`].
    pub fn toggle_inference(&mut self) -> bool {
        self.toggle(Capability::Inference)
    }

    /// Convenience for [`toggle`](Self::toggle) with [`Capability::Search`].
    pub fn toggle_search(&mut self) -> bool {
        self.toggle(Capability::Search)
    }

    /// Convenience for [`toggle`](Self::toggle) with [`Capability::DeepResearch`].
    pub fn toggle_deep_research(&mut self) -> bool {
        self.toggle(Capability::DeepResearch)
    }

    /// Select MCP servers; ignored when the model does not accept them.
    pub fn set_mcp_list(&mut self, servers: Vec<String>) {
        if self.can_toggle_mcp {
            self.mcp_list = servers;
        }
    }

    /// Set the system message; ignored when the model does not accept one.
    pub fn set_system_message(&mut self, message: impl Into<String>) {
        if self.can_control_system_message {
            self.system_message = message.into();
        }
    }

    /// Whether the active model is present in the catalog.
    pub fn model_is_known(&self) -> bool {
        self.catalog.contains(&self.model)
    }
}

fn resolve_flag(mode: CapabilityMode, current: bool, initial: Option<bool>) -> bool {
    if mode.is_toggleable() {
        initial.unwrap_or(current)
    } else {
        mode.fixed_value()
    }
}
