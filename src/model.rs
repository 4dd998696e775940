//! Model descriptors fetched from the backend.
//!
//! A descriptor declares what a model can do and which controls the client
//! may expose. Capability fields accept either a boolean or one of the mode
//! strings `"toggle"` / `"switch"`:
//!
//! ```
//! use devochat::model::{CapabilityMode, ModelDescriptor};
//!
//! let json = r#"{
//!     "model_name": "grok-4",
//!     "endpoint": "/grok",
//!     "capabilities": { "inference": "switch", "search": "toggle", "image": true },
//!     "controls": { "temperature": "conditional" },
//!     "variants": { "base": "grok-4", "inference": "grok-4-reasoning" }
//! }"#;
//! let model: ModelDescriptor = serde_json::from_str(json).unwrap();
//! assert_eq!(model.capabilities.inference, CapabilityMode::Switch);
//! assert!(model.capabilities.image);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a model exposes a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawFlag", into = "RawFlag")]
pub enum CapabilityMode {
    /// Not available; the flag is forced off.
    #[default]
    Unsupported,
    /// Always on; the flag is forced on.
    Always,
    /// User-toggleable flag on the same model.
    Toggle,
    /// Implemented by swapping to a named model variant.
    Switch,
}

impl CapabilityMode {
    /// Whether the user may flip this capability.
    pub fn is_toggleable(self) -> bool {
        matches!(self, Self::Toggle | Self::Switch)
    }

    /// The fixed flag value for non-toggleable modes.
    pub fn fixed_value(self) -> bool {
        matches!(self, Self::Always)
    }
}

/// Wire form shared by capability and control fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawFlag {
    Flag(bool),
    Named(String),
}

impl TryFrom<RawFlag> for CapabilityMode {
    type Error = String;

    fn try_from(raw: RawFlag) -> Result<Self, Self::Error> {
        match raw {
            RawFlag::Flag(true) => Ok(Self::Always),
            RawFlag::Flag(false) => Ok(Self::Unsupported),
            RawFlag::Named(name) => match name.as_str() {
                "toggle" => Ok(Self::Toggle),
                "switch" => Ok(Self::Switch),
                other => Err(format!("unknown capability mode '{other}'")),
            },
        }
    }
}

impl From<CapabilityMode> for RawFlag {
    fn from(mode: CapabilityMode) -> Self {
        match mode {
            CapabilityMode::Unsupported => Self::Flag(false),
            CapabilityMode::Always => Self::Flag(true),
            CapabilityMode::Toggle => Self::Named("toggle".into()),
            CapabilityMode::Switch => Self::Named("switch".into()),
        }
    }
}

/// Whether a sampling control is exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawFlag", into = "RawFlag")]
pub enum ControlMode {
    /// Hidden.
    #[default]
    Disabled,
    /// Always adjustable.
    Enabled,
    /// Adjustable, but the backend may ignore it for some variants.
    Conditional,
}

impl ControlMode {
    /// Whether the control should be offered.
    pub fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled | Self::Conditional)
    }
}

impl TryFrom<RawFlag> for ControlMode {
    type Error = String;

    fn try_from(raw: RawFlag) -> Result<Self, Self::Error> {
        match raw {
            RawFlag::Flag(true) => Ok(Self::Enabled),
            RawFlag::Flag(false) => Ok(Self::Disabled),
            RawFlag::Named(name) if name == "conditional" => Ok(Self::Conditional),
            RawFlag::Named(other) => Err(format!("unknown control mode '{other}'")),
        }
    }
}

impl From<ControlMode> for RawFlag {
    fn from(mode: ControlMode) -> Self {
        match mode {
            ControlMode::Disabled => Self::Flag(false),
            ControlMode::Enabled => Self::Flag(true),
            ControlMode::Conditional => Self::Named("conditional".into()),
        }
    }
}

/// A capability that can be toggled from the composer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Reasoning / thinking output.
    Inference,
    /// Web search grounding.
    Search,
    /// Long-running research mode.
    DeepResearch,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inference => write!(f, "inference"),
            Self::Search => write!(f, "search"),
            Self::DeepResearch => write!(f, "deep_research"),
        }
    }
}

/// Declared capabilities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    /// Whether the endpoint streams `data:` frames.
    #[serde(default = "default_true")]
    pub stream: bool,
    /// Reasoning mode.
    #[serde(alias = "reasoning")]
    pub inference: CapabilityMode,
    /// Web search mode.
    pub search: CapabilityMode,
    /// Deep research mode.
    pub deep_research: CapabilityMode,
    /// Accepts image attachments.
    #[serde(alias = "vision")]
    pub image: bool,
    /// Accepts MCP server selection.
    pub mcp: bool,
}

fn default_true() -> bool {
    true
}

impl Capabilities {
    /// Mode declared for `capability`.
    pub fn mode(&self, capability: Capability) -> CapabilityMode {
        match capability {
            Capability::Inference => self.inference,
            Capability::Search => self.search,
            Capability::DeepResearch => self.deep_research,
        }
    }
}

/// Declared controls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Controls {
    /// Temperature slider.
    pub temperature: ControlMode,
    /// Reasoning effort slider (only while inference is on).
    pub reason: ControlMode,
    /// Verbosity slider.
    pub verbosity: ControlMode,
    /// Custom system message.
    pub system_message: bool,
}

/// Capability-specific model names used by `"switch"` capabilities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Variants {
    /// Model to return to when a switched capability turns off.
    pub base: Option<String>,
    /// Reasoning variant.
    pub inference: Option<String>,
    /// Search variant.
    pub search: Option<String>,
    /// Deep research variant.
    pub deep_research: Option<String>,
}

impl Variants {
    /// Target model when turning `capability` on (`true`) or off (`false`).
    pub fn target(&self, capability: Capability, turning_on: bool) -> Option<&str> {
        let name = if turning_on {
            match capability {
                Capability::Inference => &self.inference,
                Capability::Search => &self.search,
                Capability::DeepResearch => &self.deep_research,
            }
        } else {
            &self.base
        };
        name.as_deref()
    }
}

/// One model as described by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Identifier sent to the backend.
    pub model_name: String,
    /// Display name.
    #[serde(default)]
    pub model_alias: Option<String>,
    /// Short description for pickers.
    #[serde(default)]
    pub description: Option<String>,
    /// Path (relative to the base URL) that accepts chat or image requests.
    pub endpoint: String,
    /// Input price per million tokens.
    #[serde(default)]
    pub in_billing: f64,
    /// Output price per million tokens.
    #[serde(default)]
    pub out_billing: f64,
    /// Declared capabilities.
    #[serde(default)]
    pub capabilities: Capabilities,
    /// Declared controls.
    #[serde(default)]
    pub controls: Controls,
    /// Variants for switched capabilities.
    #[serde(default)]
    pub variants: Variants,
}

impl ModelDescriptor {
    /// Name shown to the user.
    pub fn display_name(&self) -> &str {
        self.model_alias.as_deref().unwrap_or(&self.model_name)
    }
}

/// The list returned by `/models`, `/chat_models`, `/image_models`, `/realtime_models`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelCatalog {
    /// All known models.
    #[serde(default)]
    pub models: Vec<ModelDescriptor>,
}

impl ModelCatalog {
    /// Create a catalog from descriptors.
    pub fn new(models: Vec<ModelDescriptor>) -> Self {
        Self { models }
    }

    /// Look up a model by name.
    pub fn find(&self, model_name: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|m| m.model_name == model_name)
    }

    /// Whether a model with this name exists.
    pub fn contains(&self, model_name: &str) -> bool {
        self.find(model_name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> ModelDescriptor {
        match serde_json::from_str(json) {
            Ok(m) => m,
            Err(e) => unreachable!("descriptor should parse: {e}"),
        }
    }

    #[test]
    fn missing_capabilities_default_to_unsupported() {
        let model = parse(r#"{"model_name": "gpt-x", "endpoint": "/gpt"}"#);
        assert_eq!(model.capabilities.inference, CapabilityMode::Unsupported);
        assert!(!model.capabilities.image);
        assert!(model.capabilities.stream);
        assert_eq!(model.controls.temperature, ControlMode::Disabled);
    }

    #[test]
    fn reasoning_and_vision_aliases_are_accepted() {
        let model = parse(
            r#"{"model_name": "m", "endpoint": "/m",
                "capabilities": {"reasoning": true, "vision": true}}"#,
        );
        assert_eq!(model.capabilities.inference, CapabilityMode::Always);
        assert!(model.capabilities.image);
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let result: Result<ModelDescriptor, _> = serde_json::from_str(
            r#"{"model_name": "m", "endpoint": "/m", "capabilities": {"search": "sometimes"}}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn capability_mode_round_trips_through_json() {
        let json = match serde_json::to_string(&CapabilityMode::Switch) {
            Ok(j) => j,
            Err(e) => unreachable!("serialize: {e}"),
        };
        assert_eq!(json, "\"switch\"");
    }

    #[test]
    fn variant_target_uses_base_when_turning_off() {
        let variants = Variants {
            base: Some("base".into()),
            search: Some("base-search".into()),
            ..Variants::default()
        };
        assert_eq!(variants.target(Capability::Search, true), Some("base-search"));
        assert_eq!(variants.target(Capability::Search, false), Some("base"));
        assert_eq!(variants.target(Capability::Inference, true), None);
    }

    #[test]
    fn catalog_find_by_name() {
        let catalog = ModelCatalog::new(vec![parse(
            r#"{"model_name": "gpt-x", "model_alias": "GPT X", "endpoint": "/gpt"}"#,
        )]);
        assert!(catalog.contains("gpt-x"));
        assert_eq!(catalog.find("gpt-x").map(|m| m.display_name()), Some("GPT X"));
        assert!(catalog.find("other").is_none());
    }
}
