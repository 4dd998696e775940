//! The JSON envelope posted to a chat model endpoint.

use serde::Serialize;

use super::message::ContentPart;
use crate::model::ModelDescriptor;
use crate::state::SettingsState;

/// One chat turn as the backend expects it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub conversation_id: String,
    pub model: String,
    pub in_billing: f64,
    pub out_billing: f64,
    pub temperature: f64,
    pub reason: f64,
    pub verbosity: f64,
    pub system_message: String,
    pub user_message: Vec<ContentPart>,
    pub inference: bool,
    pub search: bool,
    pub deep_research: bool,
    pub dan: bool,
    /// Selected MCP server ids.
    pub mcp: Vec<String>,
    pub stream: bool,
}

impl ChatRequest {
    /// Snapshot the settings for one send.
    pub fn new(
        conversation_id: &str,
        model: &ModelDescriptor,
        settings: &SettingsState,
        user_message: Vec<ContentPart>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            model: model.model_name.clone(),
            in_billing: model.in_billing,
            out_billing: model.out_billing,
            temperature: settings.temperature,
            reason: settings.reason,
            verbosity: settings.verbosity,
            system_message: settings.system_message.clone(),
            user_message,
            inference: settings.is_inference,
            search: settings.is_search,
            deep_research: settings.is_deep_research,
            dan: settings.is_dan,
            mcp: settings.mcp_list.clone(),
            stream: model.capabilities.stream,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChatConfig;
    use crate::model::ModelCatalog;
    use std::sync::Arc;

    #[test]
    fn envelope_carries_every_field() {
        let catalog: ModelCatalog = match serde_json::from_str(
            r#"{"models": [{"model_name": "gpt-x", "endpoint": "/gpt", "in_billing": 1.5, "out_billing": 6.0}]}"#,
        ) {
            Ok(c) => c,
            Err(e) => unreachable!("catalog: {e}"),
        };
        let settings = SettingsState::new(Arc::new(catalog.clone()), &ChatConfig {
            default_model: "gpt-x".into(),
            ..ChatConfig::default()
        });
        let Some(model) = catalog.find("gpt-x") else {
            unreachable!("model present");
        };
        let request = ChatRequest::new("c1", model, &settings, vec![ContentPart::text("hello")]);
        let json = match serde_json::to_value(&request) {
            Ok(v) => v,
            Err(e) => unreachable!("serialize: {e}"),
        };
        for key in [
            "conversation_id", "model", "in_billing", "out_billing", "temperature", "reason",
            "verbosity", "system_message", "user_message", "inference", "search",
            "deep_research", "dan", "mcp", "stream",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["user_message"], serde_json::json!([{"type": "text", "text": "hello"}]));
        assert_eq!(json["stream"], serde_json::json!(true));
        assert_eq!(json["in_billing"], serde_json::json!(1.5));
    }
}
