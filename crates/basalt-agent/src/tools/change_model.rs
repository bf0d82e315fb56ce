//! `change_model` — Model control family (§4.4). Mutates the session's
//! `model_id`; effective from the next turn, since the current turn's
//! provider request has already been built by the time this tool runs.

use std::sync::Arc;

use async_trait::async_trait;
use basalt_sessions::types::ModelVariant;
use serde_json::{json, Value};

use crate::pipeline::context::MessageContext;

use super::{Tool, ToolResult};

pub struct ChangeModelTool<C: MessageContext + 'static> {
    ctx: Arc<C>,
    chat_id: String,
}

impl<C: MessageContext + 'static> ChangeModelTool<C> {
    pub fn new(ctx: Arc<C>, chat_id: &str) -> Self {
        Self {
            ctx,
            chat_id: chat_id.to_string(),
        }
    }
}

#[async_trait]
impl<C: MessageContext + 'static> Tool for ChangeModelTool<C> {
    fn name(&self) -> &str {
        "change_model"
    }

    fn description(&self) -> &str {
        "Switch the model size used for this conversation from the next turn onward. \
         One of: small, balanced, large."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "model": {
                    "type": "string",
                    "enum": ["small", "balanced", "large"],
                    "description": "The model variant to switch to."
                }
            },
            "required": ["model"]
        })
    }

    async fn execute(&self, input: Value) -> ToolResult {
        let model = match input.get("model").and_then(|v| v.as_str()) {
            Some(m) => m,
            None => return ToolResult::error("'model' is required"),
        };
        let variant = match model.to_lowercase().as_str() {
            "small" => ModelVariant::Small,
            "balanced" => ModelVariant::Balanced,
            "large" => ModelVariant::Large,
            other => {
                return ToolResult::error(format!(
                    "unknown model variant '{other}' — expected small, balanced, or large"
                ))
            }
        };

        match self.ctx.sessions().set_model(&self.chat_id, variant).await {
            Ok(()) => ToolResult::success(format!("Model switched to {variant} for the next turn.")),
            Err(e) => ToolResult::error(format!("failed to switch model: {e}")),
        }
    }
}
