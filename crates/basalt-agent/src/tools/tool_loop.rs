//! Tool execution loop — the core agentic behavior.
//!
//! Flow: prompt → LLM → if tool_use → execute tools → inject results → LLM → repeat
//! Stops when: stop_reason is not "tool_use", the hard iteration cap is hit,
//! or cancellation is requested.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use basalt_core::types::budgets::MAX_TOOL_ITERATIONS;

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError, ToolCall};

use super::{Tool, ToolResult};

/// Run the full tool execution loop (non-streaming).
///
/// Starts from `initial_request`, which must have `messages` or
/// `raw_messages` set. Returns the final `ChatResponse` (the first one
/// whose `stop_reason != "tool_use"`) alongside the names of every tool
/// invoked along the way, in call order, for usage-frequency tracking.
pub async fn run_tool_loop(
    provider: &dyn LlmProvider,
    initial_request: ChatRequest,
    tools: &[Box<dyn Tool>],
    cancel: Option<&CancellationToken>,
) -> Result<(ChatResponse, Vec<String>), ProviderError> {
    let mut raw_messages: Vec<serde_json::Value> =
        if let Some(ref raw) = initial_request.raw_messages {
            raw.clone()
        } else {
            initial_request
                .messages
                .iter()
                .map(|m| serde_json::json!({ "role": m.role, "content": m.content }))
                .collect()
        };

    let mut last_response: Option<ChatResponse> = None;
    let mut called_tools: Vec<String> = Vec::new();

    for iteration in 0..MAX_TOOL_ITERATIONS {
        if cancel.is_some_and(|c| c.is_cancelled()) {
            return Err(ProviderError::Cancelled);
        }

        let mut req = initial_request.clone();
        req.raw_messages = Some(raw_messages.clone());

        debug!(iteration, "tool loop iteration");

        let response = provider.send(&req).await?;

        if response.tool_calls.is_empty() || response.stop_reason != "tool_use" {
            info!(iteration, "tool loop complete — no more tool calls");
            return Ok((response, called_tools));
        }

        let mut assistant_content: Vec<serde_json::Value> = Vec::new();
        if !response.content.is_empty() {
            assistant_content.push(serde_json::json!({
                "type": "text",
                "text": response.content,
            }));
        }
        for call in &response.tool_calls {
            assistant_content.push(serde_json::json!({
                "type": "tool_use",
                "id": call.id,
                "name": call.name,
                "input": call.input,
            }));
        }
        raw_messages.push(serde_json::json!({
            "role": "assistant",
            "content": assistant_content,
        }));

        let mut tool_result_content: Vec<serde_json::Value> = Vec::new();
        for call in &response.tool_calls {
            if cancel.is_some_and(|c| c.is_cancelled()) {
                return Err(ProviderError::Cancelled);
            }
            let result = execute_tool(tools, call).await;
            called_tools.push(call.name.clone());
            tool_result_content.push(serde_json::json!({
                "type": "tool_result",
                "tool_use_id": call.id,
                "content": result.content,
                "is_error": result.is_error,
            }));
        }
        raw_messages.push(serde_json::json!({
            "role": "user",
            "content": tool_result_content,
        }));

        last_response = Some(response);
    }

    warn!(
        max_iterations = MAX_TOOL_ITERATIONS,
        "tool loop hit maximum iterations, using last non-error content"
    );

    match last_response {
        Some(resp) => Ok((resp, called_tools)),
        None => Err(ProviderError::Parse(format!(
            "tool loop exceeded {MAX_TOOL_ITERATIONS} iterations without a final response"
        ))),
    }
}

/// Find and execute the named tool. Returns an error ToolResult if not found
/// — tool errors are always in-band strings, never propagated as a `Result`
/// error, because the LLM is their consumer.
async fn execute_tool(tools: &[Box<dyn Tool>], call: &ToolCall) -> ToolResult {
    match tools.iter().find(|t| t.name() == call.name) {
        Some(tool) => {
            debug!(tool = %call.name, "executing tool");
            tool.execute(call.input.clone()).await
        }
        None => ToolResult::error(format!("unknown tool: {}", call.name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes input"
        }
        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({ "type": "object" })
        }
        async fn execute(&self, input: serde_json::Value) -> ToolResult {
            ToolResult::success(input.to_string())
        }
    }

    #[tokio::test]
    async fn cancellation_before_any_call_returns_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let tools: Vec<Box<dyn Tool>> = vec![Box::new(EchoTool)];
        struct NeverCalled;
        #[async_trait]
        impl LlmProvider for NeverCalled {
            fn name(&self) -> &str {
                "never"
            }
            async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
                panic!("should not be called when pre-cancelled");
            }
        }
        let req = ChatRequest {
            model: "m".into(),
            system: String::new(),
            system_prompt: None,
            messages: Vec::new(),
            max_tokens: 10,
            stream: false,
            thinking: None,
            tools: Vec::new(),
            raw_messages: Some(vec![]),
        };
        let result = run_tool_loop(&NeverCalled, req, &tools, Some(&token)).await;
        assert!(matches!(result, Err(ProviderError::Cancelled)));
    }

    #[tokio::test]
    async fn unknown_tool_name_is_in_band_error() {
        let tools: Vec<Box<dyn Tool>> = vec![Box::new(EchoTool)];
        let call = ToolCall {
            id: "1".into(),
            name: "does_not_exist".into(),
            input: serde_json::json!({}),
        };
        let result = execute_tool(&tools, &call).await;
        assert!(result.is_error);
    }
}
