use tokio::sync::{mpsc, RwLock};
use tracing::info;

use basalt_sessions::ModelVariant;

use crate::prompt::{PromptBuilder, SessionInfo};
use crate::provider::{ChatRequest, ChatResponse, LlmProvider, Message, ProviderError, Role};
use crate::stream::StreamEvent;

/// Central agent runtime — holds the LLM provider, the prompt builder, and
/// the small/balanced/large model mapping a session's `model_id` resolves
/// against.
pub struct AgentRuntime {
    provider: Box<dyn LlmProvider>,
    prompt: RwLock<PromptBuilder>,
    small_model: String,
    balanced_model: String,
    large_model: String,
}

impl AgentRuntime {
    pub fn new(
        provider: Box<dyn LlmProvider>,
        prompt: PromptBuilder,
        small_model: String,
        balanced_model: String,
        large_model: String,
    ) -> Self {
        Self {
            provider,
            prompt: RwLock::new(prompt),
            small_model,
            balanced_model,
            large_model,
        }
    }

    pub fn small_model(&self) -> &str {
        &self.small_model
    }

    pub fn balanced_model(&self) -> &str {
        &self.balanced_model
    }

    pub fn large_model(&self) -> &str {
        &self.large_model
    }

    /// Resolve a session's `model_id` to the concrete model string the
    /// provider expects.
    pub fn model_for(&self, variant: ModelVariant) -> &str {
        match variant {
            ModelVariant::Small => &self.small_model,
            ModelVariant::Balanced => &self.balanced_model,
            ModelVariant::Large => &self.large_model,
        }
    }

    /// Access the LLM provider directly (used by the tool loop and
    /// compaction, both of which need to issue calls outside a full turn).
    pub fn provider(&self) -> &dyn LlmProvider {
        &*self.provider
    }

    /// Access the prompt builder (async read lock).
    pub async fn prompt(&self) -> tokio::sync::RwLockReadGuard<'_, PromptBuilder> {
        self.prompt.read().await
    }

    /// Re-read workspace prompt files from disk so `/reload` picks up edits
    /// without a process restart.
    pub async fn reload_prompt(&self) {
        self.prompt.write().await.reload_workspace();
    }

    /// One-shot chat call outside any session (used by background workers
    /// that don't carry a chat_id, e.g. a narrow sub-agent bootstrap).
    pub async fn chat(&self, user_message: &str, model: &str) -> Result<ChatResponse, ProviderError> {
        let req = self.build_request(user_message, model, None, None).await;
        info!(model = %req.model, provider = %self.provider.name(), "processing chat request");
        self.provider.send(&req).await
    }

    pub async fn chat_stream(
        &self,
        user_message: &str,
        model: &str,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError> {
        let mut req = self.build_request(user_message, model, None, None).await;
        req.stream = true;
        info!(model = %req.model, provider = %self.provider.name(), "processing streaming chat request");
        self.provider.send_stream(&req, tx).await
    }

    async fn build_request(
        &self,
        user_message: &str,
        model: &str,
        user_context: Option<&str>,
        session_info: Option<&SessionInfo>,
    ) -> ChatRequest {
        let prompt_builder = self.prompt.read().await;
        let system_prompt = prompt_builder.build_prompt(user_context, session_info);
        let plain = system_prompt.to_plain_text();
        ChatRequest {
            model: model.to_string(),
            system: plain,
            system_prompt: Some(system_prompt),
            messages: vec![Message {
                role: Role::User,
                content: user_message.to_string(),
            }],
            max_tokens: 4096,
            stream: false,
            thinking: None,
            tools: Vec::new(),
            raw_messages: None,
        }
    }
}
