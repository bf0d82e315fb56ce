//! `basalt-agent` — the Agent Turn Pipeline: LLM providers, prompt assembly,
//! the fixed tool registry, and the channel-agnostic turn pipeline shared by
//! every inbound path (live chat, cron `AgentTurn` jobs, sub-agent runs).

pub mod anthropic;
pub mod anthropic_stream;
pub mod health;
pub mod pipeline;
pub mod prompt;
pub mod provider;
pub mod registry;
pub mod runtime;
pub mod stream;
pub mod thinking;
pub mod tools;

pub use pipeline::MessageContext;
pub use provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};
pub use runtime::AgentRuntime;
