//! Text-generation capability for Parley.
//!
//! Defines the provider-neutral chat types and the `LlmClient` trait the reply
//! pipeline drafts through, plus an OpenAI-compatible client implementation.
mod openai;
mod retry;
mod types;

pub use openai::{OpenAiClient, OpenAiConfig, DEFAULT_OPENAI_API_BASE};
pub use types::{
    ChatRequest, ChatResponse, ChatUsage, GenerationError, LlmClient, Message, MessageRole,
    UnavailableLlmClient,
};
