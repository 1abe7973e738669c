//! LLM integration.
//!
//! The inference endpoint is any OpenAI-compatible chat-completions API
//! (Groq by default). `OpenAiCompatClient` does the HTTP; the `LlmProvider`
//! trait keeps callers testable against fakes.

mod openai;
pub mod provider;

pub use openai::OpenAiCompatClient;
pub use provider::{ChatMessage, CompletionRequest, CompletionResponse, LlmProvider};
