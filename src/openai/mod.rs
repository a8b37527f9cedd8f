//! OpenAI chat-completion client used for legal analysis synthesis.

pub mod client;
mod types;

pub use client::{CompletionClient, OpenAiClient, OpenAiError};
