//! Language model capability
//!
//! The fix engine only needs "prompt in, text out". One reference adapter
//! for OpenAI-compatible endpoints is provided; tests use a scripted mock.

pub mod errors;
pub mod openai_compat;
pub mod traits;

#[cfg(test)]
pub mod mock;

pub use errors::{LLMError, LLMResult};
pub use openai_compat::{OpenAICompatConfig, OpenAICompatProvider};
pub use traits::{ModelProvider, TextStream};

use futures::StreamExt;

/// Drain a text stream into one string
pub async fn collect_stream(mut stream: TextStream) -> LLMResult<String> {
    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        text.push_str(&chunk?);
    }
    Ok(text)
}
