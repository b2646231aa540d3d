//! The model capability consumed by the fix engine

use super::errors::LLMError;
use async_trait::async_trait;
use futures::stream::{self, Stream};
use std::pin::Pin;

/// Incremental completion text
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, LLMError>> + Send>>;

/// A language model that turns a prompt into response text
///
/// Dropping a returned stream abandons the request.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Get the name of this provider
    fn name(&self) -> &str;

    /// Complete a prompt and return the whole response
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<String, LLMError>;

    /// Stream a completion; by default a single chunk holding the whole response
    async fn complete_stream(
        &self,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<TextStream, LLMError> {
        let text = self.complete(prompt, system).await?;
        Ok(Box::pin(stream::once(async move { Ok(text) })))
    }
}
