//! Scripted model provider for tests

#![cfg(test)]

use super::errors::LLMError;
use super::traits::{ModelProvider, TextStream};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// What the mock does on its next call
pub enum MockStep {
    Respond(String),
    Fail(LLMError),
    /// Never completes; used to exercise cancellation
    Hang,
}

/// Mock provider that replays a script of steps in order
#[derive(Clone, Default)]
pub struct MockModelProvider {
    steps: Arc<Mutex<VecDeque<MockStep>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockModelProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a provider that answers with each response in turn
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let provider = Self::new();
        for response in responses {
            provider.push(MockStep::Respond(response.into()));
        }
        provider
    }

    pub fn push(&self, step: MockStep) {
        self.steps.lock().unwrap().push_back(step);
    }

    /// Prompts received so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelProvider for MockModelProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, prompt: &str, _system: Option<&str>) -> Result<String, LLMError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(MockStep::Respond(text)) => Ok(text),
            Some(MockStep::Fail(error)) => Err(error),
            Some(MockStep::Hang) => futures::future::pending::<Result<String, LLMError>>().await,
            None => Ok(String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_mock_replays_script() {
        let provider = MockModelProvider::with_responses(["first", "second"]);
        provider.push(MockStep::Fail(LLMError::auth("Invalid API key")));

        assert_eq!(provider.complete("a", None).await.unwrap(), "first");
        assert_eq!(provider.complete("b", None).await.unwrap(), "second");
        let err = provider.complete("c", None).await.unwrap_err();
        assert!(matches!(err, LLMError::Auth(_)));
        assert_eq!(err.to_string(), "model endpoint rejected credentials: Invalid API key");
        assert_eq!(provider.complete("d", None).await.unwrap(), "");
        assert_eq!(provider.prompts(), vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_default_stream_is_single_chunk() {
        let provider = MockModelProvider::with_responses(["streamed"]);
        let chunks: Vec<_> = provider.complete_stream("x", None).await.unwrap().collect().await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_ref().unwrap(), "streamed");
    }
}
