pub mod ollama;

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use crate::error::BoxError;
use crate::models::chat::ChatMessage;
use self::ollama::OllamaBackend;

/// Chunk objects exactly as the model server produced them.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<serde_json::Value, BoxError>> + Send>>;

/// The model-serving daemon, seen from the relay.
///
/// `chat_stream` resolves once the backend has accepted the request; failures
/// after that point arrive as `Err` items on the stream.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn list_models(&self) -> Result<Vec<String>, BoxError>;

    async fn chat_stream(
        &self,
        model: &str,
        messages: &[ChatMessage]
    ) -> Result<ChunkStream, BoxError>;

    /// Model used when a request does not name one.
    fn default_model(&self) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub base_url: Option<String>,
    pub completion_model: Option<String>,
}

pub fn new_backend(config: &LlmConfig) -> Arc<dyn ModelBackend> {
    Arc::new(OllamaBackend::from_config(config))
}
