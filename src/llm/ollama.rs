use async_trait::async_trait;
use bytes::Bytes;
use futures::{ Stream, StreamExt };
use log::{ debug, info, warn };
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use super::{ ChunkStream, LlmConfig, ModelBackend };
use crate::error::{ BoxError, RelayError };
use crate::models::chat::ChatMessage;
use crate::stream::{ Line, NdjsonDecoder };

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

#[derive(Debug, Clone)]
pub struct OllamaBackend {
    http: HttpClient,
    base_url: String,
    completion_model: Option<String>,
}

#[derive(Serialize)]
struct ChatPayload<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

impl OllamaBackend {
    pub fn new(base_url: Option<String>, completion_model: Option<String>) -> Self {
        let url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.into());

        Self {
            http: HttpClient::new(),
            base_url: url.trim_end_matches('/').to_string(),
            completion_model: completion_model.filter(|m| !m.trim().is_empty()),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(config.base_url.clone(), config.completion_model.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ModelBackend for OllamaBackend {
    async fn list_models(&self) -> Result<Vec<String>, BoxError> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = self.http.get(&url).send().await?.error_for_status()?;
        let tags = resp.json::<TagsResponse>().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn chat_stream(
        &self,
        model: &str,
        messages: &[ChatMessage]
    ) -> Result<ChunkStream, BoxError> {
        let url = format!("{}/api/chat", self.base_url);
        let payload = ChatPayload { model, messages, stream: true };

        let response = self.http.post(&url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Box::new(RelayError::Status { status, body }));
        }
        debug!("Ollama accepted chat stream for model '{}'", model);

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(forward_chunks(response.bytes_stream(), tx));

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    fn default_model(&self) -> Option<String> {
        self.completion_model.clone()
    }
}

type ChunkSender = mpsc::Sender<Result<Value, BoxError>>;

/// Reads Ollama's NDJSON body and forwards each object until the `done`
/// record, an in-stream error, or the receiver going away.
async fn forward_chunks<S, E>(bytes: S, tx: ChunkSender)
    where S: Stream<Item = Result<Bytes, E>> + Send + 'static, E: std::error::Error + Send + Sync + 'static
{
    let mut bytes = std::pin::pin!(bytes);
    let mut decoder = NdjsonDecoder::new();

    while let Some(chunk) = bytes.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                let _ = tx.send(Err(Box::new(e) as BoxError)).await;
                return;
            }
        };
        for line in decoder.push(&chunk) {
            if !forward_line(line, &tx).await {
                return;
            }
        }
    }

    if let Some(line) = decoder.finish() {
        forward_line(line, &tx).await;
    }
}

/// Returns false once forwarding should stop.
async fn forward_line(line: Line, tx: &ChunkSender) -> bool {
    let line = match line {
        Ok(line) => line,
        Err(e) => {
            warn!("Skipping non UTF-8 line from Ollama: {}", e);
            return true;
        }
    };

    let value = match serde_json::from_str::<Value>(&line) {
        Ok(value) => value,
        Err(e) => {
            info!("JSON parse error: {} for line: {}", e, line);
            return true;
        }
    };

    if let Some(message) = value.get("error").and_then(Value::as_str) {
        let _ = tx.send(Err(Box::new(RelayError::Backend(message.to_string())) as BoxError)).await;
        return false;
    }

    let done = value.get("done").and_then(Value::as_bool).unwrap_or(false);
    if tx.send(Ok(value)).await.is_err() {
        debug!("Relay client went away, closing Ollama stream");
        return false;
    }
    !done
}
