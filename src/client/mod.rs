//! Client side of the relay: model listing and the streaming turn.
//!
//! The relay answers `POST /api/chat` with one JSON record per line. Records
//! carry their text at `message.content`; the accumulated text is published
//! after every record so the view can render it as it grows.

use bytes::Bytes;
use futures::{ Stream, StreamExt };
use log::{ debug, error, warn };
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::fmt::Display;
use crate::conversation::Action;
use crate::error::RelayError;
use crate::models::chat::{ ChatRequest, ModelList };
use crate::stream::{ Line, NdjsonDecoder };

#[derive(Debug, Clone)]
pub struct RelayClient {
    http: HttpClient,
    base_url: String,
}

#[derive(Deserialize)]
struct StreamRecord {
    #[serde(default)]
    message: Option<RecordMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct RecordMessage {
    content: String,
}

/// What one response body added up to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub content: String,
    pub records: usize,
    pub dropped: usize,
    /// A record with `"done": true` was seen.
    pub completed: bool,
}

impl StreamSummary {
    fn accept<F: FnMut(&str)>(&mut self, line: Line, on_fragment: &mut F) {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Dropping record that is not valid UTF-8: {}", e);
                self.dropped += 1;
                return;
            }
        };

        match serde_json::from_str::<StreamRecord>(&line) {
            Ok(StreamRecord { error: Some(message), .. }) => {
                error!("Backend reported an error mid-stream: {}", message);
                self.dropped += 1;
            }
            Ok(StreamRecord { message: Some(message), done, .. }) => {
                self.records += 1;
                self.completed |= done;
                if !message.content.is_empty() {
                    self.content.push_str(&message.content);
                    on_fragment(&message.content);
                }
            }
            Ok(StreamRecord { done: true, .. }) => {
                self.records += 1;
                self.completed = true;
            }
            Ok(_) => {
                warn!("Dropping record without message content: {}", line);
                self.dropped += 1;
            }
            Err(e) => {
                warn!("Error parsing chunk: {} (chunk: {})", e, line);
                self.dropped += 1;
            }
        }
    }
}

/// Frame, parse and accumulate a relay response body.
///
/// `on_fragment` sees each non-empty fragment as soon as its record is
/// complete. Bad records are dropped; only a transport error ends the
/// stream early.
pub async fn reassemble<S, E, F>(body: S, mut on_fragment: F) -> Result<StreamSummary, E>
    where S: Stream<Item = Result<Bytes, E>>, F: FnMut(&str)
{
    let mut body = std::pin::pin!(body);
    let mut decoder = NdjsonDecoder::new();
    let mut summary = StreamSummary::default();

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        for line in decoder.push(&chunk) {
            summary.accept(line, &mut on_fragment);
        }
    }
    if let Some(line) = decoder.finish() {
        summary.accept(line, &mut on_fragment);
    }

    if !summary.completed {
        warn!(
            "Stream ended without a done marker after {} records; response may be truncated",
            summary.records
        );
    }
    Ok(summary)
}

/// Run one turn over an already opened body, dispatching state actions.
pub async fn drive_turn<S, E, F>(body: S, mut dispatch: F)
    where S: Stream<Item = Result<Bytes, E>>, E: Display, F: FnMut(Action)
{
    dispatch(Action::BeginStreaming);
    let result = reassemble(body, |fragment| {
        dispatch(Action::AppendFragment(fragment.to_string()))
    }).await;

    match result {
        Ok(summary) => {
            debug!(
                "Turn finished: {} records, {} dropped, {} chars",
                summary.records,
                summary.dropped,
                summary.content.len()
            );
            dispatch(Action::FinalizeTurn);
        }
        Err(e) => {
            error!("Error reading response stream: {}", e);
            dispatch(Action::FailTurn);
        }
    }
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: HttpClient::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Never fails; a broken relay shows up as an empty list with an error.
    pub async fn list_models(&self) -> ModelList {
        match self.fetch_models().await {
            Ok(list) => list,
            Err(e) => {
                error!("Error fetching models: {}", e);
                ModelList { models: Vec::new(), error: Some(e.to_string()) }
            }
        }
    }

    async fn fetch_models(&self) -> Result<ModelList, RelayError> {
        let url = format!("{}/api/models", self.base_url);
        let resp = self.http.get(&url).send().await?.error_for_status()?;
        Ok(resp.json::<ModelList>().await?)
    }

    pub async fn open_stream(
        &self,
        request: &ChatRequest
    ) -> Result<impl Stream<Item = reqwest::Result<Bytes>>, RelayError> {
        let url = format!("{}/api/chat", self.base_url);
        let response = self.http.post(&url).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Status { status, body });
        }
        Ok(response.bytes_stream())
    }

    /// Send `request` and stream the answer into `dispatch`. Ends with
    /// exactly one of `FinalizeTurn` or `FailTurn`.
    pub async fn run_turn<F: FnMut(Action)>(&self, request: &ChatRequest, mut dispatch: F) {
        match self.open_stream(request).await {
            Ok(body) => drive_turn(body, dispatch).await,
            Err(e) => {
                error!("Error: {}", e);
                dispatch(Action::FailTurn);
            }
        }
    }
}
