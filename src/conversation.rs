//! Client-side conversation state.
//!
//! All mutation goes through [`ChatState::apply`]. A turn moves
//! `Idle -> Sending -> Streaming -> Completed | Failed`, and a new turn may
//! only start once the previous one has settled.

use log::{ debug, warn };
use crate::models::chat::{ ChatMessage, ChatRequest };

pub const APOLOGY: &str = "Sorry, I encountered an error. Please try again later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnPhase {
    #[default]
    Idle,
    Sending,
    Streaming,
    Completed,
    Failed,
}

impl TurnPhase {
    pub fn in_flight(self) -> bool {
        matches!(self, TurnPhase::Sending | TurnPhase::Streaming)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    AppendUserMessage(String),
    /// The relay answered with a success status; records follow.
    BeginStreaming,
    AppendFragment(String),
    FinalizeTurn,
    FailTurn,
}

#[derive(Debug, Clone, Default)]
pub struct ChatState {
    messages: Vec<ChatMessage>,
    partial: String,
    phase: TurnPhase,
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// The accumulator for the turn in flight.
    pub fn partial(&self) -> &str {
        &self.partial
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn is_busy(&self) -> bool {
        self.phase.in_flight()
    }

    /// Start a turn from raw input. Returns the request to send, or `None`
    /// when the input is blank or a turn is already running.
    pub fn submit(&mut self, input: &str, model: Option<&str>) -> Option<ChatRequest> {
        if input.trim().is_empty() || self.is_busy() {
            return None;
        }
        self.apply(Action::AppendUserMessage(input.to_string()));
        Some(ChatRequest {
            messages: self.messages.clone(),
            model: model.map(str::to_string),
        })
    }

    pub fn apply(&mut self, action: Action) {
        match action {
            Action::AppendUserMessage(content) => {
                if self.is_busy() {
                    warn!("Ignoring user message while a turn is in flight");
                    return;
                }
                self.messages.push(ChatMessage::user(content));
                self.partial.clear();
                self.phase = TurnPhase::Sending;
            }
            Action::BeginStreaming => {
                if self.phase == TurnPhase::Sending {
                    self.phase = TurnPhase::Streaming;
                }
            }
            Action::AppendFragment(fragment) => {
                if !self.is_busy() {
                    debug!("Dropping fragment received outside a turn");
                    return;
                }
                self.partial.push_str(&fragment);
                self.phase = TurnPhase::Streaming;
            }
            Action::FinalizeTurn => {
                if !self.is_busy() {
                    return;
                }
                let content = std::mem::take(&mut self.partial);
                self.messages.push(ChatMessage::assistant(content));
                self.phase = TurnPhase::Completed;
            }
            Action::FailTurn => {
                if !self.is_busy() {
                    return;
                }
                self.partial.clear();
                self.messages.push(ChatMessage::assistant(APOLOGY));
                self.phase = TurnPhase::Failed;
            }
        }
    }
}
