use thiserror::Error;

use crate::models::Message;

/// Classified failure of a single provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Connection refused, DNS failure, timeout, or a body that could not be read.
    #[error("Network error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The response did not contain the expected completion text.
    #[error("Invalid response: {0}")]
    Format(String),

    #[error("Nothing to send: the message list is empty")]
    EmptyConversation,
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub top_p: Option<f32>,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>, temperature: f32) -> Self {
        Self {
            messages,
            temperature,
            top_p: None,
        }
    }

    pub fn with_top_p(mut self, top_p: Option<f32>) -> Self {
        self.top_p = top_p;
        self
    }
}
