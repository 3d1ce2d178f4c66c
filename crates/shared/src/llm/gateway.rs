use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use futures_util::Stream;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::CompletionConfig;
use crate::models::{ChatMessage, ChatRole, NextSuggestion, ProductSummary};

pub const SUGGESTED_PRODUCTS_TAG: &str = "SUGGESTED_PRODUCTS:";
pub const NEXT_SUGGESTIONS_TAG: &str = "NEXT_SUGGESTIONS:";

/// Incremental assistant output. The pipeline is free of string sniffing;
/// only the HTTP boundary collapses these into the textual wire format.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    Token(String),
    SuggestedProducts(Vec<ProductSummary>),
    NextSuggestions(Vec<NextSuggestion>),
    End,
}

pub type ChatEventStream = Pin<Box<dyn Stream<Item = ChatEvent> + Send>>;

pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, CompletionError>> + Send>>;

pub type CompletionFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CompletionReply, CompletionError>> + Send + 'a>>;

/// What a tier hands back once it has committed to answering: either a live
/// token stream or the complete text of a non-streaming reply.
pub enum CompletionReply {
    Stream(TokenStream),
    Full(String),
}

impl std::fmt::Debug for CompletionReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream(_) => f.debug_tuple("Stream").finish(),
            Self::Full(text) => f.debug_tuple("Full").field(text).finish(),
        }
    }
}

/// One strategy for obtaining a completion. Tiers participate in fallthrough
/// only while opening; once a stream has been handed out, failures stay
/// inside it.
pub trait CompletionTier: Send + Sync {
    fn name(&self) -> &'static str;
    fn open<'a>(&'a self, system_prompt: &'a str, history: &'a [ChatMessage])
    -> CompletionFuture<'a>;
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion api key is not configured")]
    MissingApiKey,
    #[error("completion request timed out")]
    Timeout,
    #[error("completion backend request failed: {0}")]
    Backend(String),
    #[error("completion backend returned an invalid payload: {0}")]
    InvalidPayload(String),
    #[error("failed to build completion http client: {0}")]
    HttpClient(String),
}

/// Resolved backend access: a validated variant of [`CompletionConfig`]
/// where the API key is known to be present.
#[derive(Debug, Clone)]
pub struct CompletionBackend {
    pub chat_completions_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub non_stream_timeout: Duration,
}

impl CompletionBackend {
    pub fn from_config(config: &CompletionConfig) -> Result<Self, CompletionError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(CompletionError::MissingApiKey)?;

        Ok(Self {
            chat_completions_url: config.chat_completions_url(),
            api_key: api_key.to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            non_stream_timeout: Duration::from_millis(config.non_stream_timeout_ms),
        })
    }

    pub(crate) fn request_body(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        stream: bool,
    ) -> Value {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::new(ChatRole::System, system_prompt));
        messages.extend(history.iter().cloned());

        json!({
            "model": self.model,
            "stream": stream,
            "messages": messages,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        })
    }
}

/// Encodes one event as wire text; `End` carries no bytes of its own.
pub fn encode_event(event: &ChatEvent) -> Option<String> {
    match event {
        ChatEvent::Token(token) => Some(token.clone()),
        ChatEvent::SuggestedProducts(products) => serde_json::to_string(products)
            .ok()
            .map(|payload| format!("\n\n{SUGGESTED_PRODUCTS_TAG} {payload}")),
        ChatEvent::NextSuggestions(items) => serde_json::to_string(items)
            .ok()
            .map(|payload| format!("\n\n{NEXT_SUGGESTIONS_TAG} {payload}")),
        ChatEvent::End => None,
    }
}

/// Adapts an mpsc receiver into a stream; the stream ends when every sender
/// is gone.
pub(crate) fn channel_stream<T: Send + 'static>(
    receiver: mpsc::Receiver<T>,
) -> impl Stream<Item = T> + Send {
    futures_util::stream::unfold(receiver, |mut receiver| async move {
        receiver.recv().await.map(|item| (item, receiver))
    })
}
