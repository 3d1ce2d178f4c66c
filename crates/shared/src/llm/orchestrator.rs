use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::warn;

use crate::config::CompletionConfig;
use crate::models::{ChatMessage, NextSuggestion, ProductSummary};
use crate::suggestions::{MAX_SUGGESTED_PRODUCTS, NextSuggester, ProductSuggester};

use super::gateway::{
    ChatEvent, ChatEventStream, CompletionBackend, CompletionError, CompletionReply,
    CompletionTier, TokenStream, channel_stream, encode_event,
};
use super::non_streaming::NonStreamingCompletionTier;
use super::raw::RawSseCompletionTier;
use super::streaming::StreamingCompletionTier;

/// Shown when a tier completed without producing any content.
pub const EMPTY_REPLY_FALLBACK: &str = "پاسخی دریافت نشد. لطفاً دوباره تلاش کنید.";

/// Shown when every tier failed; the user still gets a reply, never an error.
pub const TIMEOUT_FALLBACK: &str = "زمان انتظار تمام شد";

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Inputs for the post-content suggestion calls.
#[derive(Debug, Clone)]
pub struct SuggestionContext {
    pub chatbot_id: i64,
    pub last_user_message: String,
    pub knowledge_hint: String,
}

/// Exactly one variant reaches the client per turn; the HTTP layer maps
/// `Stream` to a chunked text response and `TextFallback` to a JSON
/// envelope.
pub enum ChatTurnOutcome {
    Stream(ChatEventStream),
    TextFallback(String),
}

impl std::fmt::Debug for ChatTurnOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream(_) => f.debug_tuple("Stream").finish(),
            Self::TextFallback(text) => f.debug_tuple("TextFallback").field(text).finish(),
        }
    }
}

/// Runs the tier chain and folds suggestion results into the outgoing
/// event stream once the main content is finalized.
pub struct CompletionOrchestrator {
    tiers: Vec<Arc<dyn CompletionTier>>,
    product_suggester: Arc<dyn ProductSuggester>,
    next_suggester: Arc<dyn NextSuggester>,
}

impl CompletionOrchestrator {
    /// Builds the production tier chain. Fails up front when the API key is
    /// absent so misconfiguration surfaces at startup, not mid-conversation.
    pub fn new(
        config: &CompletionConfig,
        product_suggester: Arc<dyn ProductSuggester>,
        next_suggester: Arc<dyn NextSuggester>,
    ) -> Result<Self, CompletionError> {
        let backend = CompletionBackend::from_config(config)?;
        let tiers: Vec<Arc<dyn CompletionTier>> = vec![
            Arc::new(StreamingCompletionTier::new(backend.clone())?),
            Arc::new(RawSseCompletionTier::new(backend.clone())?),
            Arc::new(NonStreamingCompletionTier::new(backend)?),
        ];

        Ok(Self {
            tiers,
            product_suggester,
            next_suggester,
        })
    }

    /// Test and extension seam: run an arbitrary ordered tier chain.
    pub fn with_tiers(
        tiers: Vec<Arc<dyn CompletionTier>>,
        product_suggester: Arc<dyn ProductSuggester>,
        next_suggester: Arc<dyn NextSuggester>,
    ) -> Self {
        Self {
            tiers,
            product_suggester,
            next_suggester,
        }
    }

    /// Attempts each tier in order and commits to the first one that opens.
    /// Never returns an error: the worst case is a text fallback.
    pub async fn run(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        ctx: SuggestionContext,
    ) -> ChatTurnOutcome {
        for tier in &self.tiers {
            match tier.open(system_prompt, history).await {
                Ok(CompletionReply::Stream(tokens)) => {
                    return ChatTurnOutcome::Stream(self.pump(tokens, ctx));
                }
                Ok(CompletionReply::Full(text)) => {
                    let content = if text.trim().is_empty() {
                        EMPTY_REPLY_FALLBACK.to_string()
                    } else {
                        text
                    };
                    return ChatTurnOutcome::TextFallback(
                        self.append_suffixes(content, &ctx).await,
                    );
                }
                Err(err) => {
                    warn!("completion tier '{}' failed to open: {err}", tier.name());
                }
            }
        }

        ChatTurnOutcome::TextFallback(TIMEOUT_FALLBACK.to_string())
    }

    /// Forwards tokens as they arrive, then appends suggestion events.
    /// Mid-stream errors keep whatever was already delivered; the apology
    /// sentence appears only when nothing was.
    fn pump(&self, mut tokens: TokenStream, ctx: SuggestionContext) -> ChatEventStream {
        let (tx, rx) = mpsc::channel::<ChatEvent>(EVENT_CHANNEL_CAPACITY);
        let product_suggester = Arc::clone(&self.product_suggester);
        let next_suggester = Arc::clone(&self.next_suggester);

        tokio::spawn(async move {
            let mut accumulated = String::new();

            while let Some(item) = tokens.next().await {
                match item {
                    Ok(token) if token.is_empty() => {}
                    Ok(token) => {
                        accumulated.push_str(&token);
                        if tx.send(ChatEvent::Token(token)).await.is_err() {
                            return;
                        }
                    }
                    Err(err) => {
                        warn!("token stream interrupted: {err}");
                        break;
                    }
                }
            }

            if accumulated.is_empty() {
                accumulated = EMPTY_REPLY_FALLBACK.to_string();
                if tx
                    .send(ChatEvent::Token(accumulated.clone()))
                    .await
                    .is_err()
                {
                    return;
                }
            }

            let (products, next_steps) = tokio::join!(
                suggest_products(
                    product_suggester.as_ref(),
                    ctx.chatbot_id,
                    &ctx.last_user_message
                ),
                suggest_next(next_suggester.as_ref(), &accumulated, &ctx.knowledge_hint),
            );

            if !products.is_empty() {
                let _ = tx.send(ChatEvent::SuggestedProducts(products)).await;
            }
            if !next_steps.is_empty() {
                let _ = tx.send(ChatEvent::NextSuggestions(next_steps)).await;
            }
            let _ = tx.send(ChatEvent::End).await;
        });

        Box::pin(channel_stream(rx))
    }

    /// Non-streaming path: the suffixes are appended to the text itself
    /// because this reply travels as a single JSON envelope, not a stream.
    async fn append_suffixes(&self, content: String, ctx: &SuggestionContext) -> String {
        let (products, next_steps) = tokio::join!(
            suggest_products(
                self.product_suggester.as_ref(),
                ctx.chatbot_id,
                &ctx.last_user_message
            ),
            suggest_next(self.next_suggester.as_ref(), &content, &ctx.knowledge_hint),
        );

        let mut out = content;
        if !products.is_empty()
            && let Some(suffix) = encode_event(&ChatEvent::SuggestedProducts(products))
        {
            out.push_str(&suffix);
        }
        if !next_steps.is_empty()
            && let Some(suffix) = encode_event(&ChatEvent::NextSuggestions(next_steps))
        {
            out.push_str(&suffix);
        }
        out
    }
}

async fn suggest_products(
    suggester: &dyn ProductSuggester,
    chatbot_id: i64,
    user_query: &str,
) -> Vec<ProductSummary> {
    match suggester.suggest(chatbot_id, user_query).await {
        Ok(mut products) => {
            products.truncate(MAX_SUGGESTED_PRODUCTS);
            products
        }
        Err(err) => {
            warn!("product suggestion failed: {err}");
            Vec::new()
        }
    }
}

async fn suggest_next(
    suggester: &dyn NextSuggester,
    assistant_text: &str,
    knowledge_hint: &str,
) -> Vec<NextSuggestion> {
    match suggester.suggest_next(assistant_text, knowledge_hint).await {
        Ok(items) => items,
        Err(err) => {
            warn!("next-suggestion fetch failed: {err}");
            Vec::new()
        }
    }
}
