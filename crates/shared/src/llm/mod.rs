pub mod gateway;
pub mod non_streaming;
pub mod orchestrator;
pub mod raw;
mod sse;
pub mod streaming;

pub use gateway::{
    ChatEvent, ChatEventStream, CompletionBackend, CompletionError, CompletionFuture,
    CompletionReply, CompletionTier, NEXT_SUGGESTIONS_TAG, SUGGESTED_PRODUCTS_TAG, TokenStream,
    encode_event,
};
pub use non_streaming::NonStreamingCompletionTier;
pub use orchestrator::{
    ChatTurnOutcome, CompletionOrchestrator, EMPTY_REPLY_FALLBACK, SuggestionContext,
    TIMEOUT_FALLBACK,
};
pub use raw::RawSseCompletionTier;
pub use streaming::StreamingCompletionTier;
