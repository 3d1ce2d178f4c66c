pub mod cache;
pub mod catalog;
pub mod composer;
pub mod fetcher;
mod html;

pub use cache::KnowledgeCache;
pub use catalog::{CatalogError, CatalogFuture, ChatbotCatalog, ChatbotRecord, ProductRecord};
pub use composer::{ComposedContext, KnowledgeBasePayload, KnowledgeComposer};
pub use fetcher::{KnowledgeFetcher, KnowledgeFetcherBuildError};

pub(crate) fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn truncate_chars(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}
