use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

pub type CatalogFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CatalogError>> + Send + 'a>>;

/// One configured chatbot instance, as read from the tenant configuration
/// store. The pipeline never writes these.
#[derive(Debug, Clone)]
pub struct ChatbotRecord {
    pub id: i64,
    pub name: String,
    pub language: String,
    pub knowledge_base_text: String,
    pub knowledge_base_url: String,
    pub store_url: String,
}

#[derive(Debug, Clone)]
pub struct ProductRecord {
    pub name: String,
    pub description: String,
    pub price: String,
    pub product_url: String,
    pub image_url: String,
    pub button_text: String,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog lookup failed: {0}")]
    Lookup(String),
}

/// Read seam over the relational configuration store. The store itself is an
/// external collaborator; only these two reads matter to the pipeline.
pub trait ChatbotCatalog: Send + Sync {
    fn load_chatbot(&self, chatbot_id: i64) -> CatalogFuture<'_, Option<ChatbotRecord>>;
    fn list_products(&self, chatbot_id: i64) -> CatalogFuture<'_, Vec<ProductRecord>>;
}
