use tracing::warn;

use crate::config::KnowledgeConfig;
use crate::models::ProductSummary;

use super::catalog::{CatalogError, ChatbotCatalog, ChatbotRecord, ProductRecord};
use super::{KnowledgeFetcher, truncate_chars};

const MAX_PRODUCT_DESCRIPTION_CHARS: usize = 400;
const KNOWLEDGE_HINT_MAX_CHARS: usize = 600;

const KNOWLEDGE_BASE_BEGIN: &str = "=== KNOWLEDGE BASE START ===";
const KNOWLEDGE_BASE_END: &str = "=== KNOWLEDGE BASE END ===";
const NO_KNOWLEDGE_MARKER: &str = "NO KNOWLEDGE BASE PROVIDED";

/// Per-request knowledge context. Never persisted.
#[derive(Debug, Clone)]
pub struct KnowledgeBasePayload {
    pub policy_text: String,
    pub url_excerpt: String,
    pub products: Vec<ProductSummary>,
}

impl KnowledgeBasePayload {
    /// The excerpt slot holds either operator-authored text or fetched page
    /// text, never both.
    pub fn excerpt(&self) -> &str {
        if self.policy_text.is_empty() {
            &self.url_excerpt
        } else {
            &self.policy_text
        }
    }

    /// Short knowledge sample handed to the next-suggestion service.
    pub fn hint(&self) -> String {
        truncate_chars(self.excerpt(), KNOWLEDGE_HINT_MAX_CHARS)
    }
}

#[derive(Debug, Clone)]
pub struct ComposedContext {
    pub chatbot: ChatbotRecord,
    pub payload: KnowledgeBasePayload,
    pub system_prompt: String,
}

/// Merges static operator text, fetched URL content and the tenant's product
/// catalog into one bounded prompt context.
pub struct KnowledgeComposer {
    fetcher: KnowledgeFetcher,
    config: KnowledgeConfig,
}

impl KnowledgeComposer {
    pub fn new(fetcher: KnowledgeFetcher, config: KnowledgeConfig) -> Self {
        Self { fetcher, config }
    }

    /// Builds the knowledge payload and system prompt for one chat turn.
    /// Returns `None` when the chatbot does not exist. Product lookup
    /// failures degrade to an empty catalog; missing knowledge must not
    /// fail the turn.
    pub async fn compose(
        &self,
        catalog: &dyn ChatbotCatalog,
        chatbot_id: i64,
    ) -> Result<Option<ComposedContext>, CatalogError> {
        let Some(chatbot) = catalog.load_chatbot(chatbot_id).await? else {
            return Ok(None);
        };

        let policy_text = truncate_chars(
            chatbot.knowledge_base_text.trim(),
            self.config.max_context_chars,
        );

        // Operator-authored text wins outright: the URL fetch is skipped
        // entirely when static text already fills the slot.
        let url_excerpt = if policy_text.is_empty() {
            self.fetcher
                .fetch(&chatbot.knowledge_base_url, self.config.max_context_chars)
                .await
        } else {
            String::new()
        };

        let products = match catalog.list_products(chatbot_id).await {
            Ok(records) => records.iter().map(project_product).collect(),
            Err(err) => {
                warn!("product catalog lookup failed for chatbot {chatbot_id}: {err}");
                Vec::new()
            }
        };

        let payload = KnowledgeBasePayload {
            policy_text,
            url_excerpt,
            products,
        };
        let system_prompt = render_system_prompt(&chatbot, &payload);

        Ok(Some(ComposedContext {
            chatbot,
            payload,
            system_prompt,
        }))
    }
}

fn project_product(record: &ProductRecord) -> ProductSummary {
    ProductSummary {
        name: record.name.clone(),
        description: truncate_chars(&record.description, MAX_PRODUCT_DESCRIPTION_CHARS),
        price: record.price.clone(),
        product_url: record.product_url.clone(),
        image_url: record.image_url.clone(),
        button_text: record.button_text.clone(),
    }
}

fn render_system_prompt(chatbot: &ChatbotRecord, payload: &KnowledgeBasePayload) -> String {
    let mut prompt = format!(
        "You are \"{}\", the AI shopping assistant of this store's chat widget.\n\n",
        chatbot.name
    );

    let excerpt = payload.excerpt();
    prompt.push_str(KNOWLEDGE_BASE_BEGIN);
    prompt.push('\n');
    if excerpt.is_empty() {
        prompt.push_str(NO_KNOWLEDGE_MARKER);
    } else {
        prompt.push_str(excerpt);
    }
    prompt.push('\n');
    prompt.push_str(KNOWLEDGE_BASE_END);
    prompt.push('\n');

    if !payload.products.is_empty() {
        prompt.push_str("\nPRODUCT CATALOG:\n");
        for product in &payload.products {
            prompt.push_str(&format!(
                "- {} | {} | {}\n",
                product.name, product.price, product.description
            ));
        }
    }

    if !chatbot.store_url.trim().is_empty() {
        prompt.push_str(&format!("\nStore page: {}\n", chatbot.store_url.trim()));
    }

    prompt.push_str(&format!(
        "\nResponse guidelines:\n\
         1. Always answer in the customer's language ({}).\n\
         2. Prefer facts from the knowledge base and product catalog over general knowledge.\n\
         3. For greetings and small talk, reply briefly and conversationally.\n\
         4. When the knowledge base does not cover a question, say so and point the customer \
         to the store page or to opening a support ticket.\n\
         5. Keep answers concise and never invent product details or prices.\n",
        chatbot.language
    ));

    prompt
}
