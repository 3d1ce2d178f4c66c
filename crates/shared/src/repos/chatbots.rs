use sqlx::Row;
use sqlx::postgres::PgRow;

use crate::knowledge::catalog::{
    CatalogError, CatalogFuture, ChatbotCatalog, ChatbotRecord, ProductRecord,
};

use super::Store;

fn chatbot_from_row(row: &PgRow) -> ChatbotRecord {
    ChatbotRecord {
        id: row.get("id"),
        name: row.get("name"),
        language: row.get("language"),
        knowledge_base_text: row.get("knowledge_base_text"),
        knowledge_base_url: row.get("knowledge_base_url"),
        store_url: row.get("store_url"),
    }
}

fn product_from_row(row: &PgRow) -> ProductRecord {
    ProductRecord {
        name: row.get("name"),
        description: row.get("description"),
        price: row.get("price"),
        product_url: row.get("product_url"),
        image_url: row.get("image_url"),
        button_text: row.get("button_text"),
    }
}

impl ChatbotCatalog for Store {
    fn load_chatbot(&self, chatbot_id: i64) -> CatalogFuture<'_, Option<ChatbotRecord>> {
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT id, name, language, knowledge_base_text, knowledge_base_url, store_url \
                 FROM chatbots WHERE id = $1",
            )
            .bind(chatbot_id)
            .fetch_optional(self.pool())
            .await
            .map_err(|err| CatalogError::Lookup(err.to_string()))?;

            Ok(row.as_ref().map(chatbot_from_row))
        })
    }

    fn list_products(&self, chatbot_id: i64) -> CatalogFuture<'_, Vec<ProductRecord>> {
        Box::pin(async move {
            let rows = sqlx::query(
                "SELECT name, description, price, product_url, image_url, button_text \
                 FROM products WHERE chatbot_id = $1 ORDER BY position ASC, id ASC",
            )
            .bind(chatbot_id)
            .fetch_all(self.pool())
            .await
            .map_err(|err| CatalogError::Lookup(err.to_string()))?;

            Ok(rows.iter().map(product_from_row).collect())
        })
    }
}
