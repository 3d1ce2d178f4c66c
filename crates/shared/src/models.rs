use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Body of the widget's chat request. Field names are camelCase because the
/// embeddable widget client is JavaScript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurnRequest {
    #[serde(rename = "chatbotId")]
    pub chatbot_id: i64,
    pub messages: Vec<ChatMessage>,
}

/// Read-only projection of a tenant's catalog entry, as embedded in prompts
/// and in the `SUGGESTED_PRODUCTS` suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub name: String,
    pub description: String,
    pub price: String,
    #[serde(rename = "productUrl")]
    pub product_url: String,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
    #[serde(rename = "buttonText")]
    pub button_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextSuggestion {
    pub text: String,
    pub emoji: String,
}

/// Non-streaming reply envelope. The widget distinguishes this from the
/// chunked text stream by the response content type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextFallbackResponse {
    #[serde(rename = "textFallback")]
    pub text_fallback: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}
