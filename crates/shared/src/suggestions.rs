use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::models::{NextSuggestion, ProductSummary};

/// At most this many suggested products are ever incorporated into a reply.
pub const MAX_SUGGESTED_PRODUCTS: usize = 4;

pub const DEFAULT_SUGGESTION_EMOJI: &str = "💬";

pub type SuggestionFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, SuggestionError>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum SuggestionError {
    #[error("suggestion request failed: {0}")]
    Request(String),
    #[error("suggestion response was invalid: {0}")]
    InvalidPayload(String),
    #[error("failed to build suggestion http client: {0}")]
    HttpClient(String),
}

/// Product candidates for the `SUGGESTED_PRODUCTS` suffix, keyed by the last
/// user message. A black box beyond this contract.
pub trait ProductSuggester: Send + Sync {
    fn suggest<'a>(
        &'a self,
        chatbot_id: i64,
        user_query: &'a str,
    ) -> SuggestionFuture<'a, Vec<ProductSummary>>;
}

/// Follow-up prompts for the `NEXT_SUGGESTIONS` suffix, keyed by the
/// finished assistant text and a knowledge sample.
pub trait NextSuggester: Send + Sync {
    fn suggest_next<'a>(
        &'a self,
        assistant_text: &'a str,
        knowledge_hint: &'a str,
    ) -> SuggestionFuture<'a, Vec<NextSuggestion>>;
}

#[derive(Debug, Deserialize)]
struct NextSuggestionsEnvelope {
    #[serde(default)]
    suggestions: Vec<String>,
}

/// Calls the sibling suggestion endpoints of this application.
pub struct HttpSuggestionClient {
    client: reqwest::Client,
    app_base_url: String,
}

impl HttpSuggestionClient {
    pub fn new(app_base_url: &str, timeout: Duration) -> Result<Self, SuggestionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| SuggestionError::HttpClient(err.to_string()))?;

        Ok(Self {
            client,
            app_base_url: app_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.app_base_url)
    }
}

impl ProductSuggester for HttpSuggestionClient {
    fn suggest<'a>(
        &'a self,
        chatbot_id: i64,
        user_query: &'a str,
    ) -> SuggestionFuture<'a, Vec<ProductSummary>> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.endpoint("/internal/suggest-products"))
                .json(&json!({ "chatbotId": chatbot_id, "query": user_query }))
                .send()
                .await
                .map_err(|err| SuggestionError::Request(err.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(SuggestionError::Request(format!(
                    "status={}",
                    status.as_u16()
                )));
            }

            let mut products: Vec<ProductSummary> = response
                .json()
                .await
                .map_err(|err| SuggestionError::InvalidPayload(err.to_string()))?;
            products.truncate(MAX_SUGGESTED_PRODUCTS);
            Ok(products)
        })
    }
}

impl NextSuggester for HttpSuggestionClient {
    fn suggest_next<'a>(
        &'a self,
        assistant_text: &'a str,
        knowledge_hint: &'a str,
    ) -> SuggestionFuture<'a, Vec<NextSuggestion>> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.endpoint("/internal/next-suggestions"))
                .json(&json!({
                    "assistantText": assistant_text,
                    "knowledgeHint": knowledge_hint,
                }))
                .send()
                .await
                .map_err(|err| SuggestionError::Request(err.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(SuggestionError::Request(format!(
                    "status={}",
                    status.as_u16()
                )));
            }

            let envelope: NextSuggestionsEnvelope = response
                .json()
                .await
                .map_err(|err| SuggestionError::InvalidPayload(err.to_string()))?;

            Ok(envelope
                .suggestions
                .iter()
                .filter_map(|raw| parse_next_suggestion(raw))
                .collect())
        })
    }
}

/// Splits a raw suggestion line into emoji and text. The head counts as an
/// emoji only when it has no alphanumeric and no ASCII characters; otherwise
/// the whole line is text behind the default emoji.
pub fn parse_next_suggestion(raw: &str) -> Option<NextSuggestion> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some((head, tail)) = trimmed.split_once(char::is_whitespace) {
        let tail = tail.trim();
        if looks_like_emoji(head) && !tail.is_empty() {
            return Some(NextSuggestion {
                text: tail.to_string(),
                emoji: head.to_string(),
            });
        }
    }

    Some(NextSuggestion {
        text: trimmed.to_string(),
        emoji: DEFAULT_SUGGESTION_EMOJI.to_string(),
    })
}

fn looks_like_emoji(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|ch| !ch.is_ascii() && !ch.is_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_leading_emoji_from_text() {
        let parsed = parse_next_suggestion("🚚 هزینه ارسال چقدر است؟").expect("suggestion");
        assert_eq!(parsed.emoji, "🚚");
        assert_eq!(parsed.text, "هزینه ارسال چقدر است؟");
    }

    #[test]
    fn substitutes_default_emoji_when_missing() {
        let parsed = parse_next_suggestion("شرایط بازگشت کالا").expect("suggestion");
        assert_eq!(parsed.emoji, DEFAULT_SUGGESTION_EMOJI);
        assert_eq!(parsed.text, "شرایط بازگشت کالا");
    }

    #[test]
    fn latin_word_head_is_not_an_emoji() {
        let parsed = parse_next_suggestion("How do returns work?").expect("suggestion");
        assert_eq!(parsed.emoji, DEFAULT_SUGGESTION_EMOJI);
        assert_eq!(parsed.text, "How do returns work?");
    }

    #[test]
    fn drops_blank_lines() {
        assert_eq!(parse_next_suggestion("   "), None);
    }
}
