use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header;
use thiserror::Error;
use tracing::warn;

use super::html::strip_html;
use super::{KnowledgeCache, truncate_chars};

const KNOWLEDGE_USER_AGENT: &str = "chatbot-knowledge-fetcher/1.0";
const KNOWLEDGE_ACCEPT: &str = "text/html, text/plain;q=0.9, */*;q=0.1";

#[derive(Debug, Error)]
pub enum KnowledgeFetcherBuildError {
    #[error("failed to build knowledge http client: {0}")]
    HttpClient(String),
}

/// Retrieves remote knowledge pages, reduces them to bounded plain text and
/// remembers the result per URL. Every failure degrades to empty content:
/// a missing knowledge source must never fail a chat turn.
pub struct KnowledgeFetcher {
    client: reqwest::Client,
    cache: Arc<KnowledgeCache>,
}

impl KnowledgeFetcher {
    pub fn new(
        cache: Arc<KnowledgeCache>,
        timeout: Duration,
    ) -> Result<Self, KnowledgeFetcherBuildError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|err| KnowledgeFetcherBuildError::HttpClient(err.to_string()))?;

        Ok(Self { client, cache })
    }

    pub async fn fetch(&self, url: &str, max_chars: usize) -> String {
        let url = url.trim();
        if url.is_empty() {
            return String::new();
        }

        if let Some(cached) = self.cache.get(url, Instant::now()) {
            return truncate_chars(&cached, max_chars);
        }

        let response = match self
            .client
            .get(url)
            .header(header::USER_AGENT, KNOWLEDGE_USER_AGENT)
            .header(header::ACCEPT, KNOWLEDGE_ACCEPT)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!("knowledge fetch failed for {url}: {err}");
                return String::new();
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!("knowledge fetch for {url} returned status {}", status.as_u16());
            return String::new();
        }

        let is_html = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|content_type| content_type.contains("html"));

        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                warn!("knowledge fetch body read failed for {url}: {err}");
                return String::new();
            }
        };

        let cleaned = if is_html {
            strip_html(&body)
        } else {
            body.trim().to_string()
        };

        let capped = truncate_chars(&cleaned, max_chars);
        self.cache.put(url, capped.clone(), Instant::now());
        capped
    }
}
