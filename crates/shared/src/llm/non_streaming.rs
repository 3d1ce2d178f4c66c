use serde::Deserialize;
use tokio::time::timeout;

use crate::models::ChatMessage;

use super::gateway::{
    CompletionBackend, CompletionError, CompletionFuture, CompletionReply, CompletionTier,
};

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ResponseChoice>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Last tier: one bounded `stream: false` request returning the whole reply
/// at once. The outer timeout covers the full request, not just connect.
pub struct NonStreamingCompletionTier {
    client: reqwest::Client,
    backend: CompletionBackend,
}

impl NonStreamingCompletionTier {
    pub fn new(backend: CompletionBackend) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(backend.non_stream_timeout)
            .build()
            .map_err(|err| CompletionError::HttpClient(err.to_string()))?;

        Ok(Self { client, backend })
    }
}

impl CompletionTier for NonStreamingCompletionTier {
    fn name(&self) -> &'static str {
        "non-streaming"
    }

    fn open<'a>(
        &'a self,
        system_prompt: &'a str,
        history: &'a [ChatMessage],
    ) -> CompletionFuture<'a> {
        Box::pin(async move {
            let body = self.backend.request_body(system_prompt, history, false);
            let request = self
                .client
                .post(&self.backend.chat_completions_url)
                .bearer_auth(&self.backend.api_key)
                .json(&body)
                .send();

            let response = timeout(self.backend.non_stream_timeout, request)
                .await
                .map_err(|_| CompletionError::Timeout)?
                .map_err(|err| {
                    if err.is_timeout() {
                        CompletionError::Timeout
                    } else {
                        CompletionError::Backend(err.to_string())
                    }
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(CompletionError::Backend(format!(
                    "status={}",
                    status.as_u16()
                )));
            }

            let parsed: ChatCompletionResponse = response
                .json()
                .await
                .map_err(|err| CompletionError::InvalidPayload(err.to_string()))?;

            let content = parsed
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .unwrap_or_default();

            Ok(CompletionReply::Full(content))
        })
    }
}
