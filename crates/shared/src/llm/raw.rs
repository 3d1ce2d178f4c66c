use futures_util::StreamExt;
use reqwest::header;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::models::ChatMessage;

use super::gateway::{
    CompletionBackend, CompletionError, CompletionFuture, CompletionReply, CompletionTier,
    TokenStream, channel_stream,
};
use super::sse::{SSE_DONE, SseBuffer};

const TOKEN_CHANNEL_CAPACITY: usize = 64;

/// Second tier: a deliberately plain SSE request. The request is assembled
/// by hand (explicit `Authorization` header, no typed response structs) so
/// it keeps working when the structured client trips over backend quirks.
pub struct RawSseCompletionTier {
    client: reqwest::Client,
    backend: CompletionBackend,
}

impl RawSseCompletionTier {
    pub fn new(backend: CompletionBackend) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|err| CompletionError::HttpClient(err.to_string()))?;

        Ok(Self { client, backend })
    }

    fn spawn_reader(&self, response: reqwest::Response) -> TokenStream {
        let (tx, rx) = mpsc::channel::<Result<String, CompletionError>>(TOKEN_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut buffer = SseBuffer::default();

            while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        let _ = tx
                            .send(Err(CompletionError::Backend(err.to_string())))
                            .await;
                        return;
                    }
                };

                for payload in buffer.push(&chunk) {
                    if payload == SSE_DONE {
                        return;
                    }
                    let Some(delta) = delta_text(&payload) else {
                        continue;
                    };
                    if !delta.is_empty() && tx.send(Ok(delta)).await.is_err() {
                        return;
                    }
                }
            }

            // A final frame without a trailing newline still counts.
            if let Some(payload) = buffer.finish()
                && payload != SSE_DONE
                && let Some(delta) = delta_text(&payload)
                && !delta.is_empty()
            {
                let _ = tx.send(Ok(delta)).await;
            }
        });

        Box::pin(channel_stream(rx))
    }
}

fn delta_text(payload: &str) -> Option<String> {
    let value: Value = serde_json::from_str(payload).ok()?;
    value["choices"][0]["delta"]["content"]
        .as_str()
        .map(ToString::to_string)
}

impl CompletionTier for RawSseCompletionTier {
    fn name(&self) -> &'static str {
        "raw-sse"
    }

    fn open<'a>(
        &'a self,
        system_prompt: &'a str,
        history: &'a [ChatMessage],
    ) -> CompletionFuture<'a> {
        Box::pin(async move {
            let body = self.backend.request_body(system_prompt, history, true);
            let response = self
                .client
                .post(&self.backend.chat_completions_url)
                .header(
                    header::AUTHORIZATION,
                    format!("Bearer {}", self.backend.api_key),
                )
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::ACCEPT, "text/event-stream")
                .body(body.to_string())
                .send()
                .await
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

            Ok(CompletionReply::Stream(self.spawn_reader(response)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulls_delta_text_out_of_untyped_json() {
        let payload = r#"{"choices":[{"delta":{"content":"سلام"}}]}"#;
        assert_eq!(delta_text(payload).as_deref(), Some("سلام"));
    }

    #[test]
    fn tolerates_frames_without_content() {
        assert_eq!(delta_text(r#"{"choices":[{"delta":{}}]}"#), None);
        assert_eq!(delta_text("not json"), None);
    }
}
