use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::warn;

use crate::models::ChatMessage;

use super::gateway::{
    CompletionBackend, CompletionError, CompletionFuture, CompletionReply, CompletionTier,
    TokenStream, channel_stream,
};
use super::sse::{SSE_DONE, SseBuffer};

const TOKEN_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Debug, Deserialize, Default)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Primary tier: structured streaming client. Frames are decoded into typed
/// chunk structs; malformed frames are skipped with a warning rather than
/// killing the stream.
pub struct StreamingCompletionTier {
    client: reqwest::Client,
    backend: CompletionBackend,
}

impl StreamingCompletionTier {
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
                    if !forward_frame(&payload, &tx).await {
                        return;
                    }
                }
            }

            // Backends may close without a trailing newline after the last
            // frame; whatever is still buffered is a complete line now.
            if let Some(payload) = buffer.finish()
                && payload != SSE_DONE
            {
                forward_frame(&payload, &tx).await;
            }
        });

        Box::pin(channel_stream(rx))
    }
}

/// Decodes one frame and forwards its delta. Returns `false` once the
/// receiver is gone; malformed frames are skipped with a warning.
async fn forward_frame(
    payload: &str,
    tx: &mpsc::Sender<Result<String, CompletionError>>,
) -> bool {
    match serde_json::from_str::<ChatCompletionChunk>(payload) {
        Ok(parsed) => {
            let delta = parsed
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta.content);
            if let Some(content) = delta
                && !content.is_empty()
            {
                return tx.send(Ok(content)).await.is_ok();
            }
            true
        }
        Err(err) => {
            warn!("skipping malformed completion chunk: {err}");
            true
        }
    }
}

impl CompletionTier for StreamingCompletionTier {
    fn name(&self) -> &'static str {
        "streaming"
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
                .bearer_auth(&self.backend.api_key)
                .json(&body)
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
