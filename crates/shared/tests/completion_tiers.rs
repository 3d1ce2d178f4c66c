use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::post;
use futures_util::StreamExt;
use shared::llm::{
    CompletionBackend, CompletionError, CompletionReply, CompletionTier, NonStreamingCompletionTier,
    RawSseCompletionTier, StreamingCompletionTier,
};
use shared::models::{ChatMessage, ChatRole};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};

#[derive(Debug, Clone)]
struct MockReply {
    status: StatusCode,
    content_type: &'static str,
    body: String,
}

#[derive(Clone)]
struct TestServerState {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    seen_auth_headers: Arc<Mutex<Vec<String>>>,
}

impl TestServerState {
    fn with_replies(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            seen_auth_headers: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[tokio::test]
async fn streaming_tier_parses_sse_frames_into_tokens() {
    let state = TestServerState::with_replies(vec![sse_reply(&[
        r#"{"choices":[{"delta":{"content":"سلام"}}]}"#,
        r#"{"choices":[{"delta":{"content":"! خوش آمدید"}}]}"#,
        r#"{"choices":[{"delta":{}}]}"#,
        "[DONE]",
    ])]);
    let (url, shutdown_tx, server_task) = spawn_test_server(state.clone()).await;

    let tier = StreamingCompletionTier::new(backend_for(url)).expect("tier should build");
    let reply = tier
        .open("system prompt", &history())
        .await
        .expect("open should succeed");
    let tokens = collect_tokens(reply).await;

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert_eq!(tokens, vec!["سلام".to_string(), "! خوش آمدید".to_string()]);

    let seen_auth_headers = state.seen_auth_headers.lock().await.clone();
    assert_eq!(seen_auth_headers, vec!["Bearer test-key".to_string()]);
}

#[tokio::test]
async fn streaming_tier_skips_malformed_frames() {
    let state = TestServerState::with_replies(vec![sse_reply(&[
        "this is not json",
        r#"{"choices":[{"delta":{"content":"هنوز کار می‌کند"}}]}"#,
        "[DONE]",
    ])]);
    let (url, shutdown_tx, server_task) = spawn_test_server(state).await;

    let tier = StreamingCompletionTier::new(backend_for(url)).expect("tier should build");
    let reply = tier
        .open("system prompt", &history())
        .await
        .expect("open should succeed");
    let tokens = collect_tokens(reply).await;

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert_eq!(tokens, vec!["هنوز کار می‌کند".to_string()]);
}

#[tokio::test]
async fn streaming_tier_flushes_a_final_frame_without_a_trailing_newline() {
    let mut body = String::from("data: {\"choices\":[{\"delta\":{\"content\":\"تقریباً\"}}]}\n\n");
    // The backend closes the body right after the last frame, no newline
    // and no [DONE] sentinel.
    body.push_str("data: {\"choices\":[{\"delta\":{\"content\":\" تمام\"}}]}");
    let state = TestServerState::with_replies(vec![MockReply {
        status: StatusCode::OK,
        content_type: "text/event-stream",
        body,
    }]);
    let (url, shutdown_tx, server_task) = spawn_test_server(state).await;

    let tier = StreamingCompletionTier::new(backend_for(url)).expect("tier should build");
    let reply = tier
        .open("system prompt", &history())
        .await
        .expect("open should succeed");
    let tokens = collect_tokens(reply).await;

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert_eq!(tokens, vec!["تقریباً".to_string(), " تمام".to_string()]);
}

#[tokio::test]
async fn streaming_tier_reports_error_status_at_open_time() {
    let state = TestServerState::with_replies(vec![MockReply {
        status: StatusCode::SERVICE_UNAVAILABLE,
        content_type: "application/json",
        body: r#"{"error":{"code":"overloaded"}}"#.to_string(),
    }]);
    let (url, shutdown_tx, server_task) = spawn_test_server(state).await;

    let tier = StreamingCompletionTier::new(backend_for(url)).expect("tier should build");
    let err = tier
        .open("system prompt", &history())
        .await
        .expect_err("error status should fail the open");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert!(
        matches!(err, CompletionError::Backend(ref message) if message.contains("status=503")),
        "expected backend error with status, got {err:?}"
    );
}

#[tokio::test]
async fn raw_tier_pulls_tokens_out_of_untyped_frames() {
    let state = TestServerState::with_replies(vec![sse_reply(&[
        r#"{"choices":[{"delta":{"content":"پاسخ"}}]}"#,
        r#"{"unexpected":"shape"}"#,
        r#"{"choices":[{"delta":{"content":" خام"}}]}"#,
        "[DONE]",
    ])]);
    let (url, shutdown_tx, server_task) = spawn_test_server(state).await;

    let tier = RawSseCompletionTier::new(backend_for(url)).expect("tier should build");
    let reply = tier
        .open("system prompt", &history())
        .await
        .expect("open should succeed");
    let tokens = collect_tokens(reply).await;

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert_eq!(tokens, vec!["پاسخ".to_string(), " خام".to_string()]);
}

#[tokio::test]
async fn non_streaming_tier_returns_the_whole_reply() {
    let state = TestServerState::with_replies(vec![MockReply {
        status: StatusCode::OK,
        content_type: "application/json",
        body: r#"{"choices":[{"message":{"content":"پاسخ کامل"}}]}"#.to_string(),
    }]);
    let (url, shutdown_tx, server_task) = spawn_test_server(state).await;

    let tier = NonStreamingCompletionTier::new(backend_for(url)).expect("tier should build");
    let reply = tier
        .open("system prompt", &history())
        .await
        .expect("open should succeed");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    match reply {
        CompletionReply::Full(text) => assert_eq!(text, "پاسخ کامل"),
        CompletionReply::Stream(_) => panic!("non-streaming tier must return full text"),
    }
}

#[tokio::test]
async fn non_streaming_tier_times_out_on_a_stalled_backend() {
    let state = TestServerState::with_replies(Vec::new());
    let (url, shutdown_tx, server_task) = spawn_test_server(state).await;

    let mut backend = backend_for(format!("{}-slow", url));
    backend.non_stream_timeout = Duration::from_millis(200);

    let tier = NonStreamingCompletionTier::new(backend).expect("tier should build");
    let err = tier
        .open("system prompt", &history())
        .await
        .expect_err("stalled backend should time out");

    assert!(
        matches!(err, CompletionError::Timeout),
        "expected timeout, got {err:?}"
    );

    // The stalled handler is still sleeping; don't wait for a graceful join.
    let _ = shutdown_tx.send(());
    server_task.abort();
}

fn history() -> Vec<ChatMessage> {
    vec![ChatMessage::new(ChatRole::User, "قیمت ارسال چقدر است؟")]
}

fn backend_for(chat_completions_url: String) -> CompletionBackend {
    CompletionBackend {
        chat_completions_url,
        api_key: "test-key".to_string(),
        model: "test-model".to_string(),
        max_tokens: 512,
        temperature: 0.7,
        non_stream_timeout: Duration::from_secs(5),
    }
}

fn sse_reply(frames: &[&str]) -> MockReply {
    let mut body = String::new();
    for frame in frames {
        body.push_str("data: ");
        body.push_str(frame);
        body.push_str("\n\n");
    }

    MockReply {
        status: StatusCode::OK,
        content_type: "text/event-stream",
        body,
    }
}

async fn collect_tokens(reply: CompletionReply) -> Vec<String> {
    let CompletionReply::Stream(mut tokens) = reply else {
        panic!("expected a token stream");
    };

    let mut collected = Vec::new();
    while let Some(item) = tokens.next().await {
        collected.push(item.expect("token should arrive intact"));
    }
    collected
}

async fn spawn_test_server(
    state: TestServerState,
) -> (String, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let app = Router::new()
        .route("/completions", post(completions_handler))
        .route("/completions-slow", post(stalled_handler))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let local_addr = listener
        .local_addr()
        .expect("listener address should resolve");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let server_task = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });

        server.await.expect("test server should run");
    });

    (
        format!("http://{local_addr}/completions"),
        shutdown_tx,
        server_task,
    )
}

async fn completions_handler(
    State(state): State<TestServerState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
    {
        state.seen_auth_headers.lock().await.push(value.to_string());
    }

    let reply = state.replies.lock().await.pop_front().unwrap_or(MockReply {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        content_type: "application/json",
        body: r#"{"error":{"code":"exhausted_test_replies"}}"#.to_string(),
    });

    (
        reply.status,
        [(header::CONTENT_TYPE, reply.content_type)],
        reply.body,
    )
}

async fn stalled_handler() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_secs(5)).await;
    (StatusCode::OK, "too late")
}
