use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use shared::chat::ChatPipeline;
use shared::config::{ApiConfig, CompletionConfig, KnowledgeConfig, load_dotenv};
use shared::knowledge::{KnowledgeCache, KnowledgeComposer, KnowledgeFetcher};
use shared::llm::{CompletionError, CompletionOrchestrator};
use shared::repos::Store;
use shared::suggestions::HttpSuggestionClient;
use tracing::{error, info, warn};

mod http;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "api_server=debug,shared=debug,axum=info".to_string()),
        )
        .init();

    if let Err(err) = load_dotenv() {
        error!("failed to load .env: {err}");
        std::process::exit(1);
    }

    let config = match ApiConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("failed to read api config: {err}");
            std::process::exit(1);
        }
    };
    let knowledge_config = match KnowledgeConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("failed to read knowledge config: {err}");
            std::process::exit(1);
        }
    };
    let completion_config = match CompletionConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("failed to read completion config: {err}");
            std::process::exit(1);
        }
    };

    let store = match Store::connect(&config.database_url, config.database_max_connections).await {
        Ok(store) => store,
        Err(err) => {
            error!("failed to connect to postgres: {err}");
            std::process::exit(1);
        }
    };

    let chat = match build_chat_pipeline(&config, &knowledge_config, &completion_config, &store) {
        Ok(pipeline) => Some(Arc::new(pipeline)),
        Err(BuildError::Completion(CompletionError::MissingApiKey)) => {
            // The rest of the application stays usable; chat requests get an
            // explicit configuration error so operators can diagnose this.
            warn!("COMPLETION_API_KEY is not set; chat pipeline disabled");
            None
        }
        Err(err) => {
            error!("failed to build chat pipeline: {err}");
            std::process::exit(1);
        }
    };

    let app = http::build_router(http::AppState { store, chat });

    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .unwrap_or_else(|_| "127.0.0.1:8080".parse().expect("valid default bind addr"));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind should succeed");

    info!(
        "api server listening on {}",
        listener.local_addr().unwrap_or(addr)
    );
    axum::serve(listener, app).await.expect("server should run");
}

#[derive(Debug, thiserror::Error)]
enum BuildError {
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Knowledge(#[from] shared::knowledge::KnowledgeFetcherBuildError),
    #[error(transparent)]
    Suggestions(#[from] shared::suggestions::SuggestionError),
}

fn build_chat_pipeline(
    config: &ApiConfig,
    knowledge_config: &KnowledgeConfig,
    completion_config: &CompletionConfig,
    store: &Store,
) -> Result<ChatPipeline, BuildError> {
    let cache = Arc::new(KnowledgeCache::new(Duration::from_secs(
        knowledge_config.cache_ttl_seconds,
    )));
    let fetcher = KnowledgeFetcher::new(
        cache,
        Duration::from_millis(knowledge_config.fetch_timeout_ms),
    )?;
    let composer = KnowledgeComposer::new(fetcher, knowledge_config.clone());

    let suggestion_client = Arc::new(HttpSuggestionClient::new(
        &config.app_base_url,
        Duration::from_millis(config.suggestion_timeout_ms),
    )?);
    let orchestrator = CompletionOrchestrator::new(
        completion_config,
        suggestion_client.clone(),
        suggestion_client,
    )?;

    Ok(ChatPipeline::new(
        Arc::new(store.clone()),
        composer,
        orchestrator,
    ))
}
