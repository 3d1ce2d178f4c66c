use std::sync::Arc;

use thiserror::Error;

use crate::knowledge::{CatalogError, ChatbotCatalog, KnowledgeComposer};
use crate::llm::{ChatTurnOutcome, CompletionOrchestrator, SuggestionContext};
use crate::models::{ChatMessage, ChatRole};

#[derive(Debug, Error)]
pub enum ChatTurnError {
    #[error("chatbot {0} not found")]
    UnknownChatbot(i64),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// One chat turn, end to end: knowledge composition strictly first, then the
/// completion tier chain, with suggestions folded in after the content.
pub struct ChatPipeline {
    catalog: Arc<dyn ChatbotCatalog>,
    composer: KnowledgeComposer,
    orchestrator: CompletionOrchestrator,
}

impl ChatPipeline {
    pub fn new(
        catalog: Arc<dyn ChatbotCatalog>,
        composer: KnowledgeComposer,
        orchestrator: CompletionOrchestrator,
    ) -> Self {
        Self {
            catalog,
            composer,
            orchestrator,
        }
    }

    pub async fn run(
        &self,
        chatbot_id: i64,
        messages: &[ChatMessage],
    ) -> Result<ChatTurnOutcome, ChatTurnError> {
        let Some(context) = self.composer.compose(self.catalog.as_ref(), chatbot_id).await? else {
            return Err(ChatTurnError::UnknownChatbot(chatbot_id));
        };

        let ctx = SuggestionContext {
            chatbot_id,
            last_user_message: last_user_message(messages),
            knowledge_hint: context.payload.hint(),
        };

        Ok(self
            .orchestrator
            .run(&context.system_prompt, messages, ctx)
            .await)
    }
}

fn last_user_message(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .rev()
        .find(|message| message.role == ChatRole::User)
        .map(|message| message.content.clone())
        .unwrap_or_default()
}
