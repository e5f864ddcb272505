pub mod session_manager;

use std::sync::Arc;

use crate::models::internal::{ChatMessage, ChatTurn, NewChatMessage};
use crate::services::gemini_client::{ChatModel, GeminiError};
use crate::storage::repository::{ChatRepository, RepositoryError};

pub use session_manager::{SessionManager, SessionOverview};

/// Typing this ends the conversation without calling the model.
pub const EXIT_COMMAND: &str = "exit";
pub const EXIT_REPLY: &str = "Chat session ended.";

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("No message provided")]
    EmptyMessage,
    #[error("AI model not initialized. Please check API key and model availability.")]
    ModelUnavailable,
    #[error("Error: {0}")]
    Model(#[from] GeminiError),
    #[error("Invalid session")]
    InvalidSession,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskReply {
    pub response: String,
    /// The saved turn; `None` for the exit command or when saving failed.
    pub stored: Option<ChatMessage>,
}

pub struct ChatOrchestrator {
    repo: Arc<dyn ChatRepository>,
    model: Option<Arc<dyn ChatModel>>,
}

impl ChatOrchestrator {
    pub fn new(repo: Arc<dyn ChatRepository>, model: Option<Arc<dyn ChatModel>>) -> Self {
        Self { repo, model }
    }

    pub fn model_ready(&self) -> bool {
        self.model.is_some()
    }

    /// Sends `message` to the model with the session's full history and
    /// stores the resulting turn.
    ///
    /// A failed model call is returned as an error and nothing is stored. A
    /// failed store is logged and the reply is still returned.
    pub async fn ask(
        &self,
        user_id: i32,
        session_id: i32,
        message: &str,
    ) -> Result<AskReply, ChatError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        if message.eq_ignore_ascii_case(EXIT_COMMAND) {
            return Ok(AskReply {
                response: EXIT_REPLY.to_string(),
                stored: None,
            });
        }

        let model = self.model.as_ref().ok_or(ChatError::ModelUnavailable)?;

        let history = self.repo.session_messages(session_id).await?;
        let turns = history_to_turns(&history);
        tracing::debug!(
            "Replaying {} turns of session {} to the model",
            history.len(),
            session_id
        );

        let response = model.generate(&turns, message).await.map_err(|e| {
            tracing::error!("Model call failed for session {}: {}", session_id, e);
            ChatError::Model(e)
        })?;

        let stored = match self
            .repo
            .add_message(NewChatMessage {
                session_id,
                user_id,
                message: message.to_string(),
                response: response.clone(),
            })
            .await
        {
            Ok(saved) => Some(saved),
            Err(e) => {
                tracing::error!("Error saving message in session {}: {}", session_id, e);
                None
            }
        };

        Ok(AskReply { response, stored })
    }
}

/// Expands stored turns into alternating user/model entries, oldest first.
pub fn history_to_turns(messages: &[ChatMessage]) -> Vec<ChatTurn> {
    messages
        .iter()
        .flat_map(|m| {
            [
                ChatTurn::user(m.message.as_str()),
                ChatTurn::model(m.response.as_str()),
            ]
        })
        .collect()
}
