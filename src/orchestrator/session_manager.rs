use std::sync::Arc;

use crate::auth::CurrentUser;
use crate::models::internal::{ChatMessage, ChatSession};
use crate::orchestrator::ChatError;
use crate::storage::repository::{ChatRepository, LoginSessionRepository};

/// A session with its transcript, for the home page.
#[derive(Debug, Clone)]
pub struct SessionOverview {
    pub session: ChatSession,
    pub messages: Vec<ChatMessage>,
}

/// Creates, switches and clears the chat sessions of a logged-in user.
pub struct SessionManager {
    repo: Arc<dyn ChatRepository>,
    logins: Arc<dyn LoginSessionRepository>,
}

impl SessionManager {
    pub fn new(repo: Arc<dyn ChatRepository>, logins: Arc<dyn LoginSessionRepository>) -> Self {
        Self { repo, logins }
    }

    /// Returns the login's active session, falling back to the user's most
    /// recent one (or a new one) when it is unset or no longer theirs.
    pub async fn ensure_active_session(&self, user: &CurrentUser) -> Result<i32, ChatError> {
        if let Some(id) = user.active_session_id {
            if self
                .repo
                .find_session_for_user(id, user.user_id)
                .await?
                .is_some()
            {
                return Ok(id);
            }
        }

        let session = match self.repo.latest_session(user.user_id).await? {
            Some(session) => session,
            None => self.repo.create_session(user.user_id).await?,
        };
        self.logins
            .set_active_session(&user.token_hash, session.id)
            .await?;
        Ok(session.id)
    }

    /// Makes `session_id` active if it belongs to the user and returns its
    /// messages, oldest first.
    pub async fn switch_session(
        &self,
        user: &CurrentUser,
        session_id: i32,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        if self
            .repo
            .find_session_for_user(session_id, user.user_id)
            .await?
            .is_none()
        {
            tracing::warn!(
                "User {} tried to switch to session {} they do not own",
                user.user_id,
                session_id
            );
            return Err(ChatError::InvalidSession);
        }

        self.logins
            .set_active_session(&user.token_hash, session_id)
            .await?;
        Ok(self.repo.session_messages(session_id).await?)
    }

    pub async fn new_session(&self, user: &CurrentUser) -> Result<ChatSession, ChatError> {
        let session = self.repo.create_session(user.user_id).await?;
        self.logins
            .set_active_session(&user.token_hash, session.id)
            .await?;
        Ok(session)
    }

    /// Drops every session of the user and activates the single fresh one
    /// left behind.
    pub async fn clear_history(&self, user: &CurrentUser) -> Result<ChatSession, ChatError> {
        let session = self.repo.clear_user_history(user.user_id).await?;
        self.logins
            .set_active_session(&user.token_hash, session.id)
            .await?;
        Ok(session)
    }

    /// All sessions of the user, newest first, each with its messages.
    pub async fn overview(&self, user_id: i32) -> Result<Vec<SessionOverview>, ChatError> {
        let sessions = self.repo.list_sessions(user_id).await?;
        let mut overview = Vec::with_capacity(sessions.len());
        for session in sessions {
            let messages = self.repo.session_messages(session.id).await?;
            overview.push(SessionOverview { session, messages });
        }
        Ok(overview)
    }
}
