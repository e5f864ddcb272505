use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    prelude::*, ConnectionTrait, PaginatorTrait, QueryOrder, Set, SqlErr, TransactionTrait,
};

use crate::models::internal::{
    ChatMessage, ChatSession, LoginSession, NewChatMessage, NewLoginSession, NewUser, User,
};
use crate::storage::entities::{chat_messages, chat_sessions, login_sessions, users};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    DbError(#[from] sea_orm::DbErr),
    #[error("Entity not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
}

// ============================================
// TRAIT DEFINITIONS
// ============================================

/// Users, chat sessions and their messages.
#[async_trait]
pub trait ChatRepository: Send + Sync {
    async fn find_user_by_id(&self, id: i32) -> Result<Option<User>, RepositoryError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;

    /// Inserts the user and their first chat session in one transaction.
    async fn create_user_with_session(
        &self,
        user: NewUser,
    ) -> Result<(User, ChatSession), RepositoryError>;

    async fn delete_user(&self, id: i32) -> Result<(), RepositoryError>;

    async fn create_session(&self, user_id: i32) -> Result<ChatSession, RepositoryError>;
    async fn latest_session(&self, user_id: i32) -> Result<Option<ChatSession>, RepositoryError>;
    async fn find_session_for_user(
        &self,
        session_id: i32,
        user_id: i32,
    ) -> Result<Option<ChatSession>, RepositoryError>;

    /// Newest first.
    async fn list_sessions(&self, user_id: i32) -> Result<Vec<ChatSession>, RepositoryError>;

    /// Oldest first.
    async fn session_messages(&self, session_id: i32) -> Result<Vec<ChatMessage>, RepositoryError>;

    async fn add_message(&self, msg: NewChatMessage) -> Result<ChatMessage, RepositoryError>;
    async fn count_messages_in_session(&self, session_id: i32) -> Result<u64, RepositoryError>;

    /// Deletes every session and message of the user, then creates one
    /// empty session and returns it.
    async fn clear_user_history(&self, user_id: i32) -> Result<ChatSession, RepositoryError>;

    async fn ping(&self) -> bool;
}

/// Server-side state of browser logins, keyed by the hashed cookie token.
#[async_trait]
pub trait LoginSessionRepository: Send + Sync {
    async fn create_login_session(&self, session: NewLoginSession) -> Result<(), RepositoryError>;
    async fn find_login_session(
        &self,
        token_hash: &str,
    ) -> Result<Option<LoginSession>, RepositoryError>;
    async fn set_active_session(
        &self,
        token_hash: &str,
        chat_session_id: i32,
    ) -> Result<(), RepositoryError>;
    /// Returns the pending notice, clearing it.
    async fn take_notice(&self, token_hash: &str) -> Result<Option<String>, RepositoryError>;
    async fn delete_login_session(&self, token_hash: &str) -> Result<(), RepositoryError>;
    async fn purge_expired(&self, now: NaiveDateTime) -> Result<u64, RepositoryError>;
}

// ============================================
// IMPLEMENTATION STRUCT
// ============================================
pub struct SeaOrmChatRepository {
    db: DatabaseConnection,
}

impl SeaOrmChatRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

async fn insert_session<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    created_at: NaiveDateTime,
) -> Result<ChatSession, DbErr> {
    let model = chat_sessions::ActiveModel {
        user_id: Set(user_id),
        created_at: Set(created_at),
        ..Default::default()
    }
    .insert(conn)
    .await?;
    Ok(ChatSession::from(model))
}

fn map_unique_violation(err: DbErr) -> RepositoryError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => RepositoryError::Conflict(detail),
        _ => RepositoryError::DbError(err),
    }
}

// ============================================
// TRAIT IMPLEMENTATIONS
// ============================================
#[async_trait]
impl ChatRepository for SeaOrmChatRepository {
    async fn find_user_by_id(&self, id: i32) -> Result<Option<User>, RepositoryError> {
        let model = users::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(User::from))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let model = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.db)
            .await?;
        Ok(model.map(User::from))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let model = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await?;
        Ok(model.map(User::from))
    }

    async fn create_user_with_session(
        &self,
        new_user: NewUser,
    ) -> Result<(User, ChatSession), RepositoryError> {
        let now = Utc::now().naive_utc();
        let txn = self.db.begin().await?;

        let user = users::ActiveModel {
            username: Set(new_user.username),
            password_hash: Set(new_user.password_hash),
            email: Set(new_user.email),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(map_unique_violation)?;

        let session = insert_session(&txn, user.id, now).await?;
        txn.commit().await?;

        tracing::info!("Created user {} with session {}", user.id, session.id);
        Ok((User::from(user), session))
    }

    async fn delete_user(&self, id: i32) -> Result<(), RepositoryError> {
        let result = users::Entity::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound(format!("User {}", id)));
        }
        Ok(())
    }

    async fn create_session(&self, user_id: i32) -> Result<ChatSession, RepositoryError> {
        let session = insert_session(&self.db, user_id, Utc::now().naive_utc()).await?;
        tracing::info!("Created new session {} for user {}", session.id, user_id);
        Ok(session)
    }

    async fn latest_session(&self, user_id: i32) -> Result<Option<ChatSession>, RepositoryError> {
        let model = chat_sessions::Entity::find()
            .filter(chat_sessions::Column::UserId.eq(user_id))
            .order_by_desc(chat_sessions::Column::CreatedAt)
            .order_by_desc(chat_sessions::Column::Id)
            .one(&self.db)
            .await?;
        Ok(model.map(ChatSession::from))
    }

    async fn find_session_for_user(
        &self,
        session_id: i32,
        user_id: i32,
    ) -> Result<Option<ChatSession>, RepositoryError> {
        let model = chat_sessions::Entity::find_by_id(session_id)
            .filter(chat_sessions::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?;
        Ok(model.map(ChatSession::from))
    }

    async fn list_sessions(&self, user_id: i32) -> Result<Vec<ChatSession>, RepositoryError> {
        let models = chat_sessions::Entity::find()
            .filter(chat_sessions::Column::UserId.eq(user_id))
            .order_by_desc(chat_sessions::Column::CreatedAt)
            .order_by_desc(chat_sessions::Column::Id)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(ChatSession::from).collect())
    }

    async fn session_messages(&self, session_id: i32) -> Result<Vec<ChatMessage>, RepositoryError> {
        let models = chat_messages::Entity::find()
            .filter(chat_messages::Column::SessionId.eq(session_id))
            .order_by_asc(chat_messages::Column::Timestamp)
            .order_by_asc(chat_messages::Column::Id)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(ChatMessage::from).collect())
    }

    async fn add_message(&self, msg: NewChatMessage) -> Result<ChatMessage, RepositoryError> {
        let model = chat_messages::ActiveModel {
            session_id: Set(msg.session_id),
            user_id: Set(msg.user_id),
            message: Set(msg.message),
            response: Set(msg.response),
            timestamp: Set(Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        tracing::debug!("Stored message {} in session {}", model.id, model.session_id);
        Ok(ChatMessage::from(model))
    }

    async fn count_messages_in_session(&self, session_id: i32) -> Result<u64, RepositoryError> {
        let count = chat_messages::Entity::find()
            .filter(chat_messages::Column::SessionId.eq(session_id))
            .count(&self.db)
            .await?;
        Ok(count)
    }

    async fn clear_user_history(&self, user_id: i32) -> Result<ChatSession, RepositoryError> {
        let txn = self.db.begin().await?;

        let messages = chat_messages::Entity::delete_many()
            .filter(chat_messages::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;
        let sessions = chat_sessions::Entity::delete_many()
            .filter(chat_sessions::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;
        let session = insert_session(&txn, user_id, Utc::now().naive_utc()).await?;

        txn.commit().await?;
        tracing::info!(
            "Cleared {} messages in {} sessions for user {}, new session {}",
            messages.rows_affected,
            sessions.rows_affected,
            user_id,
            session.id
        );
        Ok(session)
    }

    async fn ping(&self) -> bool {
        match self.db.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Database ping failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl LoginSessionRepository for SeaOrmChatRepository {
    async fn create_login_session(&self, session: NewLoginSession) -> Result<(), RepositoryError> {
        login_sessions::ActiveModel {
            token_hash: Set(session.token_hash),
            user_id: Set(session.user_id),
            active_session_id: Set(Some(session.active_session_id)),
            notice: Set(session.notice),
            created_at: Set(Utc::now().naive_utc()),
            expires_at: Set(session.expires_at),
        }
        .insert(&self.db)
        .await
        .map_err(map_unique_violation)?;
        Ok(())
    }

    async fn find_login_session(
        &self,
        token_hash: &str,
    ) -> Result<Option<LoginSession>, RepositoryError> {
        let model = login_sessions::Entity::find_by_id(token_hash.to_owned())
            .one(&self.db)
            .await?;
        Ok(model.map(LoginSession::from))
    }

    async fn set_active_session(
        &self,
        token_hash: &str,
        chat_session_id: i32,
    ) -> Result<(), RepositoryError> {
        let result = login_sessions::Entity::update_many()
            .col_expr(
                login_sessions::Column::ActiveSessionId,
                Expr::value(Some(chat_session_id)),
            )
            .filter(login_sessions::Column::TokenHash.eq(token_hash))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound("Login session".to_string()));
        }
        Ok(())
    }

    async fn take_notice(&self, token_hash: &str) -> Result<Option<String>, RepositoryError> {
        let Some(model) = login_sessions::Entity::find_by_id(token_hash.to_owned())
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };

        if model.notice.is_none() {
            return Ok(None);
        }

        login_sessions::Entity::update_many()
            .col_expr(login_sessions::Column::Notice, Expr::value(Option::<String>::None))
            .filter(login_sessions::Column::TokenHash.eq(token_hash))
            .exec(&self.db)
            .await?;
        Ok(model.notice)
    }

    async fn delete_login_session(&self, token_hash: &str) -> Result<(), RepositoryError> {
        login_sessions::Entity::delete_by_id(token_hash.to_owned())
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn purge_expired(&self, now: NaiveDateTime) -> Result<u64, RepositoryError> {
        let result = login_sessions::Entity::delete_many()
            .filter(login_sessions::Column::ExpiresAt.lt(now))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}

// ============================================
// Conversions
// ============================================

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            password_hash: model.password_hash,
            email: model.email,
            created_at: model.created_at,
        }
    }
}

impl From<chat_sessions::Model> for ChatSession {
    fn from(model: chat_sessions::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            created_at: model.created_at,
        }
    }
}

impl From<chat_messages::Model> for ChatMessage {
    fn from(model: chat_messages::Model) -> Self {
        Self {
            id: model.id,
            session_id: model.session_id,
            user_id: model.user_id,
            message: model.message,
            response: model.response,
            timestamp: model.timestamp,
        }
    }
}

impl From<login_sessions::Model> for LoginSession {
    fn from(model: login_sessions::Model) -> Self {
        Self {
            token_hash: model.token_hash,
            user_id: model.user_id,
            active_session_id: model.active_session_id,
            notice: model.notice,
            created_at: model.created_at,
            expires_at: model.expires_at,
        }
    }
}
