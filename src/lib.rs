//! Gemini Chat - session-based chat web application backed by the Gemini text model

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod storage;

// Re-export main types for convenience
pub use crate::api::routes::{create_router, AppState};
pub use crate::auth::{AuthService, CurrentUser};
pub use crate::config::Config;
pub use crate::models::internal::{ChatMessage, ChatSession, User};
pub use crate::orchestrator::{ChatError, ChatOrchestrator, SessionManager};
pub use crate::services::{ChatModel, GeminiClient, GeminiError};
pub use crate::storage::db::init_db;
pub use crate::storage::repository::{ChatRepository, LoginSessionRepository, SeaOrmChatRepository};
