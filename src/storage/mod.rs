pub mod db;
pub mod entities;
pub mod migrations;
pub mod repository;

pub use db::init_db;
pub use entities::{chat_messages, chat_sessions, login_sessions, users};
pub use repository::{
    ChatRepository, LoginSessionRepository, RepositoryError, SeaOrmChatRepository,
};
