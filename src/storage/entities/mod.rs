//! SeaORM entities for the chat schema.

pub mod chat_messages;
pub mod chat_sessions;
pub mod login_sessions;
pub mod users;
