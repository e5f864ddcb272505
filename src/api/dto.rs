use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ==================== REQUEST DTOs ====================

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct AskRequest {
    #[serde(default)]
    pub message: String,
}

/// `session_id` may arrive as a JSON number or a numeric string.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SwitchSessionRequest {
    #[serde(default)]
    #[schema(value_type = Option<i32>)]
    pub session_id: Option<SessionIdInput>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SessionIdInput {
    Number(i64),
    Text(String),
}

impl SessionIdInput {
    /// Zero and empty strings count as no id at all.
    pub fn is_blank(&self) -> bool {
        match self {
            SessionIdInput::Number(n) => *n == 0,
            SessionIdInput::Text(s) => s.trim().is_empty(),
        }
    }

    /// `None` when the value is not an `i32`.
    pub fn as_id(&self) -> Option<i32> {
        match self {
            SessionIdInput::Number(n) => i32::try_from(*n).ok(),
            SessionIdInput::Text(s) => s.trim().parse::<i32>().ok(),
        }
    }
}

// ==================== RESPONSE DTOs ====================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AskResponse {
    pub response: String,
    /// `HH:MM`
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageDto {
    pub question: String,
    pub response: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SwitchSessionResponse {
    pub status: String,
    pub messages: Vec<MessageDto>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClearHistoryResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NewSessionResponse {
    pub status: String,
    pub session_id: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub ai_model: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}
