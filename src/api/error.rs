use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Response};

use crate::api::dto::ErrorResponse;
use crate::auth::AuthError;
use crate::orchestrator::ChatError;
use crate::storage::repository::RepositoryError;

const GENERIC_ERROR: &str = "An internal error occurred. Please try again later.";

/// JSON error for the fetch endpoints, rendered as `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: "Authentication required".to_string(),
        }
    }

    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: GENERIC_ERROR.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!("Rejected request body: {}", rejection.body_text());
        Self::bad_request("Request must be JSON")
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        tracing::error!("Database error: {}", err);
        Self::internal()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        if err.is_user_facing() {
            return Self::bad_request(err.to_string());
        }
        tracing::error!("Auth error: {}", err);
        Self::internal()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::EmptyMessage | ChatError::InvalidSession => Self::bad_request(err.to_string()),
            ChatError::ModelUnavailable => Self {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: err.to_string(),
            },
            ChatError::Model(_) => Self {
                status: StatusCode::BAD_GATEWAY,
                message: err.to_string(),
            },
            ChatError::Repository(e) => e.into(),
        }
    }
}

/// Error for HTML pages: logged in full, shown as a generic error page.
pub struct PageError(pub anyhow::Error);

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        tracing::error!("page error: {:#}", self.0);

        let body = format!(
            r#"<!doctype html>
<html><head><title>Error - Gemini Chat</title>
<style>body{{font-family:system-ui;background:#f5f7fb;color:#333;display:flex;justify-content:center;align-items:center;height:100vh;margin:0}}
.err{{background:#fff;padding:2rem;border-radius:8px;border-left:4px solid #e74c3c;max-width:600px}}
h1{{color:#e74c3c;margin-top:0}}</style>
</head><body><div class="err"><h1>Something went wrong</h1><p>{}</p>
<p><a href="/" style="color:#3498db">Back to chat</a></p></div></body></html>"#,
            GENERIC_ERROR
        );
        (StatusCode::INTERNAL_SERVER_ERROR, Html(body)).into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for PageError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
