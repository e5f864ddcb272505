use axum::{
    extract::{rejection::JsonRejection, State},
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Local;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::api::dto::*;
use crate::api::error::ApiError;
use crate::api::{local_time, pages, session_guard::require_login};
use crate::auth::{AuthService, CurrentUser};
use crate::config::Config;
use crate::orchestrator::{ChatError, ChatOrchestrator, SessionManager};
use crate::services::gemini_client::ChatModel;
use crate::storage::repository::{ChatRepository, LoginSessionRepository};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub repo: Arc<dyn ChatRepository>,
    pub logins: Arc<dyn LoginSessionRepository>,
    pub auth: Arc<AuthService>,
    pub sessions: Arc<SessionManager>,
    pub orchestrator: Arc<ChatOrchestrator>,
}

impl AppState {
    /// Wires the services around one store that holds both the chat data and
    /// the login state. `model` is `None` when no API key is configured.
    pub fn new<R>(config: Config, store: Arc<R>, model: Option<Arc<dyn ChatModel>>) -> Self
    where
        R: ChatRepository + LoginSessionRepository + 'static,
    {
        let repo: Arc<dyn ChatRepository> = store.clone();
        let logins: Arc<dyn LoginSessionRepository> = store;

        Self {
            auth: Arc::new(AuthService::new(repo.clone(), logins.clone(), &config)),
            sessions: Arc::new(SessionManager::new(repo.clone(), logins.clone())),
            orchestrator: Arc::new(ChatOrchestrator::new(repo.clone(), model)),
            config: Arc::new(config),
            repo,
            logins,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(ask, switch_session, clear_history, new_session, health),
    components(schemas(
        AskRequest,
        AskResponse,
        SwitchSessionRequest,
        SwitchSessionResponse,
        MessageDto,
        ClearHistoryResponse,
        NewSessionResponse,
        HealthResponse,
        ErrorResponse
    )),
    info(title = "Gemini Chat", description = "JSON endpoints used by the chat page")
)]
pub struct ApiDoc;

#[utoipa::path(
    post,
    path = "/ask",
    request_body = AskRequest,
    responses(
        (status = 200, description = "Model reply", body = AskResponse),
        (status = 400, description = "Missing message or non-JSON body", body = ErrorResponse),
        (status = 401, description = "Not logged in", body = ErrorResponse),
        (status = 502, description = "The model call failed", body = ErrorResponse),
        (status = 503, description = "No model configured", body = ErrorResponse)
    )
)]
pub async fn ask(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, ApiError> {
    let Json(req) = payload?;

    let session_id = state.sessions.ensure_active_session(&user).await?;
    let reply = state
        .orchestrator
        .ask(user.user_id, session_id, &req.message)
        .await?;

    let timestamp = match &reply.stored {
        Some(saved) => local_time(saved.timestamp, "%H:%M"),
        None => Local::now().format("%H:%M").to_string(),
    };

    Ok(Json(AskResponse {
        response: reply.response,
        timestamp,
    }))
}

#[utoipa::path(
    post,
    path = "/switch_session",
    request_body = SwitchSessionRequest,
    responses(
        (status = 200, description = "Messages of the selected session, oldest first", body = SwitchSessionResponse),
        (status = 400, description = "Missing, unknown or foreign session", body = ErrorResponse),
        (status = 401, description = "Not logged in", body = ErrorResponse)
    )
)]
pub async fn switch_session(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    payload: Result<Json<SwitchSessionRequest>, JsonRejection>,
) -> Result<Json<SwitchSessionResponse>, ApiError> {
    let Json(req) = payload?;

    let input = req
        .session_id
        .filter(|id| !id.is_blank())
        .ok_or_else(|| ApiError::bad_request("No session ID provided"))?;
    let session_id = input.as_id().ok_or(ChatError::InvalidSession)?;

    let messages = state.sessions.switch_session(&user, session_id).await?;

    Ok(Json(SwitchSessionResponse {
        status: "success".to_string(),
        messages: messages
            .into_iter()
            .map(|m| MessageDto {
                timestamp: local_time(m.timestamp, "%H:%M"),
                question: m.message,
                response: m.response,
            })
            .collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/clear_history",
    responses(
        (status = 200, description = "All sessions removed and a fresh one started", body = ClearHistoryResponse),
        (status = 401, description = "Not logged in", body = ErrorResponse)
    )
)]
pub async fn clear_history(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ClearHistoryResponse>, ApiError> {
    let session = state.sessions.clear_history(&user).await?;
    tracing::info!(
        "Cleared history and created new session {} for user {}",
        session.id,
        user.user_id
    );

    Ok(Json(ClearHistoryResponse {
        status: "success".to_string(),
        message: "Chat history cleared".to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/new_session",
    responses(
        (status = 200, description = "New empty session, now active", body = NewSessionResponse),
        (status = 401, description = "Not logged in", body = ErrorResponse)
    )
)]
pub async fn new_session(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<NewSessionResponse>, ApiError> {
    let session = state.sessions.new_session(&user).await?;
    tracing::info!("Created new session {} for user {}", session.id, user.user_id);

    Ok(Json(NewSessionResponse {
        status: "success".to_string(),
        session_id: session.id,
    }))
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Database and model status", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_ok = state.repo.ping().await;
    let model_ok = state.orchestrator.model_ready();

    Json(HealthResponse {
        status: if db_ok && model_ok { "healthy" } else { "unhealthy" }.to_string(),
        database: if db_ok { "connected" } else { "disconnected" }.to_string(),
        ai_model: if model_ok { "initialized" } else { "not initialized" }.to_string(),
        timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    })
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/", get(pages::index))
        .route("/ask", post(ask))
        .route("/switch_session", post(switch_session))
        .route("/clear_history", post(clear_history))
        .route("/new_session", post(new_session))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_login));

    Router::new()
        .merge(protected)
        .route("/login", get(pages::login_page).post(pages::login_submit))
        .route(
            "/register",
            get(pages::register_page).post(pages::register_submit),
        )
        .route("/logout", get(pages::logout))
        .route("/health", get(health))
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
