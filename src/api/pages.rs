use askama::Template;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::{Extension, Form};
use serde::Deserialize;

use crate::api::error::PageError;
use crate::api::local_time;
use crate::api::routes::AppState;
use crate::api::session_guard::{clear_session_cookie, is_safe_next, session_cookie, session_token};
use crate::auth::{CurrentUser, LoginGrant};
use crate::models::internal::ChatMessage;
use crate::orchestrator::SessionOverview;
use crate::services::markdown::render_markdown;

const LOGGED_OUT_NOTICE: &str = "You have been logged out successfully";
const PREVIEW_CHARS: usize = 40;

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    error: Option<String>,
    notice: Option<String>,
    username: String,
    next: String,
}

#[derive(Template)]
#[template(path = "register.html")]
struct RegisterTemplate {
    error: Option<String>,
    username: String,
    email: String,
    min_password_length: usize,
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    username: String,
    notice: Option<String>,
    current_session_id: i32,
    sessions: Vec<SessionView>,
    messages: Vec<MessageView>,
}

struct SessionView {
    id: i32,
    created: String,
    message_count: usize,
    preview: String,
    active: bool,
}

struct MessageView {
    question: String,
    response_html: String,
    timestamp: String,
}

impl SessionView {
    fn new(overview: &SessionOverview, current_session_id: i32) -> Self {
        let preview = overview
            .messages
            .first()
            .map(|m| preview(&m.message))
            .unwrap_or_else(|| "New conversation".to_string());

        Self {
            id: overview.session.id,
            created: local_time(overview.session.created_at, "%Y-%m-%d %H:%M"),
            message_count: overview.messages.len(),
            preview,
            active: overview.session.id == current_session_id,
        }
    }
}

impl From<&ChatMessage> for MessageView {
    fn from(m: &ChatMessage) -> Self {
        Self {
            question: m.message.clone(),
            response_html: render_markdown(&m.response),
            timestamp: local_time(m.timestamp, "%H:%M"),
        }
    }
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head.trim_end())
    } else {
        head
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    next: Option<String>,
    logged_out: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    next: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    email: String,
}

pub async fn login_page(Query(query): Query<LoginQuery>) -> Result<Html<String>, PageError> {
    let tmpl = LoginTemplate {
        error: None,
        notice: query.logged_out.map(|_| LOGGED_OUT_NOTICE.to_string()),
        username: String::new(),
        next: query.next.unwrap_or_default(),
    };
    Ok(Html(tmpl.render()?))
}

pub async fn login_submit(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
    Form(form): Form<LoginForm>,
) -> Result<Response, PageError> {
    let next = if form.next.is_empty() {
        query.next.unwrap_or_default()
    } else {
        form.next
    };

    match state.auth.login(&form.username, &form.password).await {
        Ok(grant) => {
            let target = if is_safe_next(&next) { next.as_str() } else { "/" };
            Ok(logged_in(&state, &grant, target))
        }
        Err(e) if e.is_user_facing() => {
            let tmpl = LoginTemplate {
                error: Some(e.to_string()),
                notice: None,
                username: form.username.trim().to_string(),
                next,
            };
            Ok(Html(tmpl.render()?).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn register_page(State(state): State<AppState>) -> Result<Html<String>, PageError> {
    let tmpl = RegisterTemplate {
        error: None,
        username: String::new(),
        email: String::new(),
        min_password_length: state.auth.min_password_length(),
    };
    Ok(Html(tmpl.render()?))
}

pub async fn register_submit(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> Result<Response, PageError> {
    let result = state
        .auth
        .register(&form.username, &form.password, Some(form.email.as_str()))
        .await;

    match result {
        Ok(grant) => Ok(logged_in(&state, &grant, "/")),
        Err(e) if e.is_user_facing() => {
            let tmpl = RegisterTemplate {
                error: Some(e.to_string()),
                username: form.username.trim().to_string(),
                email: form.email.trim().to_string(),
                min_password_length: state.auth.min_password_length(),
            };
            Ok(Html(tmpl.render()?).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers, &state.config.session_cookie_name) {
        if let Err(e) = state.auth.logout(&token).await {
            tracing::error!("Failed to drop login session: {}", e);
        }
    }

    (
        [(header::SET_COOKIE, clear_session_cookie(&state.config))],
        Redirect::to("/login?logged_out=1"),
    )
        .into_response()
}

pub async fn index(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Html<String>, PageError> {
    let current_session_id = state.sessions.ensure_active_session(&user).await?;
    let notice = state.logins.take_notice(&user.token_hash).await?;
    let overview = state.sessions.overview(user.user_id).await?;

    let messages: Vec<MessageView> = overview
        .iter()
        .find(|o| o.session.id == current_session_id)
        .map(|o| o.messages.iter().map(MessageView::from).collect())
        .unwrap_or_default();

    let tmpl = IndexTemplate {
        username: user.username,
        notice,
        current_session_id,
        sessions: overview
            .iter()
            .map(|o| SessionView::new(o, current_session_id))
            .collect(),
        messages,
    };
    Ok(Html(tmpl.render()?))
}

fn logged_in(state: &AppState, grant: &LoginGrant, target: &str) -> Response {
    (
        [(header::SET_COOKIE, session_cookie(&state.config, &grant.token))],
        Redirect::to(target),
    )
        .into_response()
}
