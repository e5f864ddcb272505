//! Login cookie handling and the gate in front of the chat routes.

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, Method, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

use crate::api::error::{ApiError, PageError};
use crate::api::routes::AppState;
use crate::config::Config;

/// Resolves the login cookie to a [`crate::auth::CurrentUser`] and stores it
/// in the request extensions.
///
/// Anonymous `GET`s are sent to the login page with `next` set to the
/// requested path; everything else gets a 401 JSON error. Lookup failures
/// follow the same split between the HTML error page and a JSON 500.
pub async fn require_login(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let user = match session_token(req.headers(), &state.config.session_cookie_name) {
        Some(token) => match state.auth.authenticate(&token).await {
            Ok(user) => user,
            Err(e) if req.method() == Method::GET => return PageError::from(e).into_response(),
            Err(e) => return ApiError::from(e).into_response(),
        },
        None => None,
    };

    match user {
        Some(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        None if req.method() == Method::GET => {
            Redirect::to(&login_redirect(req.uri())).into_response()
        }
        None => ApiError::unauthorized().into_response(),
    }
}

/// Value of the login cookie, if the request carries one.
pub fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == cookie_name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

pub fn session_cookie(config: &Config, token: &str) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        config.session_cookie_name,
        token,
        config.session_ttl().num_seconds()
    );
    if config.secure_cookies {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_session_cookie(config: &Config) -> String {
    format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        config.session_cookie_name
    )
}

/// Only local absolute paths are followed after login.
pub fn is_safe_next(next: &str) -> bool {
    next.starts_with('/') && !next.starts_with("//") && !next.contains('\\')
}

fn login_redirect(uri: &Uri) -> String {
    let target = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    match serde_urlencoded::to_string([("next", target)]) {
        Ok(query) => format!("/login?{}", query),
        Err(_) => "/login".to_string(),
    }
}
