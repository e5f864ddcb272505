use super::{
    body_json, body_string, create_test_app, create_test_app_with_broken_logins,
    create_test_app_without_model, form_post, get,
    json_post, mock_gemini_reply, register, send, session_cookie, GENERATE_PATH,
};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use gemini_chat::storage::repository::ChatRepository;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

async fn user_id(repo: &gemini_chat::SeaOrmChatRepository, username: &str) -> i32 {
    repo.find_user_by_username(username).await.unwrap().unwrap().id
}

async fn active_session(repo: &gemini_chat::SeaOrmChatRepository, username: &str) -> i32 {
    let id = user_id(repo, username).await;
    repo.latest_session(id).await.unwrap().unwrap().id
}

// ============================================
// Registration and login
// ============================================

#[tokio::test]
async fn test_register_sets_cookie_and_shows_notice_once() {
    let app = create_test_app().await;

    let response = send(
        &app.router,
        form_post("/register", &[("username", " alice "), ("password", "secret1"), ("email", "")]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/");
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));
    let cookie = session_cookie(&response);

    let user = app.repo.find_user_by_username("alice").await.unwrap().unwrap();
    assert_eq!(user.email, None);
    assert_ne!(user.password_hash, "secret1");

    let home = body_string(send(&app.router, get("/", Some(&cookie))).await).await;
    assert!(home.contains("Registration successful! Welcome to Gemini Chat!"));
    assert!(home.contains("alice"));

    let again = body_string(send(&app.router, get("/", Some(&cookie))).await).await;
    assert!(!again.contains("Registration successful!"));
}

#[tokio::test]
async fn test_register_same_username_twice_fails() {
    let app = create_test_app().await;
    register(&app.router, "alice", "secret1").await;

    let response = send(
        &app.router,
        form_post("/register", &[("username", "alice"), ("password", "another1")]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    let page = body_string(response).await;
    assert!(page.contains("Username already exists"));
    assert!(page.contains("value=\"alice\""));
}

#[tokio::test]
async fn test_register_duplicate_email_fails() {
    let app = create_test_app().await;
    send(
        &app.router,
        form_post(
            "/register",
            &[("username", "alice"), ("password", "secret1"), ("email", "a@example.com")],
        ),
    )
    .await;

    let response = send(
        &app.router,
        form_post(
            "/register",
            &[("username", "bob"), ("password", "secret1"), ("email", "a@example.com")],
        ),
    )
    .await;

    assert!(body_string(response).await.contains("Email already exists"));
}

#[tokio::test]
async fn test_register_validation_messages() {
    let app = create_test_app().await;

    let short = send(
        &app.router,
        form_post("/register", &[("username", "alice"), ("password", "abc")]),
    )
    .await;
    assert!(body_string(short)
        .await
        .contains("Password must be at least 6 characters long"));

    let blank = send(
        &app.router,
        form_post("/register", &[("username", "  "), ("password", "secret1")]),
    )
    .await;
    assert!(body_string(blank)
        .await
        .contains("Please enter both username and password"));
}

#[tokio::test]
async fn test_login_follows_safe_next_only() {
    let app = create_test_app().await;
    register(&app.router, "alice", "secret1").await;

    let local = send(
        &app.router,
        form_post(
            "/login",
            &[("username", "alice"), ("password", "secret1"), ("next", "/?tab=1")],
        ),
    )
    .await;
    assert_eq!(local.status(), StatusCode::SEE_OTHER);
    assert_eq!(local.headers()[header::LOCATION], "/?tab=1");

    let external = send(
        &app.router,
        form_post(
            "/login",
            &[("username", "alice"), ("password", "secret1"), ("next", "//evil.example")],
        ),
    )
    .await;
    assert_eq!(external.headers()[header::LOCATION], "/");
}

#[tokio::test]
async fn test_login_with_wrong_password() {
    let app = create_test_app().await;
    register(&app.router, "alice", "secret1").await;

    let response = send(
        &app.router,
        form_post("/login", &[("username", "alice"), ("password", "wrong-one")]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response)
        .await
        .contains("Invalid username or password"));
}

#[tokio::test]
async fn test_logout_ends_login() {
    let app = create_test_app().await;
    let cookie = register(&app.router, "alice", "secret1").await;

    let response = send(&app.router, get("/logout", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/login?logged_out=1");
    assert!(response.headers()[header::SET_COOKIE]
        .to_str()
        .unwrap()
        .contains("Max-Age=0"));

    let home = send(&app.router, get("/", Some(&cookie))).await;
    assert_eq!(home.status(), StatusCode::SEE_OTHER);

    let login_page = body_string(send(&app.router, get("/login?logged_out=1", None)).await).await;
    assert!(login_page.contains("You have been logged out successfully"));
}

// ============================================
// Login gate
// ============================================

#[tokio::test]
async fn test_anonymous_page_request_redirected_to_login() {
    let app = create_test_app().await;

    let response = send(&app.router, get("/", None)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/login?next=%2F");
}

#[tokio::test]
async fn test_anonymous_json_request_unauthorized() {
    let app = create_test_app().await;

    let response = send(
        &app.router,
        json_post("/ask", "gemini_chat_session=forged", json!({"message": "Hi"})),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Authentication required");
}

#[tokio::test]
async fn test_login_lookup_failure_on_page_renders_html_error() {
    let router = create_test_app_with_broken_logins().await;

    let response = send(&router, get("/", Some("gemini_chat_session=token"))).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/html"));
    let body = body_string(response).await;
    assert!(body.contains("Something went wrong"));
    assert!(!body.contains("login_sessions"));
}

#[tokio::test]
async fn test_login_lookup_failure_on_json_returns_error_body() {
    let router = create_test_app_with_broken_logins().await;

    let response = send(
        &router,
        json_post("/ask", "gemini_chat_session=token", json!({"message": "Hi"})),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert!(body["error"].is_string());
    assert!(!body["error"].as_str().unwrap().contains("login_sessions"));
}

// ============================================
// /ask
// ============================================

#[tokio::test]
async fn test_ask_stores_exactly_one_message() {
    let app = create_test_app().await;
    mock_gemini_reply(&app.gemini, "Rust is a **systems** language.").await;
    let cookie = register(&app.router, "alice", "secret1").await;
    let session_id = active_session(&app.repo, "alice").await;

    let response = send(
        &app.router,
        json_post("/ask", &cookie, json!({"message": "What is Rust?"})),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["response"], "Rust is a **systems** language.");
    assert_eq!(body["timestamp"].as_str().unwrap().len(), 5);

    let messages = app.repo.session_messages(session_id).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].message, "What is Rust?");

    let home = body_string(send(&app.router, get("/", Some(&cookie))).await).await;
    assert!(home.contains("<strong>systems</strong>"));
}

#[tokio::test]
async fn test_ask_replays_previous_turns() {
    let app = create_test_app().await;
    mock_gemini_reply(&app.gemini, "First answer").await;
    let cookie = register(&app.router, "alice", "secret1").await;
    send(&app.router, json_post("/ask", &cookie, json!({"message": "First question"}))).await;

    app.gemini.reset().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(body_partial_json(json!({
            "contents": [
                {"role": "user", "parts": [{"text": "First question"}]},
                {"role": "model", "parts": [{"text": "First answer"}]},
                {"role": "user", "parts": [{"text": "Explain in detail"}]}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "More detail"}]}}]
        })))
        .expect(1)
        .mount(&app.gemini)
        .await;

    let response = send(
        &app.router,
        json_post("/ask", &cookie, json!({"message": "Explain in detail"})),
    )
    .await;

    assert_eq!(body_json(response).await["response"], "More detail");
}

#[tokio::test]
async fn test_ask_empty_message_writes_nothing() {
    let app = create_test_app().await;
    let cookie = register(&app.router, "alice", "secret1").await;
    let session_id = active_session(&app.repo, "alice").await;

    let response = send(&app.router, json_post("/ask", &cookie, json!({"message": "   "}))).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No message provided");
    assert_eq!(app.repo.count_messages_in_session(session_id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_ask_requires_json() {
    let app = create_test_app().await;
    let cookie = register(&app.router, "alice", "secret1").await;

    let response = send(
        &app.router,
        Request::builder()
            .method("POST")
            .uri("/ask")
            .header(header::COOKIE, &cookie)
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("message=hi"))
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Request must be JSON");
}

#[tokio::test]
async fn test_ask_exit_skips_model() {
    let app = create_test_app().await;
    let cookie = register(&app.router, "alice", "secret1").await;
    let session_id = active_session(&app.repo, "alice").await;

    let response = send(&app.router, json_post("/ask", &cookie, json!({"message": "exit"}))).await;

    assert_eq!(body_json(response).await["response"], "Chat session ended.");
    assert!(app.gemini.received_requests().await.unwrap().is_empty());
    assert_eq!(app.repo.count_messages_in_session(session_id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_ask_model_error_reported_and_not_saved() {
    let app = create_test_app().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED"}
        })))
        .expect(1)
        .mount(&app.gemini)
        .await;
    let cookie = register(&app.router, "alice", "secret1").await;
    let session_id = active_session(&app.repo, "alice").await;

    let response = send(&app.router, json_post("/ask", &cookie, json!({"message": "Hi"}))).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let error = body_json(response).await["error"].as_str().unwrap().to_string();
    assert!(error.starts_with("Error: "));
    assert!(error.contains("Resource has been exhausted"));
    assert_eq!(app.repo.count_messages_in_session(session_id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_ask_without_model() {
    let (router, _repo) = create_test_app_without_model().await;
    let cookie = register(&router, "alice", "secret1").await;

    let response = send(&router, json_post("/ask", &cookie, json!({"message": "Hi"}))).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        body_json(response).await["error"],
        "AI model not initialized. Please check API key and model availability."
    );
}

// ============================================
// Sessions
// ============================================

#[tokio::test]
async fn test_switch_to_other_users_session_rejected() {
    let app = create_test_app().await;
    let alice = register(&app.router, "alice", "secret1").await;
    register(&app.router, "bob", "secret1").await;
    let bob_session = active_session(&app.repo, "bob").await;

    let response = send(
        &app.router,
        json_post("/switch_session", &alice, json!({"session_id": bob_session})),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid session");
}

#[tokio::test]
async fn test_switch_session_returns_ordered_messages() {
    let app = create_test_app().await;
    mock_gemini_reply(&app.gemini, "ok").await;
    let cookie = register(&app.router, "alice", "secret1").await;
    let first = active_session(&app.repo, "alice").await;
    for question in ["one", "two"] {
        send(&app.router, json_post("/ask", &cookie, json!({"message": question}))).await;
    }

    let created = body_json(send(&app.router, json_post("/new_session", &cookie, json!({}))).await).await;
    assert_eq!(created["status"], "success");
    assert_ne!(created["session_id"], first);

    let response = send(
        &app.router,
        json_post("/switch_session", &cookie, json!({"session_id": first.to_string()})),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    let questions: Vec<&str> = body["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["question"].as_str().unwrap())
        .collect();
    assert_eq!(questions, vec!["one", "two"]);
    assert_eq!(body["messages"][0]["response"], "ok");
}

#[tokio::test]
async fn test_switch_session_requires_id() {
    let app = create_test_app().await;
    let cookie = register(&app.router, "alice", "secret1").await;

    let response = send(&app.router, json_post("/switch_session", &cookie, json!({}))).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No session ID provided");
}

#[tokio::test]
async fn test_new_session_receives_next_messages() {
    let app = create_test_app().await;
    mock_gemini_reply(&app.gemini, "ok").await;
    let cookie = register(&app.router, "alice", "secret1").await;
    let first = active_session(&app.repo, "alice").await;

    let created = body_json(send(&app.router, json_post("/new_session", &cookie, json!({}))).await).await;
    let second = created["session_id"].as_i64().unwrap() as i32;
    send(&app.router, json_post("/ask", &cookie, json!({"message": "Hi"}))).await;

    assert_eq!(app.repo.count_messages_in_session(first).await.unwrap(), 0);
    assert_eq!(app.repo.count_messages_in_session(second).await.unwrap(), 1);
}

#[tokio::test]
async fn test_clear_history_leaves_single_empty_session() {
    let app = create_test_app().await;
    mock_gemini_reply(&app.gemini, "ok").await;
    let cookie = register(&app.router, "alice", "secret1").await;
    send(&app.router, json_post("/ask", &cookie, json!({"message": "Hi"}))).await;
    send(&app.router, json_post("/new_session", &cookie, json!({}))).await;

    let response = send(&app.router, json_post("/clear_history", &cookie, json!({}))).await;

    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Chat history cleared");

    let alice = user_id(&app.repo, "alice").await;
    let sessions = app.repo.list_sessions(alice).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(
        app.repo.count_messages_in_session(sessions[0].id).await.unwrap(),
        0
    );

    // The fresh session is the active one
    send(&app.router, json_post("/ask", &cookie, json!({"message": "Again"}))).await;
    assert_eq!(
        app.repo.count_messages_in_session(sessions[0].id).await.unwrap(),
        1
    );
}

// ============================================
// Health and docs
// ============================================

#[tokio::test]
async fn test_health_reports_components() {
    let app = create_test_app().await;

    let response = send(&app.router, get("/health", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
    assert_eq!(body["ai_model"], "initialized");
    assert_eq!(body["timestamp"].as_str().unwrap().len(), 19);
}

#[tokio::test]
async fn test_health_without_model_is_unhealthy() {
    let (router, _repo) = create_test_app_without_model().await;

    let body = body_json(send(&router, get("/health", None)).await).await;

    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["ai_model"], "not initialized");
}

#[tokio::test]
async fn test_openapi_document_lists_endpoints() {
    let app = create_test_app().await;

    let body = body_json(send(&app.router, get("/api-docs/openapi.json", None)).await).await;

    for endpoint in ["/ask", "/switch_session", "/clear_history", "/new_session", "/health"] {
        assert!(body["paths"][endpoint].is_object(), "missing {}", endpoint);
    }
}
