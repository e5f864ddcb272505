use super::mocks::{session, MockChatRepo, MockLoginRepo};
use chrono::Utc;
use gemini_chat::auth::{hash_password, hash_token, AuthService};
use gemini_chat::config::Config;
use gemini_chat::models::internal::User;
use gemini_chat::storage::repository::RepositoryError;
use std::sync::Arc;

fn alice(password: &str) -> User {
    User {
        id: 1,
        username: "alice".to_string(),
        password_hash: hash_password(password).unwrap(),
        email: None,
        created_at: Utc::now().naive_utc(),
    }
}

fn repo_with_alice(password: &str) -> MockChatRepo {
    let user = alice(password);
    let mut repo = MockChatRepo::new();
    repo.expect_find_user_by_username()
        .returning(move |_| Ok(Some(user.clone())));
    repo.expect_latest_session()
        .returning(|user_id| Ok(Some(session(4, user_id))));
    repo
}

#[tokio::test]
async fn test_login_purges_expired_logins() {
    let repo = repo_with_alice("secret1");
    let mut logins = MockLoginRepo::new();
    logins
        .expect_purge_expired()
        .times(1)
        .returning(|_| Ok(3));
    logins
        .expect_create_login_session()
        .withf(|new| new.user_id == 1 && new.active_session_id == 4 && new.notice.is_none())
        .times(1)
        .returning(|_| Ok(()));

    let auth = AuthService::new(Arc::new(repo), Arc::new(logins), &Config::default());
    let grant = auth.login("alice", "secret1").await.unwrap();

    assert_eq!(grant.active_session_id, 4);
    assert_eq!(hash_token(&grant.token).len(), 64);
}

#[tokio::test]
async fn test_login_survives_purge_failure() {
    let repo = repo_with_alice("secret1");
    let mut logins = MockLoginRepo::new();
    logins
        .expect_purge_expired()
        .returning(|_| Err(RepositoryError::NotFound("database busy".to_string())));
    logins
        .expect_create_login_session()
        .times(1)
        .returning(|_| Ok(()));

    let auth = AuthService::new(Arc::new(repo), Arc::new(logins), &Config::default());

    assert!(auth.login("alice", "secret1").await.is_ok());
}

#[tokio::test]
async fn test_wrong_password_creates_no_login() {
    let repo = repo_with_alice("secret1");
    let mut logins = MockLoginRepo::new();
    logins.expect_purge_expired().never();
    logins.expect_create_login_session().never();

    let auth = AuthService::new(Arc::new(repo), Arc::new(logins), &Config::default());

    assert!(auth.login("alice", "wrong-password").await.is_err());
}
