//! Registration, login and the server-side login state behind the session cookie.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::models::internal::{NewLoginSession, NewUser, User};
use crate::storage::repository::{ChatRepository, LoginSessionRepository, RepositoryError};

pub const REGISTRATION_NOTICE: &str = "Registration successful! Welcome to Gemini Chat!";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Please enter both username and password")]
    MissingCredentials,
    #[error("Password must be at least {0} characters long")]
    PasswordTooShort(usize),
    #[error("Username already exists")]
    UsernameTaken,
    #[error("Email already exists")]
    EmailTaken,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl AuthError {
    /// Errors whose message is shown on the form as-is.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, AuthError::Hashing(_) | AuthError::Repository(_))
    }
}

/// The authenticated caller, resolved from the login cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: i32,
    pub username: String,
    pub token_hash: String,
    pub active_session_id: Option<i32>,
}

/// A fresh login: the cookie token to hand to the browser plus who it is for.
#[derive(Debug, Clone)]
pub struct LoginGrant {
    pub token: String,
    pub user: User,
    pub active_session_id: i32,
}

pub struct AuthService {
    repo: Arc<dyn ChatRepository>,
    logins: Arc<dyn LoginSessionRepository>,
    min_password_length: usize,
    session_ttl: chrono::Duration,
}

impl AuthService {
    pub fn new(
        repo: Arc<dyn ChatRepository>,
        logins: Arc<dyn LoginSessionRepository>,
        config: &Config,
    ) -> Self {
        Self {
            repo,
            logins,
            min_password_length: config.min_password_length,
            session_ttl: config.session_ttl(),
        }
    }

    pub fn min_password_length(&self) -> usize {
        self.min_password_length
    }

    /// Creates the account with its first chat session and logs it in.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: Option<&str>,
    ) -> Result<LoginGrant, AuthError> {
        let username = username.trim();
        let email = email.map(str::trim).filter(|e| !e.is_empty());

        if username.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        if password.chars().count() < self.min_password_length {
            return Err(AuthError::PasswordTooShort(self.min_password_length));
        }

        if self.repo.find_user_by_username(username).await?.is_some() {
            return Err(AuthError::UsernameTaken);
        }
        if let Some(email) = email {
            if self.repo.find_user_by_email(email).await?.is_some() {
                return Err(AuthError::EmailTaken);
            }
        }

        let password_hash = hash_password_blocking(password.to_owned()).await?;
        let new_user = NewUser {
            username: username.to_owned(),
            password_hash,
            email: email.map(str::to_owned),
        };

        // A concurrent registration can still win the race past the checks above
        let (user, session) = match self.repo.create_user_with_session(new_user).await {
            Ok(created) => created,
            Err(RepositoryError::Conflict(detail)) if detail.contains("email") => {
                return Err(AuthError::EmailTaken)
            }
            Err(RepositoryError::Conflict(_)) => return Err(AuthError::UsernameTaken),
            Err(e) => return Err(e.into()),
        };

        tracing::info!("Registered user {} ({})", user.username, user.id);
        self.start_login(user, session.id, Some(REGISTRATION_NOTICE.to_string()))
            .await
    }

    /// Verifies the password and attaches the most recent chat session,
    /// creating one if the user has none.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginGrant, AuthError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let user = self
            .repo
            .find_user_by_username(username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password_blocking(password.to_owned(), user.password_hash.clone()).await? {
            tracing::warn!("Failed login for user {}", user.id);
            return Err(AuthError::InvalidCredentials);
        }

        let session = match self.repo.latest_session(user.id).await? {
            Some(session) => session,
            None => self.repo.create_session(user.id).await?,
        };

        tracing::info!("User {} logged in, active session {}", user.id, session.id);
        self.start_login(user, session.id, None).await
    }

    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        self.logins.delete_login_session(&hash_token(token)).await?;
        Ok(())
    }

    /// Resolves a cookie token to its user; expired or unknown tokens yield `None`.
    pub async fn authenticate(&self, token: &str) -> Result<Option<CurrentUser>, AuthError> {
        let token_hash = hash_token(token);
        let Some(login) = self.logins.find_login_session(&token_hash).await? else {
            return Ok(None);
        };

        if login.expires_at <= Utc::now().naive_utc() {
            self.logins.delete_login_session(&token_hash).await?;
            return Ok(None);
        }

        let Some(user) = self.repo.find_user_by_id(login.user_id).await? else {
            return Ok(None);
        };

        Ok(Some(CurrentUser {
            user_id: user.id,
            username: user.username,
            token_hash,
            active_session_id: login.active_session_id,
        }))
    }

    async fn start_login(
        &self,
        user: User,
        active_session_id: i32,
        notice: Option<String>,
    ) -> Result<LoginGrant, AuthError> {
        let now = Utc::now().naive_utc();
        // Abandoned logins are cleared here as well as at startup
        match self.logins.purge_expired(now).await {
            Ok(0) => {}
            Ok(n) => tracing::debug!("Purged {} expired logins", n),
            Err(e) => tracing::warn!("Could not purge expired logins: {}", e),
        }

        let token = generate_token();
        self.logins
            .create_login_session(NewLoginSession {
                token_hash: hash_token(&token),
                user_id: user.id,
                active_session_id,
                notice,
                expires_at: now + self.session_ttl,
            })
            .await?;

        Ok(LoginGrant {
            token,
            user,
            active_session_id,
        })
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::error!("Stored password hash is malformed: {}", e);
            false
        }
    }
}

async fn hash_password_blocking(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))?
}

async fn verify_password_blocking(password: String, stored_hash: String) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Random cookie token; only its digest is ever stored.
pub fn generate_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
