use serde::Deserialize;
use std::path::Path;
use validator::Validate;

const DEFAULT_CONFIG_FILE: &str = "gemini-chat";
const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a helpful AI assistant. You maintain context from previous messages in the conversation. \
When users ask follow-up questions like \"explain in detail\", \"give me more info\", \"elaborate\", etc., \
refer back to the previous topics discussed in the conversation.";

/// Main configuration for the chat server
#[derive(Debug, Deserialize, Validate, Clone)]
pub struct Config {
    /// Interface the HTTP server binds to
    pub server_host: String,

    /// HTTP server port
    #[validate(range(min = 1, max = 65535))]
    pub server_port: u16,

    /// Database URL (SeaORM; `sqlite://...` or `postgres://...`)
    pub database_url: String,

    /// Maximum database connections
    #[validate(range(min = 1, max = 100))]
    pub max_connections: u32,

    /// Gemini API key; without one the model is reported as not initialized
    #[validate(length(min = 1))]
    pub gemini_api_key: Option<String>,

    /// Gemini model name
    #[validate(length(min = 1))]
    pub gemini_model: String,

    /// Gemini API base URL
    pub gemini_base_url: String,

    /// System instruction sent with every generation request
    pub system_instruction: String,

    /// Timeout for one generation request
    #[validate(range(min = 1, max = 600))]
    pub gemini_timeout_secs: u64,

    /// Minimum accepted password length at registration
    #[validate(range(min = 1, max = 128))]
    pub min_password_length: usize,

    /// Name of the login cookie
    #[validate(length(min = 1))]
    pub session_cookie_name: String,

    /// Lifetime of a login
    #[validate(range(min = 1, max = 8760))]
    pub session_ttl_hours: i64,

    /// Mark the login cookie `Secure` (set behind TLS)
    pub secure_cookies: bool,

    /// Log level (e.g., info, debug, trace)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 5000,
            database_url: "sqlite://gemini-chat.db".to_string(),
            max_connections: 10,
            gemini_api_key: None,
            gemini_model: "gemini-1.5-flash".to_string(),
            gemini_base_url: "https://generativelanguage.googleapis.com".to_string(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            gemini_timeout_secs: 60,
            min_password_length: 6,
            session_cookie_name: "gemini_chat_session".to_string(),
            session_ttl_hours: 24 * 7,
            secure_cookies: false,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

impl Config {
    /// Loads defaults, then `gemini-chat.toml` (or `path`), then
    /// `GEMINI_CHAT__*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let file = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = config::Config::builder()
            .set_default("server_host", defaults.server_host)?
            .set_default("server_port", i64::from(defaults.server_port))?
            .set_default("database_url", defaults.database_url)?
            .set_default("max_connections", i64::from(defaults.max_connections))?
            .set_default("gemini_model", defaults.gemini_model)?
            .set_default("gemini_base_url", defaults.gemini_base_url)?
            .set_default("system_instruction", defaults.system_instruction)?
            .set_default("gemini_timeout_secs", defaults.gemini_timeout_secs as i64)?
            .set_default("min_password_length", defaults.min_password_length as i64)?
            .set_default("session_cookie_name", defaults.session_cookie_name)?
            .set_default("session_ttl_hours", defaults.session_ttl_hours)?
            .set_default("secure_cookies", defaults.secure_cookies)?
            .set_default("log_level", defaults.log_level)?
            .add_source(file)
            // Environment overrides: GEMINI_CHAT__SERVER_PORT, GEMINI_CHAT__DATABASE_URL, etc.
            .add_source(config::Environment::with_prefix("GEMINI_CHAT").separator("__"))
            .build()?;

        let mut cfg: Config = settings.try_deserialize()?;
        if cfg.gemini_api_key.is_none() {
            cfg.gemini_api_key = std::env::var("GEMINI_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty());
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// `host:port` the server should bind to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours)
    }
}
