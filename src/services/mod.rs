pub mod gemini_client;
pub mod markdown;

// Re-export for convenience
pub use gemini_client::{ChatModel, GeminiClient, GeminiError};
pub use markdown::render_markdown;
