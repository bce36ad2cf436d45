//! Configuration for the OpenAI-compatible external services.
//!
//! Resolved once from the environment into an explicit handle that is
//! passed down to the providers; nothing reads environment variables after
//! construction, which keeps test doubles trivial (point `base_url` at an
//! httpmock server).

use std::time::Duration;

use crate::types::LicenseerError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_CHAT_MODEL: &str = "gpt-4.1";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Connection settings shared by the embedding and text services.
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    /// Applied to every outbound HTTP call.
    pub timeout: Duration,
}

impl OpenAiConfig {
    /// Build a config from `OPENAI_API_KEY` (required) and optional
    /// `OPENAI_BASE_URL`, `OPENAI_CHAT_MODEL`, `OPENAI_EMBEDDING_MODEL`.
    pub fn from_env() -> Result<Self, LicenseerError> {
        dotenvy::dotenv().ok();
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            LicenseerError::Config("OPENAI_API_KEY is not set in the environment".into())
        })?;
        Ok(Self {
            api_key,
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            chat_model: std::env::var("OPENAI_CHAT_MODEL")
                .unwrap_or_else(|_| DEFAULT_CHAT_MODEL.to_string()),
            embedding_model: std::env::var("OPENAI_EMBEDDING_MODEL")
                .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string()),
            timeout: Duration::from_secs(30),
        })
    }

    /// Config with explicit values, used by tests against a mock server.
    pub fn for_endpoint(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    #[must_use]
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}
