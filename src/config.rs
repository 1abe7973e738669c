//! Configuration types, built from environment variables.
//!
//! A local `.env` file is loaded by `main` before any of these run; every
//! `from_env` constructor reads the merged process environment.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default inference model (Groq-hosted).
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

/// Default OpenAI-compatible endpoint.
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Default path of the stored Gmail authorized-user file.
pub const DEFAULT_TOKEN_PATH: &str = "token.json";

/// Default number of emails per inference batch.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Mail access configuration.
#[derive(Debug, Clone)]
pub struct MailConfig {
    /// Path of the authorized-user token file, loaded at the start of each run.
    pub token_path: PathBuf,
}

impl MailConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let token_path = std::env::var("GMAIL_TOKEN_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_TOKEN_PATH));

        Self { token_path }
    }
}

/// Configuration for the inference endpoint.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: SecretString,
    pub model: String,
    pub base_url: String,
}

impl LlmConfig {
    /// Build config from environment variables.
    ///
    /// `GROQ_API_KEY` is required; model and base URL fall back to the Groq
    /// defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("GROQ_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("GROQ_API_KEY".to_string()))?;

        let model =
            std::env::var("INBOX_DIGEST_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let base_url =
            std::env::var("INBOX_DIGEST_BASE_URL").unwrap_or_else(|_| GROQ_BASE_URL.to_string());

        Ok(Self {
            api_key: SecretString::from(api_key),
            model,
            base_url,
        })
    }
}

/// Batch summarizer configuration.
#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    /// Number of emails combined into one inference request.
    pub batch_size: usize,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl SummarizerConfig {
    /// Build config from environment variables.
    ///
    /// `INBOX_DIGEST_BATCH_SIZE` must be a positive integer when set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let batch_size = match std::env::var("INBOX_DIGEST_BATCH_SIZE") {
            Ok(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|&n| n > 0)
                .ok_or_else(|| ConfigError::InvalidValue {
                    key: "INBOX_DIGEST_BATCH_SIZE".to_string(),
                    message: format!("expected a positive integer, got '{raw}'"),
                })?,
            Err(_) => DEFAULT_BATCH_SIZE,
        };

        Ok(Self { batch_size })
    }
}
