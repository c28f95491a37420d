//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    /// Directory holding the JSON-file local record store.
    pub local_store_dir: PathBuf,
    /// Length of the silent-prayer phase in the guided session.
    pub prayer_minutes: u64,
    pub scripture_api_key: Option<String>,
    pub scripture_bible_id: String,
    pub gemini_api_key: Option<String>,
    pub huggingface_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub cohere_api_key: Option<String>,
    /// Gemini model names to try in order; the free tier renames these often.
    pub gemini_models: Vec<String>,
    pub huggingface_model: String,
    pub openai_review_model: String,
    pub cohere_model: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Storage Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let local_store_dir = std::env::var("LOCAL_STORE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        let prayer_minutes_str =
            std::env::var("PRAYER_MINUTES").unwrap_or_else(|_| "5".to_string());
        let prayer_minutes = prayer_minutes_str.parse::<u64>().map_err(|_| {
            ConfigError::InvalidValue(
                "PRAYER_MINUTES".to_string(),
                format!("'{}' is not a number of minutes", prayer_minutes_str),
            )
        })?;

        // --- Load API Keys (as optional) ---
        let scripture_api_key = std::env::var("SCRIPTURE_API_KEY").ok();
        let gemini_api_key = std::env::var("GEMINI_API_KEY").ok();
        let huggingface_api_key = std::env::var("HUGGINGFACE_API_KEY").ok();
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let cohere_api_key = std::env::var("COHERE_API_KEY").ok();

        // --- Load Adapter-specific Settings ---
        let scripture_bible_id = std::env::var("SCRIPTURE_BIBLE_ID")
            .unwrap_or_else(|_| "9879d2657fe39de4-01".to_string());
        let gemini_models = std::env::var("GEMINI_MODELS")
            .map(|list| {
                list.split(',')
                    .map(|m| m.trim().to_string())
                    .filter(|m| !m.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| {
                vec![
                    "gemini-pro".to_string(),
                    "gemini-1.5-pro".to_string(),
                    "gemini-1.5-flash".to_string(),
                ]
            });
        let huggingface_model = std::env::var("HUGGINGFACE_MODEL")
            .unwrap_or_else(|_| "meta-llama/Meta-Llama-3.1-8B-Instruct".to_string());
        let openai_review_model =
            std::env::var("OPENAI_REVIEW_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let cohere_model =
            std::env::var("COHERE_MODEL").unwrap_or_else(|_| "command".to_string());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            local_store_dir,
            prayer_minutes,
            scripture_api_key,
            scripture_bible_id,
            gemini_api_key,
            huggingface_api_key,
            openai_api_key,
            cohere_api_key,
            gemini_models,
            huggingface_model,
            openai_review_model,
            cohere_model,
        })
    }
}
