use std::path::PathBuf;

use directories::BaseDirs;
use thiserror::Error;

pub const APP_NAME: &str = "llm-chat";
pub const CONFIG_DIR_NAME: &str = "llm-chat-cli";
pub const CONFIG_FILE_NAME: &str = "configs.yaml";
pub const ROLES_FILE_NAME: &str = "roles.yaml";

pub const DEFAULT_TEMPERATURE: f32 = 1.0;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;
/// Context size recorded for models discovered by a model-list sync.
pub const DEFAULT_MAX_INPUT_TOKENS: u64 = 128_000;

/// `~/.config/llm-chat-cli` on Linux, the platform equivalent elsewhere.
pub fn default_config_dir() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.config_dir().join(CONFIG_DIR_NAME))
}

pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Provider '{0}' not found in config file")]
    UnknownProvider(String),

    #[error("Model '{model}' not found for provider '{provider}'")]
    UnknownModel { provider: String, model: String },

    #[error("Invalid model identifier '{0}'. Expecting 'provider:model'")]
    MalformedIdentifier(String),

    #[error("No model specified and no default model configured")]
    NoModelSpecified,

    #[error("Provider '{provider}' has unsupported type '{provider_type}'")]
    UnsupportedProviderType {
        provider: String,
        provider_type: String,
    },

    #[error("Provider '{0}' has an empty api_base")]
    MissingApiBase(String),

    #[error("Provider '{provider}' has an invalid api_base: {reason}")]
    InvalidApiBase { provider: String, reason: String },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[source] serde_yaml::Error),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("Failed to sync models for '{provider}': {reason}")]
    Sync { provider: String, reason: String },
}
