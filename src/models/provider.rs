use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Wire protocol family selected by a provider entry's `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenAi,
    Grok,
    Gemini,
    OpenAiCompatible,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Grok => "grok",
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAiCompatible => "openai-compatible",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Grok => "xAI Grok",
            ProviderKind::Gemini => "Google Gemini",
            ProviderKind::OpenAiCompatible => "OpenAI Compatible",
        }
    }

    pub fn from_type(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Some(ProviderKind::OpenAi),
            "grok" | "xai" => Some(ProviderKind::Grok),
            "gemini" => Some(ProviderKind::Gemini),
            "openai-compatible" | "ollama" => Some(ProviderKind::OpenAiCompatible),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_input_tokens: Option<u64>,
}

impl ModelConfig {
    pub fn new(name: impl Into<String>, max_input_tokens: Option<u64>) -> Self {
        Self {
            name: name.into(),
            max_input_tokens,
        }
    }
}

/// One `clients:` entry of the configuration file.
///
/// `api_key` is kept exactly as written, including `$VARNAME` indirections.
/// Resolution happens on the router's private copy, so this struct is always
/// safe to serialize back to disk.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    pub provider_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub api_base: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub models: Vec<ModelConfig>,
    /// Keys this crate does not interpret (`patch:` and friends), written back untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl ProviderConfig {
    pub fn new(provider_type: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            provider_type: provider_type.into(),
            name: None,
            api_base: api_base.into(),
            api_key: String::new(),
            models: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_model(mut self, name: impl Into<String>, max_input_tokens: Option<u64>) -> Self {
        self.models.push(ModelConfig::new(name, max_input_tokens));
        self
    }

    /// The `<providerKey>` part of a model identifier: `name` when set, else `type`.
    pub fn key(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.provider_type)
    }

    pub fn kind(&self) -> Option<ProviderKind> {
        ProviderKind::from_type(&self.provider_type)
    }

    pub fn find_model(&self, name: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.name == name)
    }

    pub fn env_indirection(&self) -> Option<&str> {
        self.api_key.strip_prefix('$').filter(|var| !var.is_empty())
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let api_key = if self.api_key.is_empty() {
            ""
        } else if self.env_indirection().is_some() {
            self.api_key.as_str()
        } else {
            "***"
        };
        f.debug_struct("ProviderConfig")
            .field("type", &self.provider_type)
            .field("name", &self.name)
            .field("api_base", &self.api_base)
            .field("api_key", &api_key)
            .field("models", &self.models)
            .finish()
    }
}
