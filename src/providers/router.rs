use std::sync::Arc;

use reqwest::Client;
use url::Url;

use super::gemini::GeminiClient;
use super::local::LocalClient;
use super::openai::OpenAiClient;
use super::traits::ProviderClient;
use crate::config::ConfigError;
use crate::models::{ModelConfig, ProviderConfig, ProviderKind};

struct ProviderEntry {
    config: ProviderConfig,
    kind: ProviderKind,
    /// Set once the `$VARNAME` lookup has run; the lookup is never repeated.
    key_resolved: bool,
}

/// A live client bound to one configured model.
#[derive(Clone)]
pub struct ResolvedModel {
    /// Canonical `<providerKey>:<modelName>` identifier.
    pub id: String,
    pub provider: String,
    pub model: ModelConfig,
    pub client: Arc<dyn ProviderClient>,
}

impl std::fmt::Debug for ResolvedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedModel")
            .field("id", &self.id)
            .field("kind", &self.client.kind())
            .field("model", &self.model)
            .finish()
    }
}

pub struct ProviderRouter {
    providers: Vec<ProviderEntry>,
    default_model: Option<String>,
    http: Client,
}

impl ProviderRouter {
    /// Validate every provider entry up front: each must have a known type and
    /// a non-empty, absolute `api_base`.
    pub fn new(
        providers: Vec<ProviderConfig>,
        default_model: Option<String>,
        http: Client,
    ) -> Result<Self, ConfigError> {
        let mut entries = Vec::with_capacity(providers.len());
        for config in providers {
            let kind = config
                .kind()
                .ok_or_else(|| ConfigError::UnsupportedProviderType {
                    provider: config.key().to_string(),
                    provider_type: config.provider_type.clone(),
                })?;
            if config.api_base.trim().is_empty() {
                return Err(ConfigError::MissingApiBase(config.key().to_string()));
            }
            Url::parse(config.api_base.trim()).map_err(|e| ConfigError::InvalidApiBase {
                provider: config.key().to_string(),
                reason: e.to_string(),
            })?;
            entries.push(ProviderEntry {
                config,
                kind,
                key_resolved: false,
            });
        }

        Ok(Self {
            providers: entries,
            default_model: default_model.filter(|m| !m.trim().is_empty()),
            http,
        })
    }

    pub fn default_model(&self) -> Option<&str> {
        self.default_model.as_deref()
    }

    pub fn http_client(&self) -> &Client {
        &self.http
    }

    /// Split `provider:model` at the first colon. Everything after it,
    /// further colons included, is the model name.
    pub fn parse_model_id(model_id: &str) -> Result<(&str, &str), ConfigError> {
        match model_id.split_once(':') {
            Some((provider, model)) if !provider.is_empty() && !model.is_empty() => {
                Ok((provider, model))
            }
            _ => Err(ConfigError::MalformedIdentifier(model_id.to_string())),
        }
    }

    /// Resolve a model identifier into a client. `None` means the configured
    /// default model. An identifier without a provider part is looked up under
    /// the default model's provider.
    pub fn resolve(&mut self, model_id: Option<&str>) -> Result<ResolvedModel, ConfigError> {
        let requested = match model_id.map(str::trim).filter(|m| !m.is_empty()) {
            Some(id) => id.to_string(),
            None => self
                .default_model
                .clone()
                .ok_or(ConfigError::NoModelSpecified)?,
        };
        tracing::debug!("Resolving model {}", requested);

        let qualified = if requested.contains(':') {
            requested
        } else {
            match self.default_model.as_deref().map(Self::parse_model_id) {
                Some(Ok((provider, _))) => format!("{}:{}", provider, requested),
                _ => return Err(ConfigError::MalformedIdentifier(requested)),
            }
        };

        let (provider_key, model_name) = Self::parse_model_id(&qualified)?;
        let idx = self
            .find_provider(provider_key)
            .ok_or_else(|| ConfigError::UnknownProvider(provider_key.to_string()))?;

        let model = self.providers[idx]
            .config
            .find_model(model_name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownModel {
                provider: provider_key.to_string(),
                model: model_name.to_string(),
            })?;

        Self::resolve_api_key(&mut self.providers[idx]);

        let entry = &self.providers[idx];
        let client = self.build_client(entry, &model.name);
        let provider = entry.config.key().to_string();
        tracing::debug!(
            "Resolved {}:{} to a {} client",
            provider,
            model.name,
            entry.kind.display_name()
        );

        Ok(ResolvedModel {
            id: format!("{}:{}", provider, model.name),
            provider,
            model,
            client,
        })
    }

    /// Every `provider:model` identifier, in configuration order.
    pub fn list_models(&self) -> Vec<String> {
        self.providers
            .iter()
            .flat_map(|entry| {
                entry
                    .config
                    .models
                    .iter()
                    .map(move |m| format!("{}:{}", entry.config.key(), m.name))
            })
            .collect()
    }

    pub fn provider_keys(&self) -> Vec<&str> {
        self.providers.iter().map(|e| e.config.key()).collect()
    }

    pub fn provider_kind(&self, key: &str) -> Option<ProviderKind> {
        self.find_provider(key).map(|idx| self.providers[idx].kind)
    }

    /// Swap in a freshly synced model list and hand back the old one. The
    /// provider's resolved key is kept.
    pub fn replace_models(
        &mut self,
        key: &str,
        models: Vec<ModelConfig>,
    ) -> Result<Vec<ModelConfig>, ConfigError> {
        let idx = self
            .find_provider(key)
            .ok_or_else(|| ConfigError::UnknownProvider(key.to_string()))?;
        Ok(std::mem::replace(&mut self.providers[idx].config.models, models))
    }

    /// Exact key match first; otherwise a `type` shared by exactly one provider.
    fn find_provider(&self, key: &str) -> Option<usize> {
        if let Some(idx) = self.providers.iter().position(|e| e.config.key() == key) {
            return Some(idx);
        }
        let mut by_type = self
            .providers
            .iter()
            .enumerate()
            .filter(|(_, e)| e.config.provider_type == key);
        match (by_type.next(), by_type.next()) {
            (Some((idx, _)), None) => Some(idx),
            _ => None,
        }
    }

    fn resolve_api_key(entry: &mut ProviderEntry) {
        if entry.key_resolved {
            return;
        }
        entry.key_resolved = true;

        let Some(var) = entry.config.env_indirection().map(str::to_string) else {
            return;
        };
        match std::env::var(&var) {
            Ok(value) => {
                tracing::debug!("API key for {} read from ${}", entry.config.key(), var);
                entry.config.api_key = value;
            }
            Err(_) => {
                tracing::warn!(
                    "Environment variable {} is not set; provider {} keeps the literal key",
                    var,
                    entry.config.key()
                );
            }
        }
    }

    fn build_client(&self, entry: &ProviderEntry, model: &str) -> Arc<dyn ProviderClient> {
        let config = &entry.config;
        match entry.kind {
            ProviderKind::OpenAi | ProviderKind::Grok => Arc::new(OpenAiClient::new(
                self.http.clone(),
                entry.kind,
                config.api_base.clone(),
                config.api_key.clone(),
                model,
            )),
            ProviderKind::Gemini => Arc::new(GeminiClient::new(
                self.http.clone(),
                config.api_base.clone(),
                config.api_key.clone(),
                model,
            )),
            ProviderKind::OpenAiCompatible => Arc::new(LocalClient::new(
                self.http.clone(),
                config.api_base.clone(),
                config.api_key.clone(),
                model,
            )),
        }
    }
}
