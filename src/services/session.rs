use thiserror::Error;

use super::config_store::ConfigStore;
use super::history::ConversationHistory;
use super::roles::{effective_temperature, effective_top_p, RoleEngine};
use crate::config::ConfigError;
use crate::models::{ActiveRole, Message, ModelConfig, ProviderKind};
use crate::providers::http::build_client;
use crate::providers::{ChatRequest, ProviderError, ProviderRouter, ResolvedModel};

#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Role '{0}' not found")]
    RoleNotFound(String),
}

/// Caller-supplied overrides for a session. Role values still take precedence
/// on every turn.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Start on this model instead of the configured default.
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
}

/// Result of a model sync.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub provider: String,
    pub models: Vec<ModelConfig>,
    /// Set when the active model was dropped and the session moved to another.
    pub switched_to: Option<String>,
}

/// The active model, the active role and the history of one conversation.
///
/// Every state-changing operation takes `&mut self`, so nothing can switch
/// the model or role while a `send` is still awaiting its answer.
pub struct ChatSession {
    router: ProviderRouter,
    roles: RoleEngine,
    current: ResolvedModel,
    active_role: Option<ActiveRole>,
    history: ConversationHistory,
    options: SessionOptions,
}

impl ChatSession {
    /// Build a session from the stored configuration. Any provider or model
    /// problem here is fatal.
    pub fn initialize(store: &dyn ConfigStore, mut options: SessionOptions) -> Result<Self, ChatError> {
        let http = build_client(store.request_timeout())
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        let router = ProviderRouter::new(store.providers(), store.default_model(), http)?;
        options.temperature = options.temperature.or(store.temperature());
        Self::from_parts(router, RoleEngine::new(store.roles()), options)
    }

    pub fn from_parts(
        mut router: ProviderRouter,
        roles: RoleEngine,
        options: SessionOptions,
    ) -> Result<Self, ChatError> {
        let current = router.resolve(options.model.as_deref())?;
        tracing::info!("Session started on {}", current.id);
        Ok(Self {
            router,
            roles,
            current,
            active_role: None,
            history: ConversationHistory::new(),
            options,
        })
    }

    /// Send one user turn through the active role and model.
    ///
    /// History grows by exactly the raw input and the answer, and only when
    /// the provider call succeeds.
    pub async fn send(&mut self, user_input: &str) -> Result<String, ChatError> {
        let role = self.active_role.as_ref();
        let messages = RoleEngine::build_messages(user_input, role, self.history.messages());
        let request = ChatRequest::new(messages, effective_temperature(role, self.options.temperature))
            .with_top_p(effective_top_p(role, self.options.top_p));

        tracing::debug!(
            "Sending {} message(s) to {} (temperature {}, role {})",
            request.messages.len(),
            self.current.id,
            request.temperature,
            role.map(ActiveRole::name).unwrap_or("none")
        );

        match self.current.client.send_message(request).await {
            Ok(answer) => {
                self.history.append_turn(user_input, answer.as_str());
                Ok(answer)
            }
            Err(e) => {
                tracing::error!("Request to {} failed: {}", self.current.id, e);
                Err(e.into())
            }
        }
    }

    /// Activate a catalog role. A role bound to another model switches to it
    /// first; if that switch fails nothing changes.
    pub fn set_role(&mut self, name: &str) -> Result<(), ChatError> {
        let role = self
            .roles
            .get(name)
            .map(|config| config.resolve())
            .ok_or_else(|| ChatError::RoleNotFound(name.to_string()))?;

        if let Some(model_id) = role.model() {
            let target = self.router.resolve(Some(model_id))?;
            if target.id != self.current.id {
                tracing::info!("Role {} switches model to {}", role.name(), target.id);
                self.current = target;
            }
        }

        tracing::info!("Role {} active ({})", role.name(), role.kind().as_str());
        self.active_role = Some(role);
        Ok(())
    }

    /// Drop the active role and go back to the configured default model.
    pub fn clear_role(&mut self) {
        if let Some(role) = self.active_role.take() {
            tracing::info!("Role {} cleared", role.name());
        }
        if self.router.default_model().is_none() {
            return;
        }
        match self.router.resolve(None) {
            Ok(default) if default.id != self.current.id => {
                tracing::info!("Restoring default model {}", default.id);
                self.current = default;
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Could not restore the default model: {}", e),
        }
    }

    /// On failure the previous model stays active.
    pub fn switch_model(&mut self, model_id: &str) -> Result<(), ChatError> {
        let resolved = self.router.resolve(Some(model_id))?;
        tracing::info!("Switched model from {} to {}", self.current.id, resolved.id);
        self.current = resolved;
        Ok(())
    }

    pub fn history(&self) -> &[Message] {
        self.history.messages()
    }

    pub fn last_answer(&self) -> Option<&str> {
        self.history.last_answer()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn current_model(&self) -> &ResolvedModel {
        &self.current
    }

    pub fn active_role(&self) -> Option<&ActiveRole> {
        self.active_role.as_ref()
    }

    pub fn roles(&self) -> &RoleEngine {
        &self.roles
    }

    pub fn list_models(&self) -> Vec<String> {
        self.router.list_models()
    }

    /// Refresh a self-hosted provider's model list through the store and
    /// apply it in memory. Without a name the first openai-compatible
    /// provider is used.
    ///
    /// When the active model is no longer listed, the session moves to the
    /// default model, then to the first model left on the same provider, then
    /// to the first model anywhere. With nothing to move to, the in-memory
    /// list is restored and the sync fails.
    pub async fn sync_models(
        &mut self,
        store: &mut dyn ConfigStore,
        provider: Option<&str>,
    ) -> Result<SyncOutcome, ChatError> {
        let name = match provider {
            Some(name) => name.to_string(),
            None => self
                .router
                .provider_keys()
                .into_iter()
                .find(|key| self.router.provider_kind(key) == Some(ProviderKind::OpenAiCompatible))
                .map(str::to_string)
                .ok_or_else(|| {
                    ConfigError::UnknownProvider(ProviderKind::OpenAiCompatible.as_str().to_string())
                })?,
        };

        let http = self.router.http_client().clone();
        let models = store.sync_models_for_provider(&name, &http).await?;
        let previous = self.router.replace_models(&name, models.clone())?;

        let mut switched_to = None;
        if self.router.resolve(Some(&self.current.id)).is_err() {
            tracing::warn!("Current model {} is no longer served by {}", self.current.id, name);
            match self.fallback_model() {
                Some(fallback) => {
                    tracing::info!("Switched model from {} to {}", self.current.id, fallback.id);
                    switched_to = Some(fallback.id.clone());
                    self.current = fallback;
                }
                None => {
                    self.router.replace_models(&name, previous)?;
                    return Err(ConfigError::Sync {
                        provider: name,
                        reason: "no model is left to switch to".to_string(),
                    }
                    .into());
                }
            }
        }

        Ok(SyncOutcome {
            provider: name,
            models,
            switched_to,
        })
    }

    fn fallback_model(&mut self) -> Option<ResolvedModel> {
        let prefix = format!("{}:", self.current.provider);
        let (same_provider, others): (Vec<String>, Vec<String>) = self
            .router
            .list_models()
            .into_iter()
            .partition(|id| id.starts_with(&prefix));

        std::iter::once(None)
            .chain(same_provider.into_iter().chain(others).map(Some))
            .find_map(|id| self.router.resolve(id.as_deref()).ok())
    }
}
