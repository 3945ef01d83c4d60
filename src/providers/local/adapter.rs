use async_trait::async_trait;
use reqwest::Client;

use super::models::*;
use crate::models::ProviderKind;
use crate::providers::http::{endpoint, send_json};
use crate::providers::openai::models::OpenAiResponse;
use crate::providers::openai::OpenAiClient;
use crate::providers::traits::ProviderClient;
use crate::providers::types::{ChatRequest, ProviderError};

/// Self-hosted OpenAI-compatible server (Ollama, llama.cpp, vLLM, ...).
/// Identical to the OpenAI protocol except that the bearer token is optional.
pub struct LocalClient {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl LocalClient {
    pub fn new(
        client: Client,
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn build_auth_header(api_key: &str) -> Option<String> {
        if api_key.is_empty() {
            None
        } else {
            Some(format!("Bearer {}", api_key))
        }
    }

    /// Server root for the native Ollama API: `api_base` without a trailing `/v1`.
    pub fn native_root(api_base: &str) -> &str {
        let trimmed = api_base.trim_end_matches('/');
        trimmed.strip_suffix("/v1").unwrap_or(trimmed)
    }

    /// Names of the models the server has pulled, in server order.
    pub async fn fetch_model_names(
        client: &Client,
        api_base: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let url = endpoint(Self::native_root(api_base), "api/tags");
        tracing::debug!("Listing local models from {}", url);

        let tags: OllamaTagsResponse = send_json(client.get(&url)).await?;
        Ok(tags
            .models
            .into_iter()
            .filter_map(|m| m.name)
            .filter(|name| !name.is_empty())
            .collect())
    }
}

#[async_trait]
impl ProviderClient for LocalClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAiCompatible
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn send_message(&self, request: ChatRequest) -> Result<String, ProviderError> {
        if request.messages.is_empty() {
            return Err(ProviderError::EmptyConversation);
        }

        let url = endpoint(&self.api_base, "chat/completions");
        let body = OpenAiClient::build_body(&self.model, &request);
        tracing::debug!("local request to {} ({} messages)", url, request.messages.len());

        let mut req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);

        if let Some(auth) = Self::build_auth_header(&self.api_key) {
            req = req.header("Authorization", auth);
        }

        let response: OpenAiResponse = send_json(req).await?;
        OpenAiClient::extract_content(response)
    }
}
