use async_trait::async_trait;

use super::types::{ChatRequest, ProviderError};
use crate::models::ProviderKind;

/// One backend wire protocol, bound to a single configured model.
///
/// Implementations perform exactly one outbound call per `send_message` and
/// never retry.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn model_name(&self) -> &str;

    async fn send_message(&self, request: ChatRequest) -> Result<String, ProviderError>;
}
