use async_trait::async_trait;
use reqwest::Client;

use super::models::*;
use crate::models::ProviderKind;
use crate::providers::http::{endpoint, send_json};
use crate::providers::traits::ProviderClient;
use crate::providers::types::{ChatRequest, ProviderError};

/// OpenAI chat-completions client. Also serves xAI Grok, which speaks the same protocol.
pub struct OpenAiClient {
    client: Client,
    kind: ProviderKind,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(
        client: Client,
        kind: ProviderKind,
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            kind,
            api_base: api_base.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub(crate) fn build_body<'a>(model: &'a str, request: &'a ChatRequest) -> OpenAiRequest<'a> {
        OpenAiRequest {
            model,
            messages: &request.messages,
            temperature: request.temperature,
            top_p: request.top_p,
        }
    }

    /// `choices[0].message.content`, which must be present and non-empty.
    pub(crate) fn extract_content(response: OpenAiResponse) -> Result<String, ProviderError> {
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| ProviderError::Format("No content in response".to_string()))
    }
}

#[async_trait]
impl ProviderClient for OpenAiClient {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn send_message(&self, request: ChatRequest) -> Result<String, ProviderError> {
        if request.messages.is_empty() {
            return Err(ProviderError::EmptyConversation);
        }

        let url = endpoint(&self.api_base, "chat/completions");
        let body = Self::build_body(&self.model, &request);
        tracing::debug!(
            "{} request to {} ({} messages)",
            self.kind.as_str(),
            url,
            request.messages.len()
        );

        let req = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body);

        let response: OpenAiResponse = send_json(req).await?;
        Self::extract_content(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Message;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion(text: &str) -> serde_json::Value {
        json!({"choices": [{"message": {"role": "assistant", "content": text}}]})
    }

    #[tokio::test]
    async fn test_sends_openai_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("hello")))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiClient::new(
            Client::new(),
            ProviderKind::OpenAi,
            format!("{}/v1", server.uri()),
            "sk-test",
            "gpt-4o",
        );
        let request = ChatRequest::new(
            vec![Message::system("be brief"), Message::user("hi")],
            0.5,
        );
        let text = client.send_message(request).await.unwrap();
        assert_eq!(text, "hello");

        let received = &server.received_requests().await.unwrap()[0];
        let body = received.body_json::<serde_json::Value>().unwrap();
        assert_eq!(
            body,
            json!({
                "model": "gpt-4o",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hi"}
                ],
                "temperature": 0.5
            })
        );
    }

    #[tokio::test]
    async fn test_top_p_only_when_set() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
            .mount(&server)
            .await;

        let client = OpenAiClient::new(Client::new(), ProviderKind::Grok, server.uri(), "k", "grok-beta");
        let request = ChatRequest::new(vec![Message::user("hi")], 1.0).with_top_p(Some(0.5));
        client.send_message(request).await.unwrap();

        let received = &server.received_requests().await.unwrap()[0];
        let body = received.body_json::<serde_json::Value>().unwrap();
        assert_eq!(body["top_p"], json!(0.5));
        assert_eq!(body["model"], json!("grok-beta"));
    }

    #[tokio::test]
    async fn test_non_success_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let client = OpenAiClient::new(Client::new(), ProviderKind::OpenAi, server.uri(), "k", "gpt-4o");
        let err = client
            .send_message(ChatRequest::new(vec![Message::user("hi")], 1.0))
            .await
            .unwrap_err();
        match err {
            ProviderError::Upstream { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "slow down");
            }
            other => panic!("Expected Upstream, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_content_is_format_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let client = OpenAiClient::new(Client::new(), ProviderKind::OpenAi, server.uri(), "k", "gpt-4o");
        let err = client
            .send_message(ChatRequest::new(vec![Message::user("hi")], 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Format(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop a listener so the port is very likely closed.
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let uri = format!("http://{}", addr);

        let client = OpenAiClient::new(Client::new(), ProviderKind::OpenAi, uri, "k", "gpt-4o");
        let err = client
            .send_message(ChatRequest::new(vec![Message::user("hi")], 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Transport(_)));
    }

    #[tokio::test]
    async fn test_empty_message_list_is_rejected() {
        let client = OpenAiClient::new(
            Client::new(),
            ProviderKind::OpenAi,
            "http://127.0.0.1:9",
            "k",
            "gpt-4o",
        );
        let err = client
            .send_message(ChatRequest::new(Vec::new(), 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::EmptyConversation));
    }
}
