use async_trait::async_trait;
use reqwest::Client;

use super::models::*;
use crate::models::{Message, ProviderKind, Role};
use crate::providers::http::{endpoint, send_json};
use crate::providers::traits::ProviderClient;
use crate::providers::types::{ChatRequest, ProviderError};

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];
const BLOCK_NONE: &str = "BLOCK_NONE";

pub struct GeminiClient {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
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

    /// One text-only entry per user or system message. Assistant turns are
    /// not part of the Gemini payload.
    fn build_contents(messages: &[Message]) -> Vec<GeminiContent> {
        messages
            .iter()
            .filter(|msg| matches!(msg.role(), Role::User | Role::System))
            .map(|msg| GeminiContent {
                parts: vec![GeminiPart {
                    text: Some(msg.content().to_string()),
                }],
            })
            .collect()
    }

    fn safety_settings() -> Vec<GeminiSafetySetting> {
        HARM_CATEGORIES
            .into_iter()
            .map(|category| GeminiSafetySetting {
                category,
                threshold: BLOCK_NONE,
            })
            .collect()
    }

    fn build_request(request: &ChatRequest) -> GeminiRequest {
        GeminiRequest {
            contents: Self::build_contents(&request.messages),
            generation_config: GeminiGenerationConfig {
                temperature: request.temperature,
                top_p: request.top_p,
            },
            safety_settings: Self::safety_settings(),
        }
    }

    /// `candidates[0].content.parts[0].text`, which must be present and non-empty.
    fn extract_text(response: GeminiResponse) -> Result<String, ProviderError> {
        response
            .candidates
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| ProviderError::Format("No content in response".to_string()))
    }
}

#[async_trait]
impl ProviderClient for GeminiClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn send_message(&self, request: ChatRequest) -> Result<String, ProviderError> {
        if request.messages.is_empty() {
            return Err(ProviderError::EmptyConversation);
        }

        let url = endpoint(
            &self.api_base,
            &format!("models/{}:generateContent", self.model),
        );
        let gemini_request = Self::build_request(&request);
        tracing::debug!(
            "gemini request to {} ({} of {} messages kept)",
            url,
            gemini_request.contents.len(),
            request.messages.len()
        );

        let req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&gemini_request);

        let response: GeminiResponse = send_json(req).await?;
        Self::extract_text(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn candidate(text: &str) -> serde_json::Value {
        json!({"candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]})
    }

    #[test]
    fn test_assistant_turns_are_dropped() {
        let messages = vec![
            Message::system("sys"),
            Message::user("first"),
            Message::assistant("reply"),
            Message::user("second"),
        ];
        let contents = GeminiClient::build_contents(&messages);
        let texts: Vec<_> = contents
            .iter()
            .map(|c| c.parts[0].text.as_deref().unwrap())
            .collect();
        assert_eq!(texts, vec!["sys", "first", "second"]);
    }

    #[tokio::test]
    async fn test_sends_gemini_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-pro:generateContent"))
            .and(header("x-goog-api-key", "g-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate("hola")))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiClient::new(
            Client::new(),
            format!("{}/v1beta", server.uri()),
            "g-key",
            "gemini-1.5-pro",
        );
        let request = ChatRequest::new(
            vec![Message::assistant("earlier"), Message::user("hi")],
            1.0,
        );
        assert_eq!(client.send_message(request).await.unwrap(), "hola");

        let received = &server.received_requests().await.unwrap()[0];
        assert!(received.headers.get("authorization").is_none());
        let body = received.body_json::<serde_json::Value>().unwrap();
        assert_eq!(
            body,
            json!({
                "contents": [{"parts": [{"text": "hi"}]}],
                "generationConfig": {"temperature": 1.0},
                "safetySettings": [
                    {"category": "HARM_CATEGORY_HARASSMENT", "threshold": "BLOCK_NONE"},
                    {"category": "HARM_CATEGORY_HATE_SPEECH", "threshold": "BLOCK_NONE"},
                    {"category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": "BLOCK_NONE"},
                    {"category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": "BLOCK_NONE"}
                ]
            })
        );
    }

    #[tokio::test]
    async fn test_top_p_goes_into_generation_config() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate("ok")))
            .mount(&server)
            .await;

        let client = GeminiClient::new(Client::new(), server.uri(), "k", "gemini-1.5-pro");
        let request = ChatRequest::new(vec![Message::user("hi")], 0.5).with_top_p(Some(0.25));
        client.send_message(request).await.unwrap();

        let received = &server.received_requests().await.unwrap()[0];
        let body = received.body_json::<serde_json::Value>().unwrap();
        assert_eq!(body["generationConfig"], json!({"temperature": 0.5, "topP": 0.25}));
    }

    #[tokio::test]
    async fn test_blocked_prompt_is_format_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"promptFeedback": {"blockReason": "OTHER"}}),
            ))
            .mount(&server)
            .await;

        let client = GeminiClient::new(Client::new(), server.uri(), "k", "gemini-1.5-pro");
        let err = client
            .send_message(ChatRequest::new(vec![Message::user("hi")], 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Format(_)));
    }

    #[tokio::test]
    async fn test_bad_key_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("{\"error\":{\"message\":\"API key not valid\"}}"))
            .mount(&server)
            .await;

        let client = GeminiClient::new(Client::new(), server.uri(), "bad", "gemini-1.5-pro");
        let err = client
            .send_message(ChatRequest::new(vec![Message::user("hi")], 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Upstream { status: 400, .. }));
        assert!(err.to_string().contains("API key not valid"));
    }
}
