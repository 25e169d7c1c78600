//! Azure OpenAI client for embeddings and chat completions.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use crate::error::{CompletionError, EmbeddingError};
use crate::models::OpenAIConfig;
use crate::services::provider::{ChatMessage, CompletionProvider, EmbeddingProvider};

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    data: Vec<EmbedData>,
}

#[derive(Debug, Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Client for one Azure OpenAI resource with a chat and an embedding
/// deployment.
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    client: Client,
    endpoint: String,
    api_key: String,
    api_version: String,
    chat_deployment: String,
    embedding_deployment: String,
    max_tokens: u32,
    temperature: f32,
    dimension: usize,
}

impl OpenAIClient {
    pub fn new(config: &OpenAIConfig, dimension: u32) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
            chat_deployment: config.chat_deployment.clone(),
            embedding_deployment: config.embedding_deployment.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            dimension: dimension as usize,
        })
    }

    fn deployment_url(&self, deployment: &str, operation: &str) -> String {
        format!(
            "{}/openai/deployments/{}/{}?api-version={}",
            self.endpoint, deployment, operation, self.api_version
        )
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<Response, reqwest::Error> {
        self.client
            .post(url)
            .header("api-key", &self.api_key)
            .json(body)
            .send()
            .await
    }
}

async fn error_body(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    format!("status {}: {}", status, body)
}

#[async_trait]
impl EmbeddingProvider for OpenAIClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let url = self.deployment_url(&self.embedding_deployment, "embeddings");
        let response = self
            .post(&url, &EmbedRequest { input: text })
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbeddingError::Timeout
                } else if e.is_connect() {
                    EmbeddingError::ConnectionError(e.to_string())
                } else {
                    EmbeddingError::RequestError(e)
                }
            })?;

        if !response.status().is_success() {
            return Err(EmbeddingError::ServerError(error_body(response).await));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        let vector = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::InvalidResponse("empty embedding response".to_string()))?;

        if vector.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }
}

#[async_trait]
impl CompletionProvider for OpenAIClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        let url = self.deployment_url(&self.chat_deployment, "chat/completions");
        let request = ChatRequest {
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self.post(&url, &request).await.map_err(|e| {
            if e.is_connect() {
                CompletionError::ConnectionError(e.to_string())
            } else {
                CompletionError::RequestError(e)
            }
        })?;

        if !response.status().is_success() {
            return Err(CompletionError::ServerError(error_body(response).await));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::InvalidResponse(e.to_string()))?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, dimension: u32) -> OpenAIClient {
        let config = OpenAIConfig {
            endpoint: format!("{}/", server.uri()),
            api_key: "secret".to_string(),
            chat_deployment: "gpt".to_string(),
            embedding_deployment: "ada".to_string(),
            ..Default::default()
        };
        OpenAIClient::new(&config, dimension).unwrap()
    }

    #[tokio::test]
    async fn test_embed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/deployments/ada/embeddings"))
            .and(query_param("api-version", "2024-02-01"))
            .and(header("api-key", "secret"))
            .and(body_partial_json(json!({"input": "hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"embedding": [0.1, 0.2, 0.3]}]
            })))
            .mount(&server)
            .await;

        let vector = client_for(&server, 3).embed("hello").await.unwrap();
        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn test_embed_dimension_mismatch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/deployments/ada/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"embedding": [0.1, 0.2]}]
            })))
            .mount(&server)
            .await;

        let err = client_for(&server, 1536).embed("hello").await.unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::DimensionMismatch {
                expected: 1536,
                actual: 2
            }
        ));
    }

    #[tokio::test]
    async fn test_complete_sends_settings() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/deployments/gpt/chat/completions"))
            .and(body_partial_json(json!({
                "max_tokens": 200,
                "messages": [{"role": "system", "content": "be brief"}, {"role": "user", "content": "hi"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "Hello [Source1]"}}]
            })))
            .mount(&server)
            .await;

        let text = client_for(&server, 3)
            .complete(&[ChatMessage::system("be brief"), ChatMessage::user("hi")])
            .await
            .unwrap();
        assert_eq!(text, "Hello [Source1]");
    }

    #[tokio::test]
    async fn test_complete_null_content_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": null}}]
            })))
            .mount(&server)
            .await;

        let text = client_for(&server, 3)
            .complete(&[ChatMessage::user("hi")])
            .await
            .unwrap();
        assert!(text.is_empty());
    }

    #[tokio::test]
    async fn test_complete_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let err = client_for(&server, 3)
            .complete(&[ChatMessage::user("hi")])
            .await
            .unwrap_err();
        match err {
            CompletionError::ServerError(msg) => {
                assert!(msg.contains("429"));
                assert!(msg.contains("rate limited"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
