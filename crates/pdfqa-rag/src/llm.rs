//! LLM Client implementations
//!
//! Provides clients for OpenAI-compatible chat completion APIs (Groq,
//! OpenAI) and for a local Ollama server. Every call is a single
//! non-streaming request; the generated text is returned unmodified.

use std::time::Duration;

use async_trait::async_trait;
use pdfqa_core::{ChatMessage, LlmClient, LlmConfig, LlmProvider, PdfQaError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| PdfQaError::Llm(format!("Failed to build HTTP client: {e}")))
}

// ============================================================================
// Chat Completions Client (Groq / OpenAI)
// ============================================================================

/// Client for the OpenAI-compatible `/chat/completions` endpoint
pub struct ChatCompletionsClient {
    client: Client,
    provider: LlmProvider,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionsClient {
    /// Create a new client
    pub fn new(
        provider: LlmProvider,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            provider,
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            max_tokens: None,
            temperature: None,
        }
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config.require_api_key()?;

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            provider: config.provider,
            api_key: api_key.to_string(),
            base_url: config.resolved_base_url(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    fn label(&self) -> &'static str {
        match self.provider {
            LlmProvider::Groq => "Groq",
            LlmProvider::OpenAI => "OpenAI",
            LlmProvider::Ollama => "Ollama",
        }
    }
}

#[async_trait]
impl LlmClient for ChatCompletionsClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| PdfQaError::Llm(format!("{} request failed: {e}", self.label())))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PdfQaError::Llm(format!(
                "{} error ({status}): {error_text}",
                self.label()
            )));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| PdfQaError::Llm(format!("Failed to parse response: {e}")))?;

        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| PdfQaError::Llm("No response generated".to_string()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Ollama Client
// ============================================================================

/// Ollama API client
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    options: OllamaOptions,
}

#[derive(Debug, Default, Clone, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

impl OllamaOptions {
    fn is_empty(&self) -> bool {
        self.num_predict.is_none() && self.temperature.is_none()
    }
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "OllamaOptions::is_empty")]
    options: &'a OllamaOptions,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: ResponseMessage,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            options: OllamaOptions::default(),
        }
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: config.resolved_base_url(),
            model: config.model.clone(),
            options: OllamaOptions {
                num_predict: config.max_tokens,
                temperature: config.temperature,
            },
        })
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = OllamaRequest {
            model: &self.model,
            messages,
            stream: false,
            options: &self.options,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| PdfQaError::Llm(format!("Ollama request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PdfQaError::Llm(format!(
                "Ollama error ({status}): {error_text}"
            )));
        }

        let result: OllamaResponse = response
            .json()
            .await
            .map_err(|e| PdfQaError::Llm(format!("Failed to parse Ollama response: {e}")))?;

        result
            .message
            .content
            .ok_or_else(|| PdfQaError::Llm("No response generated".to_string()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Factory function
// ============================================================================

/// Create an LLM client from config
pub fn create_llm_client(config: &LlmConfig) -> Result<Box<dyn LlmClient>> {
    match config.provider {
        LlmProvider::Groq | LlmProvider::OpenAI => {
            Ok(Box::new(ChatCompletionsClient::from_config(config)?))
        }
        LlmProvider::Ollama => Ok(Box::new(OllamaClient::from_config(config)?)),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one HTTP response and hand back the raw request
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];

            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);

                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                        })
                        .unwrap_or(0);
                    if raw.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();

            String::from_utf8_lossy(&raw).to_string()
        });

        (url, handle)
    }

    #[test]
    fn test_request_omits_unset_sampling() {
        let messages = [ChatMessage::user("hi")];
        let request = ChatRequest {
            model: "llama3-70b-8192",
            messages: &messages,
            max_tokens: None,
            temperature: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "llama3-70b-8192",
                "messages": [{"role": "user", "content": "hi"}]
            })
        );

        let request = ChatRequest {
            max_tokens: Some(512),
            temperature: Some(0.2),
            ..request
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["max_tokens"], 512);
        assert!(json.get("temperature").is_some());
    }

    #[test]
    fn test_ollama_request_shape() {
        let messages = [ChatMessage::user("hi")];
        let options = OllamaOptions::default();
        let request = OllamaRequest {
            model: "llama3",
            messages: &messages,
            stream: false,
            options: &options,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], false);
        assert!(json.get("options").is_none());
    }

    #[test]
    fn test_factory_requires_groq_key() {
        let config = LlmConfig::default();
        assert!(matches!(
            create_llm_client(&config),
            Err(PdfQaError::Config(_))
        ));

        let config = LlmConfig {
            groq_api_key: Some("gsk_test".to_string()),
            ..Default::default()
        };
        let client = create_llm_client(&config).unwrap();
        assert_eq!(client.model(), "llama3-70b-8192");
    }

    #[test]
    fn test_factory_ollama_needs_no_key() {
        let config = LlmConfig {
            provider: LlmProvider::Ollama,
            model: "llama3".to_string(),
            ..Default::default()
        };
        let client = create_llm_client(&config).unwrap();
        assert_eq!(client.model(), "llama3");
    }

    #[tokio::test]
    async fn test_chat_completion_round_trip() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"Paris."},"finish_reason":"stop"}]}"#,
        )
        .await;

        let client = ChatCompletionsClient::new(LlmProvider::Groq, "gsk_test", url, "llama3-70b-8192");
        let answer = client.generate("What is the capital of France?").await.unwrap();
        assert_eq!(answer, "Paris.");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /chat/completions"));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer gsk_test"));
        assert!(request.contains("What is the capital of France?"));
        assert!(!request.contains("max_tokens"));
    }

    #[tokio::test]
    async fn test_provider_error_is_reported_verbatim() {
        let (url, server) = serve_once(
            "429 Too Many Requests",
            r#"{"error":{"message":"Rate limit reached"}}"#,
        )
        .await;

        let client = ChatCompletionsClient::new(LlmProvider::Groq, "gsk_test", url, "llama3-70b-8192");
        let err = client.generate("hello").await.unwrap_err();
        server.await.unwrap();

        match err {
            PdfQaError::Llm(message) => {
                assert!(message.contains("429"));
                assert!(message.contains("Rate limit reached"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_ollama_chat_round_trip() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"model":"llama3","message":{"role":"assistant","content":"Bonjour"},"done":true}"#,
        )
        .await;

        let client = OllamaClient::new(url, "llama3");
        let answer = client.generate("Say hello in French").await.unwrap();
        assert_eq!(answer, "Bonjour");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/chat"));
        assert!(request.contains("\"stream\":false"));
    }
}
