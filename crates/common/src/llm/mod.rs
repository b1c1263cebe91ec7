//! Chat model abstraction
//!
//! One narrow seam over chat-completion providers. The agent uses it for
//! three distinct calls: plan generation (temperature 0, JSON output),
//! per-batch evidence classification (temperature 0, JSON output), and
//! final synthesis.

use crate::config::ChatConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Options for a single chat completion
#[derive(Debug, Clone)]
pub struct ChatOptions {
    /// Sampling temperature (0.0 for structured output)
    pub temperature: f32,
    /// Ask the provider to emit a JSON object
    pub json_output: bool,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            json_output: false,
        }
    }
}

/// Trait for chat completion
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// One completion: system prompt + user message in, assistant text out
    async fn complete(&self, system: &str, user: &str, options: &ChatOptions) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// OpenAI-compatible chat client
pub struct OpenAiChat {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: String,
}

impl OpenAiChat {
    /// Create a new chat client from configuration
    pub fn new(config: &ChatConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, system: &str, user: &str, options: &ChatOptions) -> Result<String> {
        counter!("rishi_chat_requests_total").increment(1);
        let started = Instant::now();
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: options.temperature,
            response_format: options.json_output.then(|| ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::ChatModel {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ChatModel {
                message: format!("API error {}: {}", status, body),
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| AppError::ChatModel {
            message: format!("Failed to parse response: {}", e),
        })?;

        histogram!("rishi_chat_duration_seconds").record(started.elapsed().as_secs_f64());
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::ChatModel {
                message: "Empty response".to_string(),
            })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Scriptable mock chat model for tests
///
/// Returns queued responses in order; an empty queue repeats the last
/// response, an error entry yields an error.
pub struct MockChat {
    responses: Mutex<Vec<std::result::Result<String, String>>>,
    last: Mutex<Option<String>>,
}

impl MockChat {
    /// Mock that always answers with `response`
    pub fn always(response: &str) -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            last: Mutex::new(Some(response.to_string())),
        }
    }

    /// Mock that answers from a queue of Ok/Err entries
    pub fn scripted(responses: Vec<std::result::Result<String, String>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            last: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ChatModel for MockChat {
    async fn complete(&self, _system: &str, _user: &str, _options: &ChatOptions) -> Result<String> {
        let mut queue = self.responses.lock().unwrap();
        if queue.is_empty() {
            return self
                .last
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| AppError::ChatModel {
                    message: "MockChat exhausted".to_string(),
                });
        }
        match queue.remove(0) {
            Ok(text) => {
                *self.last.lock().unwrap() = Some(text.clone());
                Ok(text)
            }
            Err(message) => Err(AppError::ChatModel { message }),
        }
    }

    fn model_name(&self) -> &str {
        "mock-chat"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_always() {
        let chat = MockChat::always("om");
        let options = ChatOptions::default();
        assert_eq!(chat.complete("s", "u", &options).await.unwrap(), "om");
        assert_eq!(chat.complete("s", "u", &options).await.unwrap(), "om");
    }

    #[tokio::test]
    async fn test_mock_scripted_errors() {
        let chat = MockChat::scripted(vec![
            Ok("first".to_string()),
            Err("boom".to_string()),
        ]);
        let options = ChatOptions::default();
        assert_eq!(chat.complete("s", "u", &options).await.unwrap(), "first");
        let err = chat.complete("s", "u", &options).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
        // Queue exhausted; repeats last successful response.
        assert_eq!(chat.complete("s", "u", &options).await.unwrap(), "first");
    }
}
