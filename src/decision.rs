use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::DecisionConfig;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecisionError {
    #[error("decision service request failed: {0}")]
    Transport(String),
    #[error("decision service returned no content")]
    EmptyResponse,
    #[error("decision service response could not be read: {0}")]
    MalformedResponse(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Given the context document for a cycle, propose one command as raw text.
#[async_trait]
pub trait DecisionClient: Send + Sync {
    async fn propose(&self, context: &str) -> Result<String, DecisionError>;
}

const SYSTEM_PROMPT: &str = "You are a disciplined derivatives trader. \
Answer with exactly one JSON command object as described in the user message.";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Decision service reached through an OpenAI-compatible `/chat/completions` endpoint.
pub struct HttpDecisionClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: Option<f32>,
}

impl HttpDecisionClient {
    pub fn new(config: &DecisionConfig) -> Result<Self, DecisionError> {
        let api_key = config.get_api_key().ok_or_else(|| {
            DecisionError::Configuration(
                "decision api_key not set (check config or OPENAI_API_KEY)".to_string(),
            )
        })?;

        Ok(Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl DecisionClient for HttpDecisionClient {
    async fn propose(&self, context: &str) -> Result<String, DecisionError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: context },
            ],
            temperature: self.temperature,
        };

        debug!(model = %self.model, prompt_len = context.len(), "requesting decision");
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| DecisionError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| DecisionError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(DecisionError::Transport(format!("HTTP {}: {}", status, text)));
        }

        extract_reply(&text)
    }
}

fn extract_reply(body: &str) -> Result<String, DecisionError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| DecisionError::MalformedResponse(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or(DecisionError::EmptyResponse)
}
