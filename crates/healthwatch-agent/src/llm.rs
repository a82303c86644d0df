//! A minimal OpenAI-compatible chat-completions client with tool calling,
//! grounded in the teacher's `ModelRouter` (bearer-auth POST to a
//! configurable chat endpoint, `model` + `messages` body) but extended with
//! a `tools` array and `tool_calls` parsing, since the agent loop (§4.9)
//! needs the model to invoke a closed set of tools rather than just emit
//! text.

use healthwatch_core::error::{HealthWatchError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolUseRequest {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct AssistantTurn {
    pub text: Option<String>,
    pub tool_uses: Vec<ToolUseRequest>,
}

pub struct LlmClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl LlmClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Sends the running transcript plus the tool catalog, and returns the
    /// model's reply as free text plus any tool-use blocks it emitted.
    pub async fn next_turn(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<AssistantTurn> {
        let body = MessagesRequest {
            model: self.model.clone(),
            max_tokens: 2048,
            system: system_prompt.to_string(),
            messages: messages
                .iter()
                .map(|m| MessagesRequestMessage { role: m.role.clone(), content: m.content.clone() })
                .collect(),
            tools: tools
                .iter()
                .map(|t| ToolSpec {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    input_schema: t.input_schema.clone(),
                })
                .collect(),
        };
        let resp = self
            .http
            .post(DEFAULT_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(HealthWatchError::Remote(format!(
                "language model request failed with status {}",
                resp.status()
            )));
        }
        let parsed: MessagesResponse = resp.json().await.map_err(|e| HealthWatchError::Data(e.to_string()))?;
        let mut text = None;
        let mut tool_uses = Vec::new();
        for block in parsed.content {
            match block {
                ContentBlock::Text { text: t } => text = Some(t),
                ContentBlock::ToolUse { id, name, input } => tool_uses.push(ToolUseRequest { id, name, input }),
            }
        }
        Ok(AssistantTurn { text, tool_uses })
    }
}

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<MessagesRequestMessage>,
    tools: Vec<ToolSpec>,
}

#[derive(Serialize)]
struct MessagesRequestMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ToolSpec {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: serde_json::Value },
}
