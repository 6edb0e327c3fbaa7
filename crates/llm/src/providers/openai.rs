//! An OpenAI-compatible chat-completions client, per §6's wire contract:
//! tool calls travel as `choices[0].message.tool_calls[]`, each with `id`,
//! `function.name`, `function.arguments` (a JSON string). Extra response
//! fields are ignored rather than rejected, so the client tolerates
//! provider-specific additions.

use crate::client::{ChatModel, ChatRequest};
use crate::error::LlmError;
use crate::message::{ChatResponse, Message, Role, ToolCall, ToolDefinition, UsageMetadata};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            timeout: Duration::from_secs(180),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Clone)]
pub struct OpenAiClient {
    config: OpenAiConfig,
    http: Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Self {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .expect("failed to build http client");
        Self { config, http }
    }

    fn convert_message(message: &Message) -> WireMessage {
        WireMessage {
            role: role_str(message.role).to_string(),
            content: if message.content.is_empty() && message.tool_calls.is_some() {
                None
            } else {
                Some(message.content.clone())
            },
            name: message.name.clone(),
            tool_call_id: message.tool_call_id.clone(),
            tool_calls: message.tool_calls.as_ref().map(|calls| {
                calls
                    .iter()
                    .map(|c| WireToolCall {
                        id: c.id.clone(),
                        kind: "function".to_string(),
                        function: WireFunctionCall {
                            name: c.name.clone(),
                            arguments: c.arguments_json.clone(),
                        },
                    })
                    .collect()
            }),
            reasoning_content: message.reasoning_content.clone(),
        }
    }

    fn convert_tool(tool: &ToolDefinition) -> WireTool {
        WireTool {
            kind: "function".to_string(),
            function: WireFunctionDef {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.parameters.clone().unwrap_or_else(|| serde_json::json!({"type": "object", "properties": {}})),
            },
        }
    }

    fn convert_response(response: WireResponse) -> Result<ChatResponse, LlmError> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("response had no choices".into()))?;

        let tool_calls = choice.message.tool_calls.map(|calls| {
            calls
                .into_iter()
                .map(|c| ToolCall {
                    id: c.id,
                    name: c.function.name,
                    arguments_json: c.function.arguments,
                })
                .collect::<Vec<_>>()
        });

        let message = Message {
            role: Role::Assistant,
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            tool_call_id: None,
            name: None,
            reasoning_content: choice.message.reasoning_content,
        };

        let usage = response
            .usage
            .map(|u| UsageMetadata::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(ChatResponse { message, usage })
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn raw_chat(&self, request: ChatRequest) -> crate::error::Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let tools: Vec<WireTool> = request.tools.iter().map(Self::convert_tool).collect();
        let body = WireRequest {
            model: self.config.model.clone(),
            messages: request.messages.iter().map(Self::convert_message).collect(),
            tools: if tools.is_empty() { None } else { Some(tools) },
            tool_choice: if request.tools.is_empty() { None } else { Some("auto".to_string()) },
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(e.to_string())
                } else {
                    LlmError::HttpError(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => LlmError::AuthenticationError(text),
                429 => LlmError::RateLimitExceeded(text),
                400 if text.to_lowercase().contains("context_length")
                    || text.to_lowercase().contains("maximum context length") =>
                {
                    LlmError::ContextTooLong(text)
                }
                _ => LlmError::ProviderError(format!("openai-compatible API error {status}: {text}")),
            });
        }

        let parsed: WireResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        Self::convert_response(parsed)
    }

    fn clone_box(&self) -> Box<dyn ChatModel> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: WireFunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: String,
    function: WireFunctionDef,
}

#[derive(Debug, Serialize)]
struct WireFunctionDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
    #[serde(default)]
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
    #[serde(default)]
    #[allow(dead_code)]
    total_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;

    #[test]
    fn converts_plain_user_message() {
        let msg = Message::user("hello");
        let wire = OpenAiClient::convert_message(&msg);
        assert_eq!(wire.role, "user");
        assert_eq!(wire.content.as_deref(), Some("hello"));
    }

    #[test]
    fn converts_assistant_message_with_tool_calls_to_null_content() {
        let msg = Message::assistant_with_tool_calls(
            "",
            vec![ToolCall {
                id: "call_1".into(),
                name: "search".into(),
                arguments_json: "{}".into(),
            }],
        );
        let wire = OpenAiClient::convert_message(&msg);
        assert!(wire.content.is_none());
        assert_eq!(wire.tool_calls.unwrap()[0].function.name, "search");
    }

    #[test]
    fn convert_response_extracts_tool_calls() {
        let response = WireResponse {
            choices: vec![WireChoice {
                message: WireMessage {
                    role: "assistant".to_string(),
                    content: None,
                    name: None,
                    tool_call_id: None,
                    tool_calls: Some(vec![WireToolCall {
                        id: "call_1".into(),
                        kind: "function".into(),
                        function: WireFunctionCall {
                            name: "mark_step".into(),
                            arguments: r#"{"step_index":0}"#.into(),
                        },
                    }]),
                    reasoning_content: None,
                },
                finish_reason: Some("tool_calls".to_string()),
            }],
            usage: Some(WireUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
        };
        let chat_response = OpenAiClient::convert_response(response).unwrap();
        assert_eq!(chat_response.message.role, Role::Assistant);
        let calls = chat_response.message.tool_calls.unwrap();
        assert_eq!(calls[0].name, "mark_step");
        assert_eq!(chat_response.usage.prompt_tokens, 10);
    }

    #[test]
    fn convert_response_rejects_empty_choices() {
        let response = WireResponse {
            choices: vec![],
            usage: None,
        };
        assert!(OpenAiClient::convert_response(response).is_err());
    }
}
