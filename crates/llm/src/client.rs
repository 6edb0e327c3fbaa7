use crate::error::Result;
use crate::message::{ChatResponse, Message, ToolDefinition};
use async_trait::async_trait;

/// A single request to the underlying wire protocol. Built by `LlmClient`
/// after retry/compression bookkeeping; provider implementations translate
/// this into their own wire format.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
    /// Whether the target model should run in "thinking" mode (§4.2).
    pub thinking: bool,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            tools: Vec::new(),
            temperature: None,
            max_tokens: None,
            thinking: false,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_thinking(mut self, thinking: bool) -> Self {
        self.thinking = thinking;
        self
    }
}

/// The raw wire-level model binding. One call = one HTTP round trip (or
/// equivalent). Retry, repair, and compression are layered on top by
/// `LlmClient`, not implemented here — this trait only has to speak one
/// provider's wire format.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn raw_chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    fn clone_box(&self) -> Box<dyn ChatModel>;
}

impl Clone for Box<dyn ChatModel> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
