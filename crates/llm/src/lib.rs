//! The LLM client contract: retry/backoff, tool-argument repair, and
//! context-window compression layered on top of a raw, provider-specific
//! `ChatModel` wire binding.

pub mod client;
pub mod compression;
pub mod config;
pub mod error;
pub mod message;
pub mod providers;
pub mod repair;
pub mod retry;
pub mod tokens;

pub use client::{ChatModel, ChatRequest};
pub use config::LlmClientConfig;
pub use error::{ErrorClass, LlmError, Result};
pub use message::{ensure_reasoning_content, ChatResponse, Message, Role, ToolCall, ToolDefinition};

use compression::compress_if_needed;
use std::sync::atomic::{AtomicUsize, Ordering};

const MAX_CONTEXT_SHRINKS: usize = 5;

const REPAIR_SYSTEM_PROMPT: &str =
    "You previously produced invalid JSON for a tool call's arguments. \
     Reply with ONLY the corrected, valid JSON object and nothing else.";

/// The public LLM client: wraps one `ChatModel` wire binding with the full
/// §4.2 contract (retry, compression, repair, oversized-output truncation,
/// context-length recovery).
pub struct LlmClient {
    model: Box<dyn ChatModel>,
    config: LlmClientConfig,
    /// Tracks how many groups have been shed this run due to context-length
    /// errors from the server; never resets, matching the source's
    /// persistent shrink behavior for the life of one client.
    shrink_budget: AtomicUsize,
}

impl LlmClient {
    pub fn new(model: Box<dyn ChatModel>, config: LlmClientConfig) -> Self {
        Self {
            model,
            config,
            shrink_budget: AtomicUsize::new(0),
        }
    }

    /// `chat(messages) -> string`: plain completion, no tools.
    pub async fn chat(&self, messages: Vec<Message>) -> Result<String> {
        let response = self.call(messages, Vec::new()).await?;
        Ok(response.message.content)
    }

    /// `chat_with_tools(messages, tool_specs) -> AssistantMessage`: returns
    /// an assistant message whose tool call arguments are always valid JSON
    /// (repaired or downgraded to `{}` per §4.2).
    pub async fn chat_with_tools(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
    ) -> Result<Message> {
        let response = self.call(messages, tools).await?;
        let mut message = response.message;
        if let Some(calls) = message.tool_calls.take() {
            let mut repaired = Vec::with_capacity(calls.len());
            for call in calls {
                let value = repair::repair_tool_arguments(&call.arguments_json, &call.name, |broken| {
                    self.request_repair(&call.name, broken)
                })
                .await;
                repaired.push(ToolCall {
                    id: call.id,
                    name: call.name,
                    arguments_json: value.to_string(),
                });
            }
            message.tool_calls = Some(repaired);
        }
        Ok(message)
    }

    /// Truncates an oversized tool output per §4.2's oversized-tool-output rule.
    pub fn truncate_tool_output(&self, content: &str) -> String {
        compression::truncate_tool_content(content, self.config.max_tool_content_length)
    }

    async fn request_repair(&self, tool_name: &str, broken_json: &str) -> std::result::Result<String, String> {
        let messages = vec![
            Message::system(REPAIR_SYSTEM_PROMPT),
            Message::user(format!("Tool: {tool_name}\nInvalid arguments:\n{broken_json}")),
        ];
        self.chat(messages).await.map_err(|e| e.to_string())
    }

    async fn call(&self, messages: Vec<Message>, tools: Vec<ToolDefinition>) -> Result<ChatResponse> {
        let mut shrink = self.shrink_budget.load(Ordering::SeqCst);
        loop {
            let mut prepared = messages.clone();
            ensure_reasoning_content(&mut prepared);
            let compression_config = self.shrunk_compression_config(shrink);
            let prepared = compress_if_needed(prepared, &compression_config, |middle| {
                self.summarize_middle(middle)
            })
            .await;

            let request = ChatRequest::new(prepared).with_tools(tools.clone());
            let result = retry::retry_with_backoff("llm.chat", || self.model.raw_chat(request.clone())).await;

            match result {
                Ok(response) => return Ok(response),
                Err(err) if err.class() == ErrorClass::ContextTooLong && shrink < MAX_CONTEXT_SHRINKS => {
                    shrink += 1;
                    self.shrink_budget.store(shrink, Ordering::SeqCst);
                    tracing::warn!(shrink, "context-length error, shrinking retained history and retrying");
                    continue;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn shrunk_compression_config(&self, shrink: usize) -> compression::CompressionConfig {
        let mut cfg = self.config.compression;
        let decrement = shrink * self.config.context_length_shrink_groups;
        cfg.keep_recent_turns = cfg.keep_recent_turns.saturating_sub(decrement).max(1);
        cfg.keep_initial_turns = cfg.keep_initial_turns.saturating_sub(decrement);
        cfg
    }

    async fn summarize_middle(&self, middle: String) -> std::result::Result<String, String> {
        let messages = vec![
            Message::system("Summarize the following conversation turns concisely, preserving facts and decisions."),
            Message::user(middle),
        ];
        self.chat(messages).await.map_err(|e| e.to_string())
    }
}
