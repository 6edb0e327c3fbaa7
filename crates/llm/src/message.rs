use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON-encoded arguments as received from the model, before repair/parsing.
    pub arguments_json: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Present when the underlying model runs in "thinking" mode (§4.2).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
            name: None,
            reasoning_content: None,
        }
    }

    pub fn tool(tool_call_id: impl Into<String>, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
            reasoning_content: None,
        }
    }

    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            name: None,
            reasoning_content: None,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|t| !t.is_empty())
    }
}

/// Declarative tool schema handed to the model under `tools[].function`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: None,
        }
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(parameters);
        self
    }
}

/// Token usage reported by (or estimated for) a single completion.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

impl UsageMetadata {
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    pub fn total(&self) -> usize {
        self.prompt_tokens + self.completion_tokens
    }
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub message: Message,
    pub usage: UsageMetadata,
}

/// A "message group" per the glossary: a standalone non-tool-bearing message
/// is its own group; an assistant-with-tool_calls message plus all its
/// subsequent tool responses form one indivisible group.
#[derive(Debug, Clone)]
pub struct MessageGroup {
    pub messages: Vec<Message>,
}

impl MessageGroup {
    pub fn is_system(&self) -> bool {
        self.messages.first().is_some_and(|m| m.role == Role::System)
    }
}

/// Injects an empty `reasoning_content` into every historical assistant
/// message that lacks one, required before sending history to a "thinking"
/// model (§4.2).
pub fn ensure_reasoning_content(messages: &mut [Message]) {
    for message in messages.iter_mut() {
        if message.role == Role::Assistant && message.reasoning_content.is_none() {
            message.reasoning_content = Some(String::new());
        }
    }
}

/// Splits a flat message list (system messages excluded) into message groups.
pub fn group_messages(messages: &[Message]) -> Vec<MessageGroup> {
    let mut groups = Vec::new();
    let mut i = 0;
    while i < messages.len() {
        let msg = &messages[i];
        if msg.role == Role::Assistant && msg.has_tool_calls() {
            let call_count = msg.tool_calls.as_ref().map(|c| c.len()).unwrap_or(0);
            let mut group_messages = vec![msg.clone()];
            let mut j = i + 1;
            let mut collected = 0;
            while j < messages.len() && messages[j].role == Role::Tool && collected < call_count {
                group_messages.push(messages[j].clone());
                collected += 1;
                j += 1;
            }
            groups.push(MessageGroup {
                messages: group_messages,
            });
            i = j;
        } else {
            groups.push(MessageGroup {
                messages: vec![msg.clone()],
            });
            i += 1;
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_assistant_with_tool_calls_and_responses() {
        let messages = vec![
            Message::user("do it"),
            Message::assistant_with_tool_calls(
                "",
                vec![ToolCall {
                    id: "1".into(),
                    name: "search".into(),
                    arguments_json: "{}".into(),
                }],
            ),
            Message::tool("1", "search", "result"),
            Message::assistant("done"),
        ];
        let groups = group_messages(&messages);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[1].messages.len(), 2);
    }

    #[test]
    fn standalone_user_message_is_its_own_group() {
        let messages = vec![Message::user("hi")];
        let groups = group_messages(&messages);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].messages.len(), 1);
    }
}
