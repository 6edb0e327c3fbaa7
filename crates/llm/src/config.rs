use crate::compression::CompressionConfig;

/// Everything `LlmClient` needs beyond the raw `ChatModel` binding: the
/// §6 Configuration knobs relevant to the client contract.
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    pub max_messages: usize,
    pub max_tool_content_length: usize,
    pub compression: CompressionConfig,
    /// Fixed decrement applied to the retained-group budget on a
    /// context-length error from the server (§4.2's recovery rule).
    pub context_length_shrink_groups: usize,
}

impl Default for LlmClientConfig {
    fn default() -> Self {
        Self {
            max_messages: 20,
            max_tool_content_length: 50_000,
            compression: CompressionConfig::default(),
            context_length_shrink_groups: 2,
        }
    }
}
