use crate::message::{group_messages, Message, MessageGroup, Role};
use crate::tokens::count_messages_tokens;
use std::future::Future;

/// Context-window management knobs from §6's Configuration table.
#[derive(Debug, Clone, Copy)]
pub struct CompressionConfig {
    pub max_context_tokens: usize,
    pub compression_threshold: f64,
    pub keep_initial_turns: usize,
    pub keep_recent_turns: usize,
    pub enable_context_compression: bool,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: 128_000,
            compression_threshold: 0.8,
            keep_initial_turns: 2,
            keep_recent_turns: 3,
            enable_context_compression: false,
        }
    }
}

const COMPRESSED_SUMMARY_TAG: &str = "[Compressed Summary]";

/// Applies §4.2 steps 2-4 to a message history. `summarize` is invoked only
/// when summary compression actually triggers; it receives the rendered
/// middle groups and must return the summary text (an LLM call in practice).
pub async fn compress_if_needed<S, Fut>(
    messages: Vec<Message>,
    config: &CompressionConfig,
    summarize: S,
) -> Vec<Message>
where
    S: FnOnce(String) -> Fut,
    Fut: Future<Output = Result<String, String>>,
{
    let total = count_messages_tokens(&messages);

    if total >= config.max_context_tokens {
        let target = (config.max_context_tokens as f64 * 0.9) as usize;
        return emergency_truncate(messages, target);
    }

    if !config.enable_context_compression {
        return messages;
    }

    let trigger = (config.compression_threshold * config.max_context_tokens as f64) as usize;
    if total < trigger {
        return messages;
    }

    summary_compress(messages, config, summarize).await
}

/// Drops whole oldest non-system groups until the total is at or below
/// `target` tokens. System messages and the most recent groups are
/// preserved; a group is never split, matching the message-group atomicity
/// requirement in §9.
fn emergency_truncate(messages: Vec<Message>, target: usize) -> Vec<Message> {
    let (system, rest) = split_system(messages);
    let mut groups = group_messages(&rest);

    let system_tokens = count_messages_tokens(&system);
    loop {
        let current: usize = system_tokens
            + groups
                .iter()
                .flat_map(|g| g.messages.iter())
                .map(crate::tokens::count_message_tokens)
                .sum::<usize>();
        if current <= target || groups.len() <= 1 {
            break;
        }
        groups.remove(0);
    }

    rebuild(system, groups)
}

async fn summary_compress<S, Fut>(
    messages: Vec<Message>,
    config: &CompressionConfig,
    summarize: S,
) -> Vec<Message>
where
    S: FnOnce(String) -> Fut,
    Fut: Future<Output = Result<String, String>>,
{
    let (system, rest) = split_system(messages);
    let groups = group_messages(&rest);

    if groups.len() <= config.keep_initial_turns + config.keep_recent_turns {
        return rebuild(system, groups);
    }

    let initial = &groups[..config.keep_initial_turns];
    let recent_start = groups.len() - config.keep_recent_turns;
    let recent = &groups[recent_start..];
    let middle = &groups[config.keep_initial_turns..recent_start];

    let rendered_middle: String = middle
        .iter()
        .flat_map(|g| g.messages.iter())
        .map(|m| format!("{:?}: {}\n", m.role, m.content))
        .collect();

    match summarize(rendered_middle).await {
        Ok(summary) => {
            let summary_message = Message::assistant(format!("{COMPRESSED_SUMMARY_TAG} {summary}"));
            let mut out = Vec::new();
            out.extend(system);
            out.extend(initial.iter().flat_map(|g| g.messages.clone()));
            out.push(summary_message);
            out.extend(recent.iter().flat_map(|g| g.messages.clone()));
            out
        }
        Err(err) => {
            tracing::warn!(error = %err, "summary compression failed, keeping only recent groups");
            rebuild(system, recent.to_vec())
        }
    }
}

fn split_system(messages: Vec<Message>) -> (Vec<Message>, Vec<Message>) {
    messages.into_iter().partition(|m| m.role == Role::System)
}

fn rebuild(system: Vec<Message>, groups: Vec<MessageGroup>) -> Vec<Message> {
    let mut out = system;
    out.extend(groups.into_iter().flat_map(|g| g.messages));
    out
}

/// Truncates an oversized tool message's content, appending an explicit
/// marker per §4.2's "Oversized tool outputs" rule. Truncates on a char
/// boundary (`max_len` is a char count, not a byte count) so multi-byte
/// UTF-8 text is never split mid-character.
pub fn truncate_tool_content(content: &str, max_len: usize) -> String {
    let total_chars = content.chars().count();
    if total_chars <= max_len {
        return content.to_string();
    }
    let byte_end = content
        .char_indices()
        .nth(max_len)
        .map(|(idx, _)| idx)
        .unwrap_or(content.len());
    let kept = &content[..byte_end];
    format!("{kept}\n[content truncated: original {total_chars} chars, kept {max_len} chars]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ToolCall;

    fn tool_group(tag: &str) -> Vec<Message> {
        vec![
            Message::assistant_with_tool_calls(
                "",
                vec![ToolCall {
                    id: tag.into(),
                    name: "search".into(),
                    arguments_json: "{}".into(),
                }],
            ),
            Message::tool(tag, "search", format!("result for {tag}")),
        ]
    }

    #[tokio::test]
    async fn disabled_compression_passes_through_unchanged() {
        let messages = vec![Message::system("sys"), Message::user("hi")];
        let config = CompressionConfig {
            enable_context_compression: false,
            ..Default::default()
        };
        let out = compress_if_needed(messages.clone(), &config, |_| async { Ok(String::new()) }).await;
        assert_eq!(out.len(), messages.len());
    }

    #[tokio::test]
    async fn emergency_truncation_triggers_at_max_tokens() {
        let mut messages = vec![Message::system("sys")];
        for i in 0..20 {
            messages.extend(tool_group(&i.to_string()));
        }
        let config = CompressionConfig {
            max_context_tokens: 50,
            ..Default::default()
        };
        let out = compress_if_needed(messages, &config, |_| async { Ok(String::new()) }).await;
        let total = count_messages_tokens(&out);
        assert!(total <= (config.max_context_tokens as f64 * 0.9) as usize + 20);
    }

    #[tokio::test]
    async fn summary_compression_keeps_first_and_last_groups() {
        let mut messages = vec![Message::system("sys")];
        for i in 0..10 {
            messages.extend(tool_group(&i.to_string()));
        }
        let config = CompressionConfig {
            enable_context_compression: true,
            max_context_tokens: 1000,
            compression_threshold: 0.1,
            keep_initial_turns: 1,
            keep_recent_turns: 1,
            ..Default::default()
        };
        let out = compress_if_needed(messages, &config, |_| async { Ok("summary text".to_string()) }).await;
        assert!(out.iter().any(|m| m.content.contains("[Compressed Summary]")));
        assert!(out.iter().any(|m| m.content.contains("result for 0")));
        assert!(out.iter().any(|m| m.content.contains("result for 9")));
    }

    #[tokio::test]
    async fn summary_compression_falls_back_to_recent_on_failure() {
        let mut messages = vec![Message::system("sys")];
        for i in 0..10 {
            messages.extend(tool_group(&i.to_string()));
        }
        let config = CompressionConfig {
            enable_context_compression: true,
            max_context_tokens: 1000,
            compression_threshold: 0.1,
            keep_initial_turns: 1,
            keep_recent_turns: 1,
            ..Default::default()
        };
        let out = compress_if_needed(messages, &config, |_| async { Err("boom".to_string()) }).await;
        assert!(!out.iter().any(|m| m.content.contains("result for 0")));
        assert!(out.iter().any(|m| m.content.contains("result for 9")));
    }

    #[test]
    fn truncate_tool_content_appends_marker_when_oversized() {
        let content = "x".repeat(100);
        let out = truncate_tool_content(&content, 10);
        assert!(out.contains("[content truncated: original 100 chars, kept 10 chars]"));
    }

    #[test]
    fn truncate_tool_content_leaves_short_content_untouched() {
        assert_eq!(truncate_tool_content("short", 100), "short");
    }

    #[test]
    fn truncate_tool_content_does_not_split_a_multibyte_char() {
        // Each "中" is one char but three bytes; a byte-index cut at 5 would
        // land inside the third character.
        let content = "中".repeat(10);
        let out = truncate_tool_content(&content, 5);
        assert!(out.starts_with(&"中".repeat(5)));
        assert!(out.contains("[content truncated: original 10 chars, kept 5 chars]"));
    }

    #[tokio::test]
    async fn running_truncate_twice_is_idempotent() {
        let mut messages = vec![Message::system("sys")];
        for i in 0..20 {
            messages.extend(tool_group(&i.to_string()));
        }
        let config = CompressionConfig {
            max_context_tokens: 50,
            ..Default::default()
        };
        let once = compress_if_needed(messages, &config, |_| async { Ok(String::new()) }).await;
        let twice = compress_if_needed(once.clone(), &config, |_| async { Ok(String::new()) }).await;
        assert_eq!(count_messages_tokens(&once), count_messages_tokens(&twice));
    }
}
