use crate::message::{Message, Role};
use std::sync::OnceLock;
use tiktoken_rs::CoreBPE;

/// Fixed per-message overhead (role framing, separators) added to every
/// message's content estimate, matching the accounting convention chat APIs
/// document for their own tokenizer-based counts.
const PER_MESSAGE_OVERHEAD: usize = 4;

fn encoder() -> Option<&'static CoreBPE> {
    static ENCODER: OnceLock<Option<CoreBPE>> = OnceLock::new();
    ENCODER
        .get_or_init(|| tiktoken_rs::cl100k_base().ok())
        .as_ref()
}

/// Counts tokens in a single string. Prefers the real `cl100k_base` BPE
/// tokenizer; falls back to the documented heuristic (Chinese chars weighted
/// at ~1.5 chars/token, everything else at ~4 chars/token) when the
/// tokenizer's vocabulary file could not be loaded — e.g. offline or
/// sandboxed environments without network access to fetch it.
pub fn count_tokens(text: &str) -> usize {
    if let Some(bpe) = encoder() {
        return bpe.encode_with_special_tokens(text).len();
    }
    heuristic_token_count(text)
}

fn heuristic_token_count(text: &str) -> usize {
    let mut chinese_chars = 0usize;
    let mut other_chars = 0usize;
    for ch in text.chars() {
        if is_chinese(ch) {
            chinese_chars += 1;
        } else {
            other_chars += 1;
        }
    }
    let chinese_tokens = (chinese_chars as f64 / 1.5).ceil();
    let other_tokens = (other_chars as f64 / 4.0).ceil();
    (chinese_tokens + other_tokens) as usize
}

fn is_chinese(ch: char) -> bool {
    let c = ch as u32;
    (0x4E00..=0x9FFF).contains(&c) || (0x3400..=0x4DBF).contains(&c)
}

/// Estimates the token count of one message, including role/structure overhead.
pub fn count_message_tokens(message: &Message) -> usize {
    let mut total = count_tokens(&message.content) + PER_MESSAGE_OVERHEAD;
    if let Some(calls) = &message.tool_calls {
        for call in calls {
            total += count_tokens(&call.name) + count_tokens(&call.arguments_json) + PER_MESSAGE_OVERHEAD;
        }
    }
    if let Some(reasoning) = &message.reasoning_content {
        total += count_tokens(reasoning);
    }
    total
}

/// Estimates the total token count of a message list.
pub fn count_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(count_message_tokens).sum()
}

pub fn is_system(message: &Message) -> bool {
    message.role == Role::System
}
