use serde_json::Value;
use std::future::Future;

pub const MAX_REPAIR_ATTEMPTS: u32 = 3;

/// Parses a tool call's raw `arguments_json`. On parse failure, asks `repair`
/// (an LLM call in practice) for corrected JSON up to `MAX_REPAIR_ATTEMPTS`
/// times; if every attempt still fails to parse, falls back to `{}` and logs
/// a warning — arguments are never silently corrupted, only downgraded to
/// empty, and that downgrade is always observable.
pub async fn repair_tool_arguments<R, Fut>(raw: &str, tool_name: &str, repair: R) -> Value
where
    R: Fn(&str) -> Fut,
    Fut: Future<Output = Result<String, String>>,
{
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        return value;
    }

    let mut current = raw.to_string();
    for attempt in 1..=MAX_REPAIR_ATTEMPTS {
        tracing::warn!(tool = tool_name, attempt, "tool call arguments failed to parse, attempting repair");
        match repair(&current).await {
            Ok(candidate) => match serde_json::from_str::<Value>(&candidate) {
                Ok(value) => {
                    tracing::info!(tool = tool_name, attempt, "tool call arguments repaired");
                    return value;
                }
                Err(_) => current = candidate,
            },
            Err(err) => {
                tracing::warn!(tool = tool_name, attempt, error = %err, "repair call itself failed");
            }
        }
    }

    tracing::warn!(
        tool = tool_name,
        "exhausted repair attempts, dispatching with empty arguments"
    );
    Value::Object(Default::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn valid_json_passes_through_without_repair_calls() {
        let calls = std::cell::Cell::new(0);
        let value = repair_tool_arguments(r#"{"a":1}"#, "tool", |_| {
            calls.set(calls.get() + 1);
            async { Ok(String::new()) }
        })
        .await;
        assert_eq!(value, serde_json::json!({"a": 1}));
        assert_eq!(calls.get(), 0);
    }

    #[tokio::test]
    async fn repairs_after_one_attempt() {
        let value = repair_tool_arguments("{bad json", "tool", |_| async {
            Ok(r#"{"a":1}"#.to_string())
        })
        .await;
        assert_eq!(value, serde_json::json!({"a": 1}));
    }

    #[tokio::test]
    async fn falls_back_to_empty_object_after_three_failed_repairs() {
        let calls = std::cell::Cell::new(0);
        let value = repair_tool_arguments("not json", "tool", |_| {
            calls.set(calls.get() + 1);
            async { Ok("still not json".to_string()) }
        })
        .await;
        assert_eq!(value, serde_json::json!({}));
        assert_eq!(calls.get(), MAX_REPAIR_ATTEMPTS);
    }
}
