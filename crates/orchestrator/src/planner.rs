//! The Planner loop (C5): create_plan / re_plan / finalize_plan, each an LLM
//! call that must produce a structured tool call.

use crate::error::{OrchestratorError, Result};
use llm::{LlmClient, Message, ToolCall, ToolDefinition};
use plan::{Plan, StepStatus};
use serde_json::Value;
use std::collections::HashMap;

const PLANNER_SYSTEM_PROMPT: &str =
    "You are the planner for an autonomous task-solving system. Decompose the \
     user's task into a directed acyclic graph of steps and call the \
     requested tool with your plan.";

const FINALIZE_SYSTEM_PROMPT: &str =
    "You are finalizing an autonomous task-solving run. Given the plan and \
     its facts, produce the final answer wrapped in <final_answer> and \
     </final_answer> tags.";

fn create_plan_tool() -> ToolDefinition {
    ToolDefinition::new("create_plan", "Create the initial step plan for this task").with_parameters(
        serde_json::json!({
            "type": "object",
            "properties": {
                "title": {"type": "string"},
                "steps": {"type": "array", "items": {"type": "string"}},
                "dependencies": {"type": "object"},
            },
            "required": ["title", "steps"],
        }),
    )
}

fn update_plan_tool() -> ToolDefinition {
    ToolDefinition::new("update_plan", "Adjust the existing step plan").with_parameters(serde_json::json!({
        "type": "object",
        "properties": {
            "title": {"type": "string"},
            "steps": {"type": "array", "items": {"type": "string"}},
            "dependencies": {"type": "object"},
        },
    }))
}

struct PlanEdit {
    title: Option<String>,
    steps: Option<Vec<String>>,
    dependencies: Option<HashMap<usize, Vec<usize>>>,
}

fn parse_plan_edit(call: &ToolCall) -> std::result::Result<PlanEdit, String> {
    let value: Value = serde_json::from_str(&call.arguments_json).map_err(|e| e.to_string())?;
    let title = value.get("title").and_then(Value::as_str).map(str::to_string);
    let steps = value.get("steps").and_then(Value::as_array).map(|arr| {
        arr.iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect::<Vec<_>>()
    });
    let dependencies = value.get("dependencies").and_then(Value::as_object).map(|obj| {
        obj.iter()
            .filter_map(|(k, v)| {
                let from: usize = k.parse().ok()?;
                let deps = v
                    .as_array()?
                    .iter()
                    .filter_map(|d| d.as_u64().map(|n| n as usize))
                    .collect();
                Some((from, deps))
            })
            .collect::<HashMap<_, _>>()
    });
    Ok(PlanEdit { title, steps, dependencies })
}

/// Creates the initial plan by asking the LLM to call `create_plan`. Retries
/// up to `max_retries` times if the LLM replies without the tool call, the
/// edit is malformed, or the resulting plan has no ready steps.
pub async fn create_plan(llm: &LlmClient, task: &str, output_format: Option<&str>, max_retries: usize) -> Result<Plan> {
    let mut history = vec![
        Message::system(PLANNER_SYSTEM_PROMPT),
        Message::user(task_prompt(task, output_format)),
    ];
    let tools = vec![create_plan_tool()];

    let mut last_reason = String::from("no attempt made");
    for attempt in 1..=max_retries {
        let response = llm
            .chat_with_tools(history.clone(), tools.clone())
            .await
            .map_err(|e| OrchestratorError::LlmCallFailed(e.to_string()))?;

        let call = response.tool_calls.as_ref().and_then(|calls| calls.first());
        let Some(call) = call else {
            last_reason = "LLM did not call create_plan".to_string();
            history.push(Message::user(format!(
                "You must call the create_plan tool. Attempt {attempt} of {max_retries}."
            )));
            continue;
        };

        let edit = match parse_plan_edit(call) {
            Ok(edit) => edit,
            Err(err) => {
                last_reason = format!("malformed create_plan arguments: {err}");
                history.push(Message::user(format!("Your create_plan arguments were invalid: {err}. Try again.")));
                continue;
            }
        };

        let mut plan = Plan::new();
        if plan.update(edit.title, edit.steps, edit.dependencies).is_err() {
            last_reason = "create_plan produced a cyclic or out-of-range dependency graph".to_string();
            history.push(Message::user(
                "Your plan's dependencies were invalid (cyclic or out of range). Try again.",
            ));
            continue;
        }

        if plan.ready_steps().is_empty() {
            last_reason = "create_plan produced a plan with no ready steps".to_string();
            history.push(Message::user(
                "Your plan has no step that can start now — either it has no steps at all, \
                 or every step depends on another. Revise it.",
            ));
            continue;
        }

        return Ok(plan);
    }

    Err(OrchestratorError::PlanningFailed {
        attempts: max_retries as u32,
        reason: last_reason,
    })
}

/// Shows the LLM the current plan and facts; it either declines to adjust it
/// or calls `update_plan`. Invariant-violating edits are rejected and the LLM
/// is re-prompted, up to `max_retries` times, after which the plan is left
/// unchanged.
pub async fn re_plan(llm: &LlmClient, plan: &mut Plan, task: &str, output_format: Option<&str>, max_retries: usize) -> Result<()> {
    let mut history = vec![
        Message::system(PLANNER_SYSTEM_PROMPT),
        Message::user(format!(
            "{}\n\nCurrent plan:\n{}\n\nFacts:\n{}\n\nIf the plan needs no adjustment, reply with \"no adjustment needed\". Otherwise call update_plan.",
            task_prompt(task, output_format),
            plan.format(true),
            plan.facts(),
        )),
    ];
    let tools = vec![update_plan_tool()];

    for _ in 1..=max_retries {
        let response = llm
            .chat_with_tools(history.clone(), tools.clone())
            .await
            .map_err(|e| OrchestratorError::LlmCallFailed(e.to_string()))?;

        let call = match response.tool_calls.as_ref().and_then(|calls| calls.first()) {
            Some(call) => call,
            None => return Ok(()),
        };

        let edit = match parse_plan_edit(call) {
            Ok(edit) => edit,
            Err(err) => {
                history.push(Message::user(format!("Your update_plan arguments were invalid: {err}. Try again.")));
                continue;
            }
        };

        match apply_guarded_edit(plan, edit) {
            Ok(()) => return Ok(()),
            Err(reason) => {
                history.push(Message::user(format!(
                    "That edit was rejected: {reason}. Completed, in-progress, and blocked steps must be kept, \
                     with their dependencies intact. Try again, or reply that no adjustment is needed."
                )));
            }
        }
    }

    tracing::warn!("re_plan exhausted its retry budget, continuing with the existing plan");
    Ok(())
}

/// Enforces the re-plan invariants on top of whatever the LLM proposed:
/// never delete a non-`not_started` step, never modify one, and preserve its
/// dependencies. Returns a human-readable rejection reason on violation.
fn apply_guarded_edit(plan: &mut Plan, edit: PlanEdit) -> std::result::Result<(), String> {
    if let Some(new_steps) = &edit.steps {
        let new_descriptions: std::collections::HashSet<&str> =
            new_steps.iter().map(String::as_str).collect();
        for (i, step) in plan.steps().iter().enumerate() {
            if step.status != StepStatus::NotStarted && !new_descriptions.contains(step.description.as_str()) {
                return Err(format!(
                    "step {i} (\"{}\") is {} and cannot be removed",
                    step.description, step.status
                ));
            }
        }
    }

    if let Some(new_dependencies) = &edit.dependencies {
        for (i, step) in plan.steps().iter().enumerate() {
            if step.status == StepStatus::NotStarted {
                continue;
            }
            let old_deps = plan.dependencies().get(&i).cloned().unwrap_or_default();
            let new_deps = new_dependencies.get(&i).cloned().unwrap_or_default();
            if old_deps != new_deps {
                return Err(format!(
                    "step {i} (\"{}\") is {} and its dependencies cannot change",
                    step.description, step.status
                ));
            }
        }
    }

    plan.update(edit.title, edit.steps, edit.dependencies)
        .map_err(|e| e.to_string())
}

/// Produces the terminal answer string, extracted from between
/// `<final_answer>` and `</final_answer>` markers if present.
pub async fn finalize_plan(llm: &LlmClient, plan: &Plan, task: &str, output_format: Option<&str>) -> Result<String> {
    let messages = vec![
        Message::system(FINALIZE_SYSTEM_PROMPT),
        Message::user(format!(
            "{}\n\nFinal plan state:\n{}\n\nFacts:\n{}",
            task_prompt(task, output_format),
            plan.format(true),
            plan.facts(),
        )),
    ];
    let content = llm
        .chat(messages)
        .await
        .map_err(|e| OrchestratorError::LlmCallFailed(e.to_string()))?;
    Ok(extract_final_answer(&content))
}

fn extract_final_answer(content: &str) -> String {
    const OPEN: &str = "<final_answer>";
    const CLOSE: &str = "</final_answer>";
    match (content.find(OPEN), content.find(CLOSE)) {
        (Some(start), Some(end)) if start + OPEN.len() <= end => {
            content[start + OPEN.len()..end].trim().to_string()
        }
        _ => content.trim().to_string(),
    }
}

fn task_prompt(task: &str, output_format: Option<&str>) -> String {
    match output_format {
        Some(format) => format!("Task: {task}\nDesired output format: {format}"),
        None => format!("Task: {task}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm::{ChatModel, ChatRequest, ChatResponse, Result as LlmResult};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone)]
    struct ScriptedModel {
        responses: Arc<Vec<Message>>,
        index: Arc<AtomicUsize>,
    }

    impl ScriptedModel {
        fn new(responses: Vec<Message>) -> Self {
            Self {
                responses: Arc::new(responses),
                index: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait::async_trait]
    impl ChatModel for ScriptedModel {
        async fn raw_chat(&self, _request: ChatRequest) -> LlmResult<ChatResponse> {
            let i = self.index.fetch_add(1, Ordering::SeqCst);
            let message = self.responses.get(i).cloned().unwrap_or_else(|| {
                self.responses.last().cloned().expect("scripted model needs at least one response")
            });
            Ok(ChatResponse {
                message,
                usage: llm::message::UsageMetadata::default(),
            })
        }

        fn clone_box(&self) -> Box<dyn ChatModel> {
            Box::new(self.clone())
        }
    }

    fn client_with(responses: Vec<Message>) -> LlmClient {
        LlmClient::new(Box::new(ScriptedModel::new(responses)), llm::LlmClientConfig::default())
    }

    #[tokio::test]
    async fn create_plan_succeeds_on_valid_tool_call() {
        let call = ToolCall {
            id: "1".into(),
            name: "create_plan".into(),
            arguments_json: serde_json::json!({
                "title": "Report",
                "steps": ["gather", "draft"],
                "dependencies": {"1": [0]},
            })
            .to_string(),
        };
        let client = client_with(vec![Message::assistant_with_tool_calls("", vec![call])]);
        let plan = create_plan(&client, "write a report", None, 3).await.unwrap();
        assert_eq!(plan.title(), "Report");
        assert_eq!(plan.ready_steps(), vec![0]);
    }

    #[tokio::test]
    async fn create_plan_retries_then_fails_without_tool_call() {
        let client = client_with(vec![Message::assistant("sure, let me think")]);
        let err = create_plan(&client, "task", None, 2).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::PlanningFailed { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn create_plan_retries_and_fails_on_an_empty_step_list() {
        let call = ToolCall {
            id: "1".into(),
            name: "create_plan".into(),
            arguments_json: serde_json::json!({"title": "empty", "steps": []}).to_string(),
        };
        let responses = (0..2)
            .map(|_| Message::assistant_with_tool_calls("", vec![call.clone()]))
            .collect();
        let client = client_with(responses);
        let err = create_plan(&client, "task", None, 2).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::PlanningFailed { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn re_plan_declines_when_llm_asks_for_no_change() {
        let client = client_with(vec![Message::assistant("no adjustment needed")]);
        let mut plan = Plan::new();
        plan.update(Some("t".into()), Some(vec!["a".into()]), None).unwrap();
        re_plan(&client, &mut plan, "task", None, 3).await.unwrap();
        assert_eq!(plan.steps().len(), 1);
    }

    #[tokio::test]
    async fn re_plan_rejects_edit_that_removes_completed_step() {
        let mut plan = Plan::new();
        plan.update(
            Some("t".into()),
            Some(vec!["a".into(), "b".into()]),
            Some(HashMap::from([(1, vec![0])])),
        )
        .unwrap();
        plan.mark_step(0, Some(StepStatus::Completed), None).unwrap();

        let call = ToolCall {
            id: "1".into(),
            name: "update_plan".into(),
            arguments_json: serde_json::json!({"steps": ["b"]}).to_string(),
        };
        // Exhaust retries: every attempt proposes the same invalid edit.
        let responses = (0..3)
            .map(|_| Message::assistant_with_tool_calls("", vec![call.clone()]))
            .collect();
        let client = client_with(responses);
        re_plan(&client, &mut plan, "task", None, 3).await.unwrap();
        assert_eq!(plan.steps().len(), 2);
        assert_eq!(plan.steps()[0].status, StepStatus::Completed);
    }

    #[tokio::test]
    async fn finalize_plan_extracts_marked_answer() {
        let client = client_with(vec![Message::assistant("noise <final_answer>42</final_answer> more noise")]);
        let plan = Plan::new();
        let answer = finalize_plan(&client, &plan, "task", None).await.unwrap();
        assert_eq!(answer, "42");
    }

    #[tokio::test]
    async fn finalize_plan_falls_back_to_full_content_without_markers() {
        let client = client_with(vec![Message::assistant("  just the answer  ")]);
        let plan = Plan::new();
        let answer = finalize_plan(&client, &plan, "task", None).await.unwrap();
        assert_eq!(answer, "just the answer");
    }
}
