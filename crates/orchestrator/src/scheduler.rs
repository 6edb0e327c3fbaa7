//! The Scheduler (C6): the outer Planner loop. Ensures the plan has ready
//! steps, dispatches each wave in parallel bounded by `min(5, |R|)`,
//! re-plans between waves, and finalizes once no step is ready.

use crate::actor::{Actor, ActorConfig};
use crate::error::Result;
use crate::events::{EventBus, TOPIC_PLAN_PROCESS};
use crate::planner;
use llm::LlmClient;
use std::sync::Arc;
use tooling::{SharedPlan, ToolRegistry};

const ACTOR_SYSTEM_PROMPT: &str =
    "You are an autonomous agent executing one step of a larger plan. Use the \
     tools available to make progress, then call mark_step or terminate when \
     the step is done.";

pub struct SchedulerConfig {
    pub max_concurrent_actors: usize,
    pub max_planner_retries: usize,
    pub max_actor_iterations: usize,
}

/// Runs the full Planner/Scheduler loop for one task and returns the final
/// answer string produced by `finalize_plan`. `domain_tools` holds whatever
/// task-specific tools the caller registered; the universal `mark_step` and
/// `terminate` tools (§4.3) are added per-Actor once the Plan exists, since
/// they close over it.
pub async fn execute(
    llm: Arc<LlmClient>,
    domain_tools: ToolRegistry,
    event_bus: Arc<EventBus>,
    task: &str,
    output_format: Option<&str>,
    config: SchedulerConfig,
) -> Result<String> {
    let plan = planner::create_plan(&llm, task, output_format, config.max_planner_retries).await?;
    let shared_plan: SharedPlan = Arc::new(std::sync::Mutex::new(plan));

    loop {
        let ready = {
            let plan = shared_plan.lock().expect("plan lock poisoned");
            plan.ready_steps()
        };
        if ready.is_empty() {
            break;
        }

        let cap = config.max_concurrent_actors.min(5).min(ready.len());
        let semaphore = Arc::new(tokio::sync::Semaphore::new(cap));
        let mut handles = Vec::with_capacity(ready.len());

        for step_index in ready {
            let semaphore = semaphore.clone();
            let llm = llm.clone();
            let shared_plan = shared_plan.clone();
            let event_bus = event_bus.clone();
            let step_description = {
                let plan = shared_plan.lock().expect("plan lock poisoned");
                plan.steps()[step_index].description.clone()
            };

            let mut registry = domain_tools.clone();
            let _ = registry.register(tooling::mark_step_tool(shared_plan.clone()));
            let _ = registry.register(tooling::terminate_tool(shared_plan.clone(), step_index));

            let actor_config = ActorConfig {
                max_iterations: config.max_actor_iterations,
            };

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                let actor = Actor::new(llm, registry, shared_plan, step_index, actor_config, event_bus);
                actor.run(ACTOR_SYSTEM_PROMPT.to_string(), step_description).await
            }));
        }

        for handle in handles {
            // An Actor never returns Err (§4.4); a panic inside one does not
            // cancel its siblings, since each runs on its own task.
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "an actor task panicked; its step is left as-is");
            }
        }

        event_bus.publish(
            TOPIC_PLAN_PROCESS,
            serde_json::json!({"event": "wave_completed"}),
        );

        // The wave above has fully joined, so no Actor can be touching the
        // Plan right now; snapshot, re-plan, and write back rather than
        // holding the lock across the re_plan LLM call.
        let mut plan_snapshot = shared_plan.lock().expect("plan lock poisoned").clone();
        planner::re_plan(&llm, &mut plan_snapshot, task, output_format, config.max_planner_retries).await?;
        *shared_plan.lock().expect("plan lock poisoned") = plan_snapshot;
    }

    let plan_snapshot = shared_plan.lock().expect("plan lock poisoned").clone();
    planner::finalize_plan(&llm, &plan_snapshot, task, output_format).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm::{ChatModel, ChatRequest, ChatResponse, Message, Result as LlmResult, ToolCall};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A scripted model keyed off message count, simple enough to drive the
    /// whole create_plan -> actor -> re_plan -> finalize_plan loop for one
    /// two-step linear plan.
    #[derive(Clone)]
    struct ScriptedModel {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl ChatModel for ScriptedModel {
        async fn raw_chat(&self, request: ChatRequest) -> LlmResult<ChatResponse> {
            let has_create_plan = request.tools.iter().any(|t| t.name == "create_plan");
            let has_update_plan = request.tools.iter().any(|t| t.name == "update_plan");
            let has_mark_step = request.tools.iter().any(|t| t.name == "mark_step");

            let message = if has_create_plan {
                Message::assistant_with_tool_calls(
                    "",
                    vec![ToolCall {
                        id: "1".into(),
                        name: "create_plan".into(),
                        arguments_json: serde_json::json!({
                            "title": "demo",
                            "steps": ["only step"],
                        })
                        .to_string(),
                    }],
                )
            } else if has_update_plan {
                Message::assistant("no adjustment needed")
            } else if has_mark_step {
                Message::assistant_with_tool_calls(
                    "",
                    vec![ToolCall {
                        id: "2".into(),
                        name: "mark_step".into(),
                        arguments_json: serde_json::json!({
                            "step_index": 0,
                            "step_status": "completed",
                            "step_notes": "done",
                        })
                        .to_string(),
                    }],
                )
            } else {
                Message::assistant("<final_answer>ok</final_answer>")
            };

            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ChatResponse {
                message,
                usage: llm::message::UsageMetadata::default(),
            })
        }

        fn clone_box(&self) -> Box<dyn ChatModel> {
            Box::new(self.clone())
        }
    }

    #[tokio::test]
    async fn executes_a_single_step_plan_end_to_end() {
        let model = ScriptedModel {
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let llm = Arc::new(LlmClient::new(Box::new(model), llm::LlmClientConfig::default()));
        let event_bus = Arc::new(EventBus::new());
        let registry = ToolRegistry::new();

        let config = SchedulerConfig {
            max_concurrent_actors: 5,
            max_planner_retries: 3,
            max_actor_iterations: 5,
        };

        let answer = execute(llm, registry, event_bus, "do a thing", None, config).await.unwrap();
        assert_eq!(answer, "ok");
    }
}
