//! The Actor loop (C4): drives an LLM with a bounded toolbox until one step
//! is marked terminal.

use crate::events::{EventBus, TOPIC_PLAN_PROCESS};
use crate::facts;
use llm::{LlmClient, Message};
use plan::StepStatus;
use serde_json::Value;
use std::sync::Arc;
use tooling::{SharedPlan, ToolRegistry};

const DEFAULT_MAX_ITERATIONS: usize = 20;
const FORCED_FINISH_PROMPT: &str = "You are out of iterations for this step. Summarize your progress and call mark_step now.";

pub struct ActorConfig {
    pub max_iterations: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

pub struct Actor {
    llm: Arc<LlmClient>,
    registry: ToolRegistry,
    shared_plan: SharedPlan,
    step_index: usize,
    config: ActorConfig,
    event_bus: Arc<EventBus>,
}

impl Actor {
    pub fn new(
        llm: Arc<LlmClient>,
        registry: ToolRegistry,
        shared_plan: SharedPlan,
        step_index: usize,
        config: ActorConfig,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            llm,
            registry,
            shared_plan,
            step_index,
            config,
            event_bus,
        }
    }

    /// Runs the Actor to termination for its one bound step. Never returns
    /// an `Err` for tool or LLM-transient failures — those become a
    /// `blocked` step with the failure text as the returned notes, per
    /// §4.4's exception handling. Only returns the step's result text.
    pub async fn run(&self, system_prompt: String, initial_user_prompt: String) -> String {
        {
            let mut plan = self.shared_plan.lock().expect("plan lock poisoned");
            let _ = plan.mark_step(self.step_index, Some(StepStatus::InProgress), None);
        }
        self.event_bus.publish(
            TOPIC_PLAN_PROCESS,
            serde_json::json!({"event": "step_started", "step_index": self.step_index}),
        );

        let mut history = vec![Message::system(system_prompt), Message::user(initial_user_prompt)];
        let tool_names = self.registry.tool_names();

        let result = match self.run_rounds(&mut history, &tool_names).await {
            Ok(result) => result,
            Err(err) => {
                let text = err.to_string();
                let mut plan = self.shared_plan.lock().expect("plan lock poisoned");
                let _ = plan.mark_step(self.step_index, Some(StepStatus::Blocked), Some(&text));
                text
            }
        };

        self.update_facts(&result).await;
        result
    }

    async fn run_rounds(&self, history: &mut Vec<Message>, tool_names: &[String]) -> llm::Result<String> {
        let schemas = self.registry.schemas_for(tool_names);

        for _ in 0..self.config.max_iterations {
            let response = self.llm.chat_with_tools(history.clone(), schemas.clone()).await?;

            if !response.has_tool_calls() {
                let content = response.content.clone();
                history.push(response);
                return Ok(content);
            }

            if let Some(terminal) = self.run_one_round(history, response).await {
                return Ok(terminal);
            }
        }

        // Exhausted max_iterations: force a summarize-and-mark_step round.
        history.push(Message::user(FORCED_FINISH_PROMPT));
        let mark_step_only = vec!["mark_step".to_string()];
        let schemas = self.registry.schemas_for(&mark_step_only);
        let response = self.llm.chat_with_tools(history.clone(), schemas).await?;

        if response.has_tool_calls() {
            if let Some(terminal) = self.run_one_round(history, response).await {
                return Ok(terminal);
            }
        }

        let last_content = response.content.clone();
        let mut plan = self.shared_plan.lock().expect("plan lock poisoned");
        if plan.steps()[self.step_index].status == StepStatus::InProgress {
            let _ = plan.mark_step(self.step_index, Some(StepStatus::Completed), Some(&last_content));
        }
        Ok(last_content)
    }

    /// Dispatches every tool call in one assistant response concurrently,
    /// appends the assistant + tool messages to history, and records each
    /// execution on the Plan. Returns `Some(content)` if one of the
    /// dispatched tools was `mark_step` or `terminate` (step termination).
    async fn run_one_round(&self, history: &mut Vec<Message>, response: Message) -> Option<String> {
        let tool_calls = response.tool_calls.clone().unwrap_or_default();
        history.push(response);

        let calls: Vec<(String, Value)> = tool_calls
            .iter()
            .map(|c| {
                let args: Value = serde_json::from_str(&c.arguments_json).unwrap_or(Value::Null);
                (c.name.clone(), args)
            })
            .collect();

        let results = self.registry.dispatch_all(calls.clone()).await;

        let mut terminal = None;
        for ((call, (_, args)), result) in tool_calls.iter().zip(calls.iter()).zip(results.iter()) {
            let truncated = self.llm.truncate_tool_output(result);
            history.push(Message::tool(call.id.clone(), call.name.clone(), truncated));

            {
                let mut plan = self.shared_plan.lock().expect("plan lock poisoned");
                let _ = plan.record_tool_execution(self.step_index, call.name.clone(), args.clone(), result.clone());
            }

            if call.name == "mark_step" || call.name == "terminate" {
                terminal = Some(result.clone());
            }
        }
        terminal
    }

    async fn update_facts(&self, step_result: &str) {
        let (old_facts, description) = {
            let plan = self.shared_plan.lock().expect("plan lock poisoned");
            (
                plan.facts().to_string(),
                plan.steps()[self.step_index].description.clone(),
            )
        };
        match facts::update_facts(&self.llm, &old_facts, &description, step_result).await {
            Ok(updated) => {
                let mut plan = self.shared_plan.lock().expect("plan lock poisoned");
                plan.update_facts(updated);
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to update fact sheet, leaving it unchanged");
            }
        }
    }
}

