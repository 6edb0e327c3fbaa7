//! The two universal tools every Actor registers (§4.3): `mark_step`, the
//! sole way an Actor signals step termination, and `terminate`, a reserved
//! terminal signal with identical effect bound to the Actor's own step.

use crate::registry::{Tool, ToolFuture};
use plan::{Plan, StepStatus};
use serde_json::Value;
use std::sync::{Arc, Mutex};

pub type SharedPlan = Arc<Mutex<Plan>>;

fn parse_status(raw: &str) -> anyhow::Result<StepStatus> {
    match raw {
        "completed" => Ok(StepStatus::Completed),
        "blocked" => Ok(StepStatus::Blocked),
        other => Err(anyhow::anyhow!(
            "step_status must be \"completed\" or \"blocked\", got {other:?}"
        )),
    }
}

/// `mark_step(step_index, step_status, step_notes)`.
pub fn mark_step_tool(shared_plan: SharedPlan) -> Tool {
    Tool::new(
        "mark_step",
        "Marks a plan step as completed or blocked, recording notes. The only way to signal step termination.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "step_index": {"type": "integer"},
                "step_status": {"type": "string", "enum": ["completed", "blocked"]},
                "step_notes": {"type": "string"},
            },
            "required": ["step_index", "step_status", "step_notes"],
        }),
        Arc::new(move |args: Value| {
            let shared_plan = shared_plan.clone();
            Box::pin(async move {
                let step_index = args
                    .get("step_index")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| anyhow::anyhow!("step_index is required"))? as usize;
                let status = args
                    .get("step_status")
                    .and_then(Value::as_str)
                    .ok_or_else(|| anyhow::anyhow!("step_status is required"))?;
                let status = parse_status(status)?;
                let notes = args.get("step_notes").and_then(Value::as_str).unwrap_or("");

                let mut plan = shared_plan
                    .lock()
                    .map_err(|_| anyhow::anyhow!("plan lock poisoned"))?;
                plan.mark_step(step_index, Some(status), Some(notes))?;
                Ok(format!("step {step_index} marked {status}"))
            }) as ToolFuture
        }),
    )
}

/// `terminate()` — reserved terminal signal, identical effect to marking the
/// Actor's own current step `completed`. Bound to `step_index` at
/// registration time since, unlike `mark_step`, its signature carries no
/// index of its own.
pub fn terminate_tool(shared_plan: SharedPlan, step_index: usize) -> Tool {
    Tool::new(
        "terminate",
        "Signals that the current step is finished. Equivalent to mark_step(step_index, \"completed\", step_notes).",
        serde_json::json!({
            "type": "object",
            "properties": {
                "step_notes": {"type": "string"},
            },
            "required": ["step_notes"],
        }),
        Arc::new(move |args: Value| {
            let shared_plan = shared_plan.clone();
            Box::pin(async move {
                let notes = args.get("step_notes").and_then(Value::as_str).unwrap_or("");
                let mut plan = shared_plan
                    .lock()
                    .map_err(|_| anyhow::anyhow!("plan lock poisoned"))?;
                plan.mark_step(step_index, Some(StepStatus::Completed), Some(notes))?;
                Ok(format!("step {step_index} marked completed"))
            }) as ToolFuture
        }),
    )
}
