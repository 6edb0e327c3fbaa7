use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("plan error: {0}")]
    Plan(#[from] plan::PlanError),

    #[error("llm call failed: {0}")]
    LlmCallFailed(String),

    #[error("planner could not produce a usable plan after {attempts} attempts: {reason}")]
    PlanningFailed { attempts: u32, reason: String },

    #[error("re-plan rejected: {0}")]
    PlanInvariantViolation(String),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
