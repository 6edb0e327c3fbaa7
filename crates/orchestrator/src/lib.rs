//! Wires the Plan DAG, LLM client, tool registry, and event bus into the
//! single `execute(task, output_format?) -> String` entry point (§6).

pub mod actor;
pub mod error;
pub mod events;
pub mod facts;
pub mod planner;
pub mod scheduler;

pub use error::{OrchestratorError, Result};
pub use events::{Event, EventBus, Subscriber, TOPIC_PLAN_PROCESS};

use llm::LlmClient;
use scheduler::SchedulerConfig;
use std::sync::Arc;
use tooling::{Config, ToolRegistry};

/// The orchestration kernel. Owns the LLM client, an `EventBus` that callers
/// may subscribe to before calling `execute`, and whatever domain-specific
/// tools were registered at construction.
pub struct Orchestrator {
    llm: Arc<LlmClient>,
    domain_tools: ToolRegistry,
    event_bus: Arc<EventBus>,
    config: Config,
}

impl Orchestrator {
    pub fn new(llm: Arc<LlmClient>, domain_tools: ToolRegistry, config: Config) -> Self {
        Self {
            llm,
            domain_tools,
            event_bus: Arc::new(EventBus::new()),
            config,
        }
    }

    /// Subscribes to plan-progress events before `execute` runs.
    pub fn subscribe(&self, topic: impl Into<String>, subscriber: Subscriber) {
        self.event_bus.subscribe(topic, subscriber);
    }

    /// Runs the Planner/Scheduler loop to completion and returns the final
    /// answer. Errors here are unrecoverable LLM failures during planning or
    /// finalization (§4.6); everything else is absorbed per §7's
    /// propagation policy and folded into the returned string.
    pub async fn execute(&self, task: &str, output_format: Option<&str>) -> String {
        let scheduler_config = SchedulerConfig {
            max_concurrent_actors: self.config.scheduler_cap(),
            max_planner_retries: self.config.max_planner_retries,
            max_actor_iterations: self.config.max_actor_iterations,
        };

        match scheduler::execute(
            self.llm.clone(),
            self.domain_tools.clone(),
            self.event_bus.clone(),
            task,
            output_format,
            scheduler_config,
        )
        .await
        {
            Ok(answer) => answer,
            Err(err) => format!("error: {err}"),
        }
    }
}
