//! The Plan DAG: steps, dependencies, status, notes, tool history, and facts.
//!
//! A `Plan` is mutated exclusively through `update`, `mark_step`,
//! `record_tool_execution`, and `update_facts`. Every other operation is a
//! read. Callers that share a `Plan` across concurrent actors are expected to
//! wrap it in their own synchronization (see the `orchestrator` crate); this
//! crate does not impose one, so it stays usable standalone and in tests.

pub mod error;
mod extract;
pub mod step;

use std::collections::{HashMap, HashSet};

pub use error::{PlanError, Result};
pub use step::{ExtractedFile, Step, StepStatus, ToolExecution};

/// Ordered list of steps, their dependency DAG, a running fact sheet, and a
/// terminal result string.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    title: String,
    steps: Vec<Step>,
    dependencies: HashMap<usize, Vec<usize>>,
    facts: String,
    result: String,
}

impl Plan {
    /// Builds an empty, title-less plan. Use `update` to populate it — this
    /// mirrors how the Planner constructs a Plan from the LLM's `create_plan`
    /// tool call.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn dependencies(&self) -> &HashMap<usize, Vec<usize>> {
        &self.dependencies
    }

    pub fn facts(&self) -> &str {
        &self.facts
    }

    pub fn result(&self) -> &str {
        &self.result
    }

    pub fn set_result(&mut self, result: impl Into<String>) {
        self.result = result.into();
    }

    /// Every index whose status is `NotStarted` and whose every dependency is
    /// non-`NotStarted`. No ordering beyond index order is imposed.
    pub fn ready_steps(&self) -> Vec<usize> {
        (0..self.steps.len())
            .filter(|&i| self.steps[i].status == StepStatus::NotStarted)
            .filter(|&i| {
                self.dependencies
                    .get(&i)
                    .map(|deps| {
                        deps.iter()
                            .all(|&d| self.steps[d].status != StepStatus::NotStarted)
                    })
                    .unwrap_or(true)
            })
            .collect()
    }

    /// Counts of steps by status.
    pub fn progress(&self) -> Progress {
        let mut p = Progress::default();
        for step in &self.steps {
            p.total += 1;
            match step.status {
                StepStatus::NotStarted => p.not_started += 1,
                StepStatus::InProgress => p.in_progress += 1,
                StepStatus::Completed => p.completed += 1,
                StepStatus::Blocked => p.blocked += 1,
            }
        }
        p
    }

    /// Updates status and notes of step `i`. If notes are provided, extracts
    /// file references from them and stores both the notes and the extracted
    /// file list.
    pub fn mark_step(
        &mut self,
        i: usize,
        status: Option<StepStatus>,
        notes: Option<&str>,
    ) -> Result<()> {
        let step = self
            .steps
            .get_mut(i)
            .ok_or(PlanError::InvalidStepIndex(i))?;
        if let Some(status) = status {
            step.status = status;
        }
        if let Some(notes) = notes {
            step.files_extracted = extract::extract_files(notes);
            step.notes = notes.to_string();
        }
        tracing::debug!(step = i, status = ?status, "plan.mark_step");
        Ok(())
    }

    /// Appends a tool execution to step `i`'s history. Never overwrites.
    pub fn record_tool_execution(
        &mut self,
        i: usize,
        tool_name: impl Into<String>,
        arguments: serde_json::Value,
        result: impl Into<String>,
    ) -> Result<()> {
        let step = self
            .steps
            .get_mut(i)
            .ok_or(PlanError::InvalidStepIndex(i))?;
        step.tool_history
            .push(ToolExecution::new(tool_name, arguments, result));
        Ok(())
    }

    /// Overwrites the running fact sheet.
    pub fn update_facts(&mut self, facts: impl Into<String>) {
        self.facts = facts.into();
    }

    /// Replacement-with-preservation: for each new step description, if it
    /// matches an existing non-`NotStarted` step, its status/notes/history
    /// are preserved; otherwise it is inserted fresh as `NotStarted`.
    /// Dependencies default to a linear chain when omitted and at least two
    /// steps exist. Rejects cycles and out-of-range indices, leaving the
    /// plan unchanged on error.
    pub fn update(
        &mut self,
        title: Option<String>,
        steps: Option<Vec<String>>,
        dependencies: Option<HashMap<usize, Vec<usize>>>,
    ) -> Result<()> {
        let new_steps = match &steps {
            Some(descriptions) => {
                let mut by_description: HashMap<&str, &Step> = HashMap::new();
                for step in &self.steps {
                    by_description.insert(step.description.as_str(), step);
                }
                let mut built = Vec::with_capacity(descriptions.len());
                for description in descriptions {
                    match by_description.get(description.as_str()) {
                        Some(existing) if existing.status != StepStatus::NotStarted => {
                            built.push((*existing).clone());
                        }
                        Some(existing) => {
                            let mut fresh = Step::new(description.clone());
                            fresh.notes = existing.notes.clone();
                            built.push(fresh);
                        }
                        None => built.push(Step::new(description.clone())),
                    }
                }
                Some(built)
            }
            None => None,
        };

        let new_dependencies = match dependencies {
            Some(deps) => deps,
            None => {
                let len = new_steps.as_ref().map(|s| s.len()).unwrap_or(self.steps.len());
                linear_chain(len)
            }
        };

        let len = new_steps.as_ref().map(|s| s.len()).unwrap_or(self.steps.len());
        for (&from, deps) in &new_dependencies {
            if from >= len {
                return Err(PlanError::DependencyOutOfRange(from, len));
            }
            for &to in deps {
                if to >= len {
                    return Err(PlanError::DependencyOutOfRange(to, len));
                }
            }
        }
        detect_cycle(&new_dependencies, len)?;

        if let Some(title) = title {
            self.title = title;
        }
        if let Some(new_steps) = new_steps {
            self.steps = new_steps;
        }
        self.dependencies = new_dependencies;
        Ok(())
    }

    /// Renders a stable textual representation fed back to the LLM on
    /// re-plan and finalize.
    pub fn format(&self, with_detail: bool) -> String {
        let progress = self.progress();
        let mut out = String::new();
        out.push_str(&format!("Plan: {}\n", self.title));
        out.push_str(&format!(
            "Progress: {}/{} completed ({} in progress, {} blocked, {} not started)\n",
            progress.completed,
            progress.total,
            progress.in_progress,
            progress.blocked,
            progress.not_started
        ));
        for (i, step) in self.steps.iter().enumerate() {
            let deps = self
                .dependencies
                .get(&i)
                .map(|d| {
                    d.iter()
                        .map(|x| x.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default();
            out.push_str(&format!(
                "{} {}. {} (depends on: [{}])\n",
                step.status.glyph(),
                i,
                step.description,
                deps
            ));
            if with_detail {
                if !step.notes.is_empty() {
                    out.push_str(&format!("    notes: {}\n", step.notes));
                }
                for execution in &step.tool_history {
                    out.push_str(&format!(
                        "    tool: {} -> {}\n",
                        execution.tool_name, execution.result
                    ));
                }
            }
        }
        if !self.facts.is_empty() {
            out.push_str(&format!("Facts:\n{}\n", self.facts));
        }
        out
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub blocked: usize,
    pub not_started: usize,
}

fn linear_chain(len: usize) -> HashMap<usize, Vec<usize>> {
    if len <= 1 {
        return HashMap::new();
    }
    (1..len).map(|i| (i, vec![i - 1])).collect()
}

fn detect_cycle(dependencies: &HashMap<usize, Vec<usize>>, len: usize) -> Result<()> {
    #[derive(PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }
    let mut marks: HashMap<usize, Mark> = HashMap::new();
    let mut stack_path: Vec<usize> = Vec::new();

    fn visit(
        node: usize,
        dependencies: &HashMap<usize, Vec<usize>>,
        marks: &mut HashMap<usize, Mark>,
        path: &mut Vec<usize>,
    ) -> Result<()> {
        match marks.get(&node) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let cycle_start = path.iter().position(|&n| n == node).unwrap_or(0);
                return Err(PlanError::CyclicDependency(path[cycle_start..].to_vec()));
            }
            None => {}
        }
        marks.insert(node, Mark::Visiting);
        path.push(node);
        if let Some(deps) = dependencies.get(&node) {
            for &dep in deps {
                visit(dep, dependencies, marks, path)?;
            }
        }
        path.pop();
        marks.insert(node, Mark::Done);
        Ok(())
    }

    let nodes: HashSet<usize> = (0..len).collect();
    for node in nodes {
        visit(node, dependencies, &mut marks, &mut stack_path)?;
    }
    Ok(())
}
