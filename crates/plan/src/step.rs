use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status of a single step, monotonic along `NotStarted -> InProgress -> (Completed | Blocked)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    NotStarted,
    InProgress,
    Completed,
    Blocked,
}

impl StepStatus {
    /// Glyph used by `Plan::format`, part of the re-plan/finalize prompt contract.
    pub fn glyph(&self) -> &'static str {
        match self {
            StepStatus::NotStarted => "[ ]",
            StepStatus::InProgress => "[→]",
            StepStatus::Completed => "[✓]",
            StepStatus::Blocked => "[!]",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Blocked)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepStatus::NotStarted => "not_started",
            StepStatus::InProgress => "in_progress",
            StepStatus::Completed => "completed",
            StepStatus::Blocked => "blocked",
        };
        write!(f, "{s}")
    }
}

/// A single tool invocation recorded against a step. Appended, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecution {
    pub tool_name: String,
    pub arguments: Value,
    pub result: String,
    pub timestamp: DateTime<Utc>,
}

impl ToolExecution {
    pub fn new(tool_name: impl Into<String>, arguments: Value, result: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
            result: result.into(),
            timestamp: Utc::now(),
        }
    }

    /// A stable identity for this call: tool name plus its canonicalized (key-sorted) arguments.
    pub fn tool_id(&self) -> String {
        format!("{}:{}", self.tool_name, canonical_json(&self.arguments))
    }
}

fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let entries: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{:?}:{}", k, canonical_json(&map[k])))
                .collect();
            format!("{{{}}}", entries.join(","))
        }
        Value::Array(items) => {
            let entries: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", entries.join(","))
        }
        other => other.to_string(),
    }
}

/// A file reference parsed out of a step's notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFile {
    pub name: String,
    pub path: String,
}

/// One addressable unit of work inside a Plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub description: String,
    pub status: StepStatus,
    pub notes: String,
    pub tool_history: Vec<ToolExecution>,
    pub files_extracted: Vec<ExtractedFile>,
}

impl Step {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            status: StepStatus::NotStarted,
            notes: String::new(),
            tool_history: Vec::new(),
            files_extracted: Vec::new(),
        }
    }
}
