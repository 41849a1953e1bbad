use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(TaskStatus::Pending),
            "running" => Some(TaskStatus::Running),
            "completed" => Some(TaskStatus::Completed),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tracked unit of agent work. Created by the backend only; the
/// dashboard reads, cancels or deletes it. `completed_at` is set by the
/// backend exactly when the status is terminal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub task_type: String,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Value,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Execution steps embedded in `result.steps`, ordered by step number.
    /// Missing or undecodable steps are an empty sequence, not an error.
    pub fn steps(&self) -> Vec<Step> {
        let mut steps: Vec<Step> = self
            .result
            .as_ref()
            .and_then(|result| result.get("steps"))
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default();
        steps.sort_by_key(|step| step.step_number);
        steps
    }

    pub fn execution_summary(&self) -> Option<&Value> {
        self.result.as_ref()?.get("execution_summary")
    }
}

/// One stage of a task's execution.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub step_id: String,
    #[serde(default)]
    pub step_number: u32,
    #[serde(default)]
    pub step_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "step_status_default")]
    pub status: String,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_ms: f64,
    #[serde(default)]
    pub llm_input: Option<String>,
    #[serde(default)]
    pub llm_output: Option<String>,
    #[serde(default)]
    pub decision: Option<String>,
    #[serde(default)]
    pub intermediate_result: Option<Value>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

fn step_status_default() -> String {
    "running".to_string()
}

/// One invocation of an external capability during a step.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub call_id: String,
    #[serde(default)]
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Value,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_ms: Option<f64>,
}

impl ToolCall {
    /// A set `error` means the call failed, whatever `result` says.
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub pending: u64,
    #[serde(default)]
    pub running: u64,
    #[serde(default)]
    pub completed: u64,
    #[serde(default)]
    pub failed: u64,
}
