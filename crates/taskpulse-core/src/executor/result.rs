//! The result envelope recorded for every tool call.

use crate::asana::{Project, Task, User};
use crate::tools::{AssigneeStats, CompletionTrend, ProjectProgress, TaskFilter};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Domain data a successful tool call returns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ToolPayload {
    Projects(Vec<Project>),
    Project(Project),
    Tasks { tasks: Vec<Task>, filter: TaskFilter },
    Task(Task),
    Users(Vec<User>),
    User(User),
    Distribution(Vec<AssigneeStats>),
    Trend(CompletionTrend),
    Progress(ProjectProgress),
}

/// Why a call failed, so the model can word its explanation accordingly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    InvalidRequest,
    NotFound,
    Unauthorized,
    TemporarilyUnavailable,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success { result: ToolPayload },
    Error { error_kind: ToolErrorKind, error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub call_id: String,
    pub tool_name: String,
    pub outcome: ToolOutcome,
}

impl ToolResult {
    pub fn success(call_id: String, tool_name: String, payload: ToolPayload) -> Self {
        Self {
            call_id,
            tool_name,
            outcome: ToolOutcome::Success { result: payload },
        }
    }

    pub fn error(call_id: String, tool_name: String, kind: ToolErrorKind, message: String) -> Self {
        Self {
            call_id,
            tool_name,
            outcome: ToolOutcome::Error {
                error_kind: kind,
                error: message,
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Success { .. })
    }

    pub fn payload(&self) -> Option<&ToolPayload> {
        match &self.outcome {
            ToolOutcome::Success { result } => Some(result),
            ToolOutcome::Error { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<ToolErrorKind> {
        match &self.outcome {
            ToolOutcome::Success { .. } => None,
            ToolOutcome::Error { error_kind, .. } => Some(*error_kind),
        }
    }

    /// Content of the tool message the model receives.
    pub fn to_message_content(&self) -> String {
        serde_json::to_string(&self.outcome).unwrap_or_else(|e| {
            json!({
                "status": "error",
                "error_kind": "failed",
                "error": format!("result could not be serialized: {}", e)
            })
            .to_string()
        })
    }
}
