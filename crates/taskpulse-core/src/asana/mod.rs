//! Asana data boundary
//!
//! `AsanaApi` is the read-only surface the tools query. Every call either
//! returns typed records or an `AsanaError` describing a not-found, auth,
//! rate-limit or transport condition. `AsanaHttpClient` implements it over the
//! REST API; tests substitute in-memory fixtures.

use crate::errors::AsanaError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub mod http;

pub use http::AsanaHttpClient;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRef {
    pub gid: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub gid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub gid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub owner: Option<UserRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_on: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_on: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permalink_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub gid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub assignee: Option<UserRef>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_on: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permalink_url: Option<String>,
}

pub const UNASSIGNED: &str = "Unassigned";

impl Task {
    /// Display name of the assignee, `"Unassigned"` when there is none.
    pub fn assignee_name(&self) -> &str {
        self.assignee
            .as_ref()
            .and_then(|a| a.name.as_deref())
            .unwrap_or(UNASSIGNED)
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.completed && self.due_on.is_some_and(|due| due < today)
    }
}

/// Identifiers the deployment is scoped to. Opaque to the core.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AsanaScope {
    pub portfolio_gid: Option<String>,
    pub team_gid: Option<String>,
    pub workspace_gid: Option<String>,
}

impl AsanaScope {
    pub fn portfolio(&self, override_gid: Option<&str>) -> Result<String, AsanaError> {
        override_gid
            .map(str::to_string)
            .or_else(|| self.portfolio_gid.clone())
            .ok_or_else(|| {
                AsanaError::MissingScope("no portfolio_gid given and none configured".to_string())
            })
    }

    pub fn team(&self) -> Result<String, AsanaError> {
        self.team_gid
            .clone()
            .ok_or_else(|| AsanaError::MissingScope("no team_gid configured".to_string()))
    }
}

#[async_trait]
pub trait AsanaApi: Send + Sync {
    async fn portfolio_projects(&self, portfolio_gid: &str) -> Result<Vec<Project>, AsanaError>;

    async fn project(&self, project_gid: &str) -> Result<Project, AsanaError>;

    /// All tasks of a project, completed ones included.
    async fn project_tasks(&self, project_gid: &str) -> Result<Vec<Task>, AsanaError>;

    async fn task(&self, task_gid: &str) -> Result<Task, AsanaError>;

    async fn subtasks(&self, task_gid: &str) -> Result<Vec<Task>, AsanaError>;

    async fn team_users(&self, team_gid: &str) -> Result<Vec<User>, AsanaError>;

    async fn user(&self, user_gid: &str) -> Result<User, AsanaError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(completed: bool, due_on: Option<&str>) -> Task {
        Task {
            gid: "1".to_string(),
            name: "Write report".to_string(),
            assignee: None,
            completed,
            completed_at: None,
            created_at: None,
            due_on: due_on.map(|d| d.parse().expect("date")),
            notes: None,
            permalink_url: None,
        }
    }

    #[test]
    fn test_overdue_requires_incomplete_and_past_due() {
        let today: NaiveDate = "2024-03-10".parse().expect("date");
        assert!(task(false, Some("2024-03-09")).is_overdue(today));
        assert!(!task(false, Some("2024-03-10")).is_overdue(today));
        assert!(!task(true, Some("2024-03-01")).is_overdue(today));
        assert!(!task(false, None).is_overdue(today));
    }

    #[test]
    fn test_unassigned_name() {
        assert_eq!(task(false, None).assignee_name(), UNASSIGNED);
    }

    #[test]
    fn test_scope_override_and_missing() {
        let scope = AsanaScope {
            portfolio_gid: Some("100".to_string()),
            ..Default::default()
        };
        assert_eq!(scope.portfolio(None).expect("configured"), "100");
        assert_eq!(scope.portfolio(Some("200")).expect("override"), "200");
        assert!(matches!(scope.team(), Err(AsanaError::MissingScope(_))));
    }

    #[test]
    fn test_task_deserializes_asana_shape() {
        let task: Task = serde_json::from_value(serde_json::json!({
            "gid": "42",
            "name": "Ship it",
            "assignee": {"gid": "7", "name": "Alice"},
            "completed": false,
            "due_on": "2024-05-01",
            "created_at": "2024-04-01T10:00:00.000Z",
            "completed_at": null
        }))
        .expect("task");
        assert_eq!(task.assignee_name(), "Alice");
        assert_eq!(task.due_on, Some("2024-05-01".parse().expect("date")));
        assert!(task.completed_at.is_none());
    }
}
