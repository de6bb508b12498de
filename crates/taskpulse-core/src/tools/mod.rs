//! Tool system: the read-only Asana queries the model may call
//!
//! Each tool declares a typed `ToolDefinition` and executes against the shared
//! `ToolContext`. Tools never see raw model output: the registry validates the
//! arguments first and fills defaults, so `execute` only reads well-formed
//! values. Failures are reported as `AsanaError` and folded into a
//! `ToolResult` by the executor.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures_util::future::try_join_all;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

use crate::asana::{AsanaApi, AsanaScope, Task};
use crate::errors::{AsanaError, AssistantError};
use crate::executor::ToolPayload;

pub mod definition;
pub mod registry;

pub mod project;
pub mod reporting;
pub mod task;
pub mod user;

pub use definition::{ParamSpec, ParamType, ToolDefinition, GID_PATTERN};
pub use registry::{ToolRegistry, ValidatedCall};
pub use reporting::{AssigneeStats, CompletionTrend, ProjectProgress};
pub use task::TaskFilter;

#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;
    async fn execute(&self, arguments: Value) -> Result<ToolPayload, AsanaError>;
}

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Everything a tool needs to answer a query.
#[derive(Clone)]
pub struct ToolContext {
    pub api: Arc<dyn AsanaApi>,
    pub scope: AsanaScope,
    clock: Clock,
}

impl ToolContext {
    pub fn new(api: Arc<dyn AsanaApi>, scope: AsanaScope) -> Self {
        Self {
            api,
            scope,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// Tasks of every project in the portfolio, each task listed once.
    pub async fn portfolio_tasks(&self, portfolio_gid: &str) -> Result<Vec<Task>, AsanaError> {
        let projects = self.api.portfolio_projects(portfolio_gid).await?;
        let per_project = try_join_all(
            projects
                .iter()
                .map(|project| self.api.project_tasks(&project.gid)),
        )
        .await?;

        let mut seen = HashSet::new();
        Ok(per_project
            .into_iter()
            .flatten()
            .filter(|task| seen.insert(task.gid.clone()))
            .collect())
    }

    /// Tasks of one project when given, otherwise of the configured portfolio.
    pub async fn scoped_tasks(&self, project_gid: Option<&str>) -> Result<Vec<Task>, AsanaError> {
        match project_gid {
            Some(gid) => self.api.project_tasks(gid).await,
            None => {
                let portfolio = self.scope.portfolio(None)?;
                self.portfolio_tasks(&portfolio).await
            }
        }
    }
}

pub(crate) fn str_arg<'a>(arguments: &'a Value, name: &str) -> Result<&'a str, AsanaError> {
    arguments
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| AsanaError::InvalidRequest(format!("missing argument '{}'", name)))
}

pub(crate) fn opt_str_arg<'a>(arguments: &'a Value, name: &str) -> Option<&'a str> {
    arguments.get(name).and_then(Value::as_str)
}

pub(crate) fn opt_bool_arg(arguments: &Value, name: &str) -> Option<bool> {
    arguments.get(name).and_then(Value::as_bool)
}

pub(crate) fn count_arg(arguments: &Value, name: &str, default: u64, max: u64) -> usize {
    arguments
        .get(name)
        .and_then(Value::as_u64)
        .unwrap_or(default)
        .clamp(1, max) as usize
}

pub(crate) fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

pub struct ToolFactory;

impl ToolFactory {
    /// Every Asana tool, in the order the model sees them.
    pub fn create_asana_tools(context: ToolContext) -> Vec<Arc<dyn Tool>> {
        vec![
            Arc::new(project::GetPortfolioProjectsTool::new(context.clone())),
            Arc::new(project::GetProjectDetailsTool::new(context.clone())),
            Arc::new(project::GetProjectGidByNameTool::new(context.clone())),
            Arc::new(project::GetProjectsByOwnerTool::new(context.clone())),
            Arc::new(task::GetProjectTasksTool::new(context.clone())),
            Arc::new(task::GetTaskDetailsTool::new(context.clone())),
            Arc::new(task::GetTaskSubtasksTool::new(context.clone())),
            Arc::new(task::SearchTasksTool::new(context.clone())),
            Arc::new(user::GetUsersInTeamTool::new(context.clone())),
            Arc::new(user::GetUserDetailsTool::new(context.clone())),
            Arc::new(user::FindUserByNameTool::new(context.clone())),
            Arc::new(user::GetTasksByAssigneeTool::new(context.clone())),
            Arc::new(reporting::TaskDistributionTool::new(context.clone())),
            Arc::new(reporting::CompletionTrendTool::new(context.clone())),
            Arc::new(reporting::ProjectProgressTool::new(context)),
        ]
    }

    pub fn create_asana_registry(context: ToolContext) -> Result<ToolRegistry, AssistantError> {
        let mut registry = ToolRegistry::new();
        for tool in Self::create_asana_tools(context) {
            registry.register(tool)?;
        }
        log::info!("Registered {} Asana tools", registry.tool_count());
        Ok(registry)
    }
}
