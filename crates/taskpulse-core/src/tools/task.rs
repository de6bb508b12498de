//! Task queries.

use super::{contains_ignore_case, count_arg, opt_str_arg, str_arg, Tool, ToolContext};
use crate::asana::Task;
use crate::errors::AsanaError;
use crate::executor::ToolPayload;
use crate::tools::{ParamSpec, ToolDefinition};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskFilter {
    #[default]
    All,
    Completed,
    Incomplete,
    Overdue,
}

impl TaskFilter {
    pub const NAMES: [&'static str; 4] = ["all", "completed", "incomplete", "overdue"];

    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("completed") => TaskFilter::Completed,
            Some("incomplete") => TaskFilter::Incomplete,
            Some("overdue") => TaskFilter::Overdue,
            _ => TaskFilter::All,
        }
    }

    pub fn matches(&self, task: &Task, today: NaiveDate) -> bool {
        match self {
            TaskFilter::All => true,
            TaskFilter::Completed => task.completed,
            TaskFilter::Incomplete => !task.completed,
            TaskFilter::Overdue => task.is_overdue(today),
        }
    }
}

pub struct GetProjectTasksTool {
    context: ToolContext,
}

impl GetProjectTasksTool {
    pub fn new(context: ToolContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Tool for GetProjectTasksTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("get_project_tasks", "Get tasks for a specific project")
            .param(ParamSpec::gid("project_gid", "The GID of the project").required())
            .param(
                ParamSpec::integer("limit", "Maximum number of tasks to return")
                    .range(1, 100)
                    .default_value(json!(50)),
            )
            .param(
                ParamSpec::string(
                    "filter",
                    "Which tasks to return: all, completed, incomplete, or overdue (incomplete and past due)",
                )
                .one_of(&TaskFilter::NAMES)
                .default_value(json!("all")),
            )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolPayload, AsanaError> {
        let gid = str_arg(&arguments, "project_gid")?;
        let limit = count_arg(&arguments, "limit", 50, 100);
        let filter = TaskFilter::parse(opt_str_arg(&arguments, "filter"));
        let today = self.context.today();

        let tasks = self
            .context
            .api
            .project_tasks(gid)
            .await?
            .into_iter()
            .filter(|task| filter.matches(task, today))
            .take(limit)
            .collect();

        Ok(ToolPayload::Tasks { tasks, filter })
    }
}

pub struct GetTaskDetailsTool {
    context: ToolContext,
}

impl GetTaskDetailsTool {
    pub fn new(context: ToolContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Tool for GetTaskDetailsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("get_task_details", "Get detailed information about a specific task")
            .param(ParamSpec::gid("task_gid", "The GID of the task").required())
    }

    async fn execute(&self, arguments: Value) -> Result<ToolPayload, AsanaError> {
        let gid = str_arg(&arguments, "task_gid")?;
        Ok(ToolPayload::Task(self.context.api.task(gid).await?))
    }
}

pub struct GetTaskSubtasksTool {
    context: ToolContext,
}

impl GetTaskSubtasksTool {
    pub fn new(context: ToolContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Tool for GetTaskSubtasksTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("get_task_subtasks", "Get the subtasks of a specific task")
            .param(ParamSpec::gid("task_gid", "The GID of the parent task").required())
    }

    async fn execute(&self, arguments: Value) -> Result<ToolPayload, AsanaError> {
        let gid = str_arg(&arguments, "task_gid")?;
        let tasks = self.context.api.subtasks(gid).await?;
        Ok(ToolPayload::Tasks {
            tasks,
            filter: TaskFilter::All,
        })
    }
}

pub struct SearchTasksTool {
    context: ToolContext,
}

impl SearchTasksTool {
    pub fn new(context: ToolContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Tool for SearchTasksTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "search_tasks",
            "Search for tasks by name or description across all projects in the portfolio",
        )
        .param(
            ParamSpec::string("search_text", "Text to search for in task names or descriptions")
                .required()
                .non_empty(),
        )
        .param(
            ParamSpec::integer("limit", "Maximum number of results to return")
                .range(1, 100)
                .default_value(json!(20)),
        )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolPayload, AsanaError> {
        let text = str_arg(&arguments, "search_text")?;
        let limit = count_arg(&arguments, "limit", 20, 100);
        let portfolio = self.context.scope.portfolio(None)?;

        let tasks = self
            .context
            .portfolio_tasks(&portfolio)
            .await?
            .into_iter()
            .filter(|task| {
                contains_ignore_case(&task.name, text)
                    || task.notes.as_deref().is_some_and(|n| contains_ignore_case(n, text))
            })
            .take(limit)
            .collect();

        Ok(ToolPayload::Tasks {
            tasks,
            filter: TaskFilter::All,
        })
    }
}
