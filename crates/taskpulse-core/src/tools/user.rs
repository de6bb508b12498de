//! Team member queries.

use super::{contains_ignore_case, count_arg, opt_bool_arg, str_arg, Tool, ToolContext};
use crate::asana::User;
use crate::errors::AsanaError;
use crate::executor::ToolPayload;
use crate::tools::{ParamSpec, TaskFilter, ToolDefinition};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;

/// Team members whose name contains `name`, case-insensitively.
async fn matching_users(context: &ToolContext, name: &str) -> Result<Vec<User>, AsanaError> {
    let team = context.scope.team()?;
    let users: Vec<User> = context
        .api
        .team_users(&team)
        .await?
        .into_iter()
        .filter(|u| contains_ignore_case(&u.name, name))
        .collect();

    if users.is_empty() {
        return Err(AsanaError::NotFound(format!("User named '{}'", name)));
    }
    Ok(users)
}

pub struct GetUsersInTeamTool {
    context: ToolContext,
}

impl GetUsersInTeamTool {
    pub fn new(context: ToolContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Tool for GetUsersInTeamTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("get_users_in_team", "Get all members of the configured team")
    }

    async fn execute(&self, _arguments: Value) -> Result<ToolPayload, AsanaError> {
        let team = self.context.scope.team()?;
        Ok(ToolPayload::Users(self.context.api.team_users(&team).await?))
    }
}

pub struct GetUserDetailsTool {
    context: ToolContext,
}

impl GetUserDetailsTool {
    pub fn new(context: ToolContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Tool for GetUserDetailsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("get_user_details", "Get detailed information about a specific user")
            .param(ParamSpec::gid("user_gid", "The GID of the user").required())
    }

    async fn execute(&self, arguments: Value) -> Result<ToolPayload, AsanaError> {
        let gid = str_arg(&arguments, "user_gid")?;
        Ok(ToolPayload::User(self.context.api.user(gid).await?))
    }
}

pub struct FindUserByNameTool {
    context: ToolContext,
}

impl FindUserByNameTool {
    pub fn new(context: ToolContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Tool for FindUserByNameTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("find_user_by_name", "Find team members by full or partial name")
            .param(
                ParamSpec::string("user_name", "Name of the user to search for")
                    .required()
                    .non_empty(),
            )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolPayload, AsanaError> {
        let name = str_arg(&arguments, "user_name")?;
        Ok(ToolPayload::Users(matching_users(&self.context, name).await?))
    }
}

pub struct GetTasksByAssigneeTool {
    context: ToolContext,
}

impl GetTasksByAssigneeTool {
    pub fn new(context: ToolContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Tool for GetTasksByAssigneeTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "get_tasks_by_assignee",
            "Get portfolio tasks assigned to a specific user",
        )
        .param(
            ParamSpec::string("assignee_name", "Name of the assignee to search for")
                .required()
                .non_empty(),
        )
        .param(ParamSpec::boolean(
            "completed",
            "true for completed tasks only, false for open tasks only; omit for all tasks",
        ))
        .param(
            ParamSpec::integer("limit", "Maximum number of tasks to return")
                .range(1, 100)
                .default_value(json!(50)),
        )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolPayload, AsanaError> {
        let name = str_arg(&arguments, "assignee_name")?;
        let completed = opt_bool_arg(&arguments, "completed");
        let limit = count_arg(&arguments, "limit", 50, 100);

        let assignees: HashSet<String> = matching_users(&self.context, name)
            .await?
            .into_iter()
            .map(|u| u.gid)
            .collect();
        let portfolio = self.context.scope.portfolio(None)?;

        let tasks = self
            .context
            .portfolio_tasks(&portfolio)
            .await?
            .into_iter()
            .filter(|task| {
                task.assignee
                    .as_ref()
                    .is_some_and(|a| assignees.contains(&a.gid))
            })
            .filter(|task| completed.map_or(true, |c| task.completed == c))
            .take(limit)
            .collect();

        let filter = match completed {
            Some(true) => TaskFilter::Completed,
            Some(false) => TaskFilter::Incomplete,
            None => TaskFilter::All,
        };
        Ok(ToolPayload::Tasks { tasks, filter })
    }
}
