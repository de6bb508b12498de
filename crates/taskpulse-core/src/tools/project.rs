//! Project queries.

use super::{contains_ignore_case, opt_str_arg, str_arg, Tool, ToolContext};
use crate::errors::AsanaError;
use crate::executor::ToolPayload;
use crate::tools::{ParamSpec, ToolDefinition};
use async_trait::async_trait;
use serde_json::Value;

pub struct GetPortfolioProjectsTool {
    context: ToolContext,
}

impl GetPortfolioProjectsTool {
    pub fn new(context: ToolContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Tool for GetPortfolioProjectsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("get_portfolio_projects", "Get all projects in a portfolio").param(
            ParamSpec::gid(
                "portfolio_gid",
                "The GID of the portfolio (optional, the configured portfolio is used when omitted)",
            ),
        )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolPayload, AsanaError> {
        let portfolio = self
            .context
            .scope
            .portfolio(opt_str_arg(&arguments, "portfolio_gid"))?;
        let projects = self.context.api.portfolio_projects(&portfolio).await?;
        Ok(ToolPayload::Projects(projects))
    }
}

pub struct GetProjectDetailsTool {
    context: ToolContext,
}

impl GetProjectDetailsTool {
    pub fn new(context: ToolContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Tool for GetProjectDetailsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "get_project_details",
            "Get detailed information about a specific project",
        )
        .param(ParamSpec::gid("project_gid", "The GID of the project").required())
    }

    async fn execute(&self, arguments: Value) -> Result<ToolPayload, AsanaError> {
        let gid = str_arg(&arguments, "project_gid")?;
        Ok(ToolPayload::Project(self.context.api.project(gid).await?))
    }
}

pub struct GetProjectGidByNameTool {
    context: ToolContext,
}

impl GetProjectGidByNameTool {
    pub fn new(context: ToolContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Tool for GetProjectGidByNameTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "get_project_gid_by_name",
            "Find a portfolio project by its name. Returns the best match, including its GID",
        )
        .param(
            ParamSpec::string(
                "project_name",
                "Full or partial name of the project to search for",
            )
            .required()
            .non_empty(),
        )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolPayload, AsanaError> {
        let name = str_arg(&arguments, "project_name")?;
        let portfolio = self.context.scope.portfolio(None)?;
        let projects = self.context.api.portfolio_projects(&portfolio).await?;

        // Exact (case-insensitive) match wins over a partial one.
        let best = projects
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .or_else(|| projects.iter().find(|p| contains_ignore_case(&p.name, name)))
            .cloned()
            .ok_or_else(|| AsanaError::NotFound(format!("Project named '{}'", name)))?;

        Ok(ToolPayload::Project(best))
    }
}

pub struct GetProjectsByOwnerTool {
    context: ToolContext,
}

impl GetProjectsByOwnerTool {
    pub fn new(context: ToolContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Tool for GetProjectsByOwnerTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("get_projects_by_owner", "Get portfolio projects owned by a specific user")
            .param(
                ParamSpec::string("owner_name", "Name of the project owner to search for")
                    .required()
                    .non_empty(),
            )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolPayload, AsanaError> {
        let owner = str_arg(&arguments, "owner_name")?;
        let portfolio = self.context.scope.portfolio(None)?;
        let projects = self
            .context
            .api
            .portfolio_projects(&portfolio)
            .await?
            .into_iter()
            .filter(|p| {
                p.owner
                    .as_ref()
                    .and_then(|o| o.name.as_deref())
                    .is_some_and(|n| contains_ignore_case(n, owner))
            })
            .collect();
        Ok(ToolPayload::Projects(projects))
    }
}
