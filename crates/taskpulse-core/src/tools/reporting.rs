//! Aggregate reports computed from task records.
//!
//! Reports summarise what Asana returned and nothing more: an assignee with no
//! tasks in scope does not appear, and a trend day with no activity counts zero.

use super::{opt_bool_arg, opt_str_arg, str_arg, count_arg, Tool, ToolContext};
use crate::asana::Task;
use crate::errors::AsanaError;
use crate::executor::ToolPayload;
use crate::tools::{ParamSpec, ToolDefinition};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssigneeStats {
    pub assignee: String,
    pub total: u32,
    pub completed: u32,
    pub incomplete: u32,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionTrend {
    pub days: u32,
    pub dates: Vec<NaiveDate>,
    pub completed_counts: Vec<u32>,
    pub created_counts: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectProgress {
    pub project_gid: String,
    pub project_name: String,
    pub completed: u32,
    pub total: u32,
    pub percent_complete: f64,
}

/// Per-assignee counts in order of first appearance.
pub fn distribution_by_assignee(tasks: &[Task], include_completed: bool) -> Vec<AssigneeStats> {
    let mut stats: Vec<AssigneeStats> = Vec::new();

    for task in tasks.iter().filter(|t| include_completed || !t.completed) {
        let name = task.assignee_name();
        let position = match stats.iter().position(|s| s.assignee == name) {
            Some(position) => position,
            None => {
                stats.push(AssigneeStats {
                    assignee: name.to_string(),
                    total: 0,
                    completed: 0,
                    incomplete: 0,
                    completion_rate: 0.0,
                });
                stats.len() - 1
            }
        };
        let entry = &mut stats[position];
        entry.total += 1;
        if task.completed {
            entry.completed += 1;
        } else {
            entry.incomplete += 1;
        }
    }

    for entry in &mut stats {
        entry.completion_rate = if entry.total == 0 {
            0.0
        } else {
            (entry.completed as f64 / entry.total as f64 * 1000.0).round() / 10.0
        };
    }
    stats
}

/// Daily created and completed counts over the `days` ending on `today`.
pub fn completion_trend(tasks: &[Task], today: NaiveDate, days: u32) -> CompletionTrend {
    let start = today - Duration::days(i64::from(days.max(1)) - 1);
    let dates: Vec<NaiveDate> = start.iter_days().take(days.max(1) as usize).collect();
    let mut completed_counts = vec![0_u32; dates.len()];
    let mut created_counts = vec![0_u32; dates.len()];

    let slot = |date: NaiveDate| -> Option<usize> {
        if date < start || date > today {
            None
        } else {
            Some((date - start).num_days() as usize)
        }
    };

    for task in tasks {
        if let Some(i) = task.created_at.and_then(|t| slot(t.date_naive())) {
            created_counts[i] += 1;
        }
        if task.completed {
            if let Some(i) = task.completed_at.and_then(|t| slot(t.date_naive())) {
                completed_counts[i] += 1;
            }
        }
    }

    CompletionTrend {
        days: dates.len() as u32,
        dates,
        completed_counts,
        created_counts,
    }
}

pub struct TaskDistributionTool {
    context: ToolContext,
}

impl TaskDistributionTool {
    pub fn new(context: ToolContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Tool for TaskDistributionTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "get_task_distribution_by_assignee",
            "Get task distribution statistics grouped by assignee",
        )
        .param(ParamSpec::gid(
            "project_gid",
            "The GID of the project (optional, all portfolio projects are used when omitted)",
        ))
        .param(
            ParamSpec::boolean(
                "include_completed",
                "Whether to include completed tasks in the statistics",
            )
            .default_value(json!(true)),
        )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolPayload, AsanaError> {
        let include_completed = opt_bool_arg(&arguments, "include_completed").unwrap_or(true);
        let tasks = self
            .context
            .scoped_tasks(opt_str_arg(&arguments, "project_gid"))
            .await?;
        Ok(ToolPayload::Distribution(distribution_by_assignee(
            &tasks,
            include_completed,
        )))
    }
}

pub struct CompletionTrendTool {
    context: ToolContext,
}

impl CompletionTrendTool {
    pub fn new(context: ToolContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Tool for CompletionTrendTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "get_task_completion_trend",
            "Get the daily number of created and completed tasks over a recent period",
        )
        .param(ParamSpec::gid(
            "project_gid",
            "The GID of the project (optional, all portfolio projects are used when omitted)",
        ))
        .param(
            ParamSpec::integer("days", "Number of days to look back")
                .range(1, 365)
                .default_value(json!(30)),
        )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolPayload, AsanaError> {
        let days = count_arg(&arguments, "days", 30, 365) as u32;
        let tasks = self
            .context
            .scoped_tasks(opt_str_arg(&arguments, "project_gid"))
            .await?;
        Ok(ToolPayload::Trend(completion_trend(
            &tasks,
            self.context.today(),
            days,
        )))
    }
}

pub struct ProjectProgressTool {
    context: ToolContext,
}

impl ProjectProgressTool {
    pub fn new(context: ToolContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Tool for ProjectProgressTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "get_project_progress",
            "Get the number of completed tasks out of all tasks in a project",
        )
        .param(ParamSpec::gid("project_gid", "The GID of the project").required())
    }

    async fn execute(&self, arguments: Value) -> Result<ToolPayload, AsanaError> {
        let gid = str_arg(&arguments, "project_gid")?;
        let (project, tasks) = futures_util::try_join!(
            self.context.api.project(gid),
            self.context.api.project_tasks(gid)
        )?;

        let total = tasks.len() as u32;
        let completed = tasks.iter().filter(|t| t.completed).count() as u32;
        let percent_complete = if total == 0 {
            0.0
        } else {
            (completed as f64 / total as f64 * 1000.0).round() / 10.0
        };

        Ok(ToolPayload::Progress(ProjectProgress {
            project_gid: project.gid,
            project_name: project.name,
            completed,
            total,
            percent_complete,
        }))
    }
}
