//! Visualization builder
//!
//! Turns the tool results of a turn into at most one chart description for
//! the rendering layer. Every number in a spec comes from a tool payload; when
//! nothing in the turn has a chartable shape the builder returns `None`.
//!
//! Several results may qualify. The pick follows a fixed order: time series
//! first, then categorical bars, then pies, then tables. Between candidates of
//! the same kind the most recent result wins.

use crate::asana::Task;
use crate::executor::{ToolPayload, ToolResult};
use crate::tools::{AssigneeStats, CompletionTrend, ProjectProgress, TaskFilter};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
    Pie,
    Table,
}

impl ChartKind {
    fn priority(self) -> u8 {
        match self {
            ChartKind::Line => 3,
            ChartKind::Bar => 2,
            ChartKind::Pie => 1,
            ChartKind::Table => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Series {
    pub name: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ChartData {
    Series {
        categories: Vec<String>,
        series: Vec<Series>,
    },
    Slices {
        labels: Vec<String>,
        values: Vec<f64>,
    },
    Table {
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    },
}

impl ChartData {
    /// Every series, slice list and row lines up with its labels.
    pub fn is_consistent(&self) -> bool {
        match self {
            ChartData::Series { categories, series } => {
                series.iter().all(|s| s.values.len() == categories.len())
            }
            ChartData::Slices { labels, values } => labels.len() == values.len(),
            ChartData::Table { columns, rows } => rows.iter().all(|r| r.len() == columns.len()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisualizationSpec {
    pub kind: ChartKind,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_axis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_axis: Option<String>,
    pub data: ChartData,
    /// Name of the tool whose result the chart shows.
    pub source_tool: String,
}

pub struct VisualizationBuilder;

impl VisualizationBuilder {
    /// Picks the chart for a set of results, in the order they were produced.
    pub fn build(results: &[ToolResult]) -> Option<VisualizationSpec> {
        let mut best: Option<VisualizationSpec> = None;
        for spec in results.iter().filter_map(Self::candidate) {
            let replace = best
                .as_ref()
                .map_or(true, |b| spec.kind.priority() >= b.kind.priority());
            if replace {
                best = Some(spec);
            }
        }
        best
    }

    fn candidate(result: &ToolResult) -> Option<VisualizationSpec> {
        let source = result.tool_name.clone();
        match result.payload()? {
            ToolPayload::Trend(trend) => Some(trend_chart(trend, source)),
            ToolPayload::Distribution(stats) if !stats.is_empty() => {
                Some(distribution_chart(stats, source))
            }
            ToolPayload::Tasks { tasks, filter } if !tasks.is_empty() => {
                Some(tasks_chart(tasks, *filter, source))
            }
            ToolPayload::Progress(progress) if progress.total > 0 => {
                Some(progress_chart(progress, source))
            }
            ToolPayload::Projects(projects) if !projects.is_empty() => Some(VisualizationSpec {
                kind: ChartKind::Table,
                title: "Projects".to_string(),
                x_axis: None,
                y_axis: None,
                data: ChartData::Table {
                    columns: vec![
                        "Name".to_string(),
                        "GID".to_string(),
                        "Owner".to_string(),
                        "Due".to_string(),
                    ],
                    rows: projects
                        .iter()
                        .map(|p| {
                            vec![
                                p.name.clone(),
                                p.gid.clone(),
                                p.owner
                                    .as_ref()
                                    .and_then(|o| o.name.clone())
                                    .unwrap_or_default(),
                                p.due_on.map(|d| d.to_string()).unwrap_or_default(),
                            ]
                        })
                        .collect(),
                },
                source_tool: source,
            }),
            ToolPayload::Users(users) if !users.is_empty() => Some(VisualizationSpec {
                kind: ChartKind::Table,
                title: "Team members".to_string(),
                x_axis: None,
                y_axis: None,
                data: ChartData::Table {
                    columns: vec!["Name".to_string(), "GID".to_string(), "Email".to_string()],
                    rows: users
                        .iter()
                        .map(|u| vec![u.name.clone(), u.gid.clone(), u.email.clone().unwrap_or_default()])
                        .collect(),
                },
                source_tool: source,
            }),
            _ => None,
        }
    }
}

fn as_values(counts: &[u32]) -> Vec<f64> {
    counts.iter().map(|&c| f64::from(c)).collect()
}

fn trend_chart(trend: &CompletionTrend, source_tool: String) -> VisualizationSpec {
    VisualizationSpec {
        kind: ChartKind::Line,
        title: format!("Task completion trend (last {} days)", trend.days),
        x_axis: Some("Date".to_string()),
        y_axis: Some("Tasks".to_string()),
        data: ChartData::Series {
            categories: trend.dates.iter().map(|d| d.to_string()).collect(),
            series: vec![
                Series {
                    name: "Completed".to_string(),
                    values: as_values(&trend.completed_counts),
                },
                Series {
                    name: "Created".to_string(),
                    values: as_values(&trend.created_counts),
                },
            ],
        },
        source_tool,
    }
}

fn distribution_chart(stats: &[AssigneeStats], source_tool: String) -> VisualizationSpec {
    VisualizationSpec {
        kind: ChartKind::Bar,
        title: "Task distribution by assignee".to_string(),
        x_axis: Some("Assignee".to_string()),
        y_axis: Some("Number of tasks".to_string()),
        data: ChartData::Series {
            categories: stats.iter().map(|s| s.assignee.clone()).collect(),
            series: vec![
                Series {
                    name: "Completed".to_string(),
                    values: stats.iter().map(|s| f64::from(s.completed)).collect(),
                },
                Series {
                    name: "Incomplete".to_string(),
                    values: stats.iter().map(|s| f64::from(s.incomplete)).collect(),
                },
            ],
        },
        source_tool,
    }
}

fn tasks_chart(tasks: &[Task], filter: TaskFilter, source_tool: String) -> VisualizationSpec {
    let mut categories: Vec<String> = Vec::new();
    let mut counts: Vec<f64> = Vec::new();
    for task in tasks {
        let name = task.assignee_name();
        match categories.iter().position(|c| c == name) {
            Some(i) => counts[i] += 1.0,
            None => {
                categories.push(name.to_string());
                counts.push(1.0);
            }
        }
    }

    let title = match filter {
        TaskFilter::All => "Tasks by assignee",
        TaskFilter::Completed => "Completed tasks by assignee",
        TaskFilter::Incomplete => "Incomplete tasks by assignee",
        TaskFilter::Overdue => "Overdue tasks by assignee",
    };

    VisualizationSpec {
        kind: ChartKind::Bar,
        title: title.to_string(),
        x_axis: Some("Assignee".to_string()),
        y_axis: Some("Number of tasks".to_string()),
        data: ChartData::Series {
            categories,
            series: vec![Series {
                name: "Tasks".to_string(),
                values: counts,
            }],
        },
        source_tool,
    }
}

fn progress_chart(progress: &ProjectProgress, source_tool: String) -> VisualizationSpec {
    VisualizationSpec {
        kind: ChartKind::Pie,
        title: format!("{} progress", progress.project_name),
        x_axis: None,
        y_axis: None,
        data: ChartData::Slices {
            labels: vec!["Completed".to_string(), "Remaining".to_string()],
            values: vec![
                f64::from(progress.completed),
                f64::from(progress.total.saturating_sub(progress.completed)),
            ],
        },
        source_tool,
    }
}
