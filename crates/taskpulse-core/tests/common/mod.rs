#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use taskpulse_core::asana::{AsanaApi, Project, Task, User, UserRef};
use taskpulse_core::core_types::{LLMResponse, Message, ToolCall};
use taskpulse_core::errors::{AsanaError, AssistantError};
use taskpulse_core::llm::{ToolMetadata, LLM};
use taskpulse_core::{AssistantFactory, TaskpulseConfig};

#[derive(Clone)]
pub struct MockLLM {
    responses: Arc<Mutex<VecDeque<LLMResponse>>>,
    default_response: LLMResponse,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl MockLLM {
    pub fn new(responses: Vec<LLMResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            default_response: LLMResponse::text("OK"),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_default(mut self, response: LLMResponse) -> Self {
        self.default_response = response;
        self
    }

    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLM for MockLLM {
    async fn generate(
        &self,
        messages: Vec<Message>,
        _tools: Option<Vec<ToolMetadata>>,
    ) -> Result<LLMResponse, AssistantError> {
        self.requests.lock().unwrap().push(messages);
        let next = self.responses.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.default_response.clone()))
    }
}

/// Asana data held in memory, with queued failures per method.
#[derive(Default)]
pub struct InMemoryAsana {
    pub projects: Vec<Project>,
    pub tasks: HashMap<String, Vec<Task>>,
    pub users: Vec<User>,
    failures: Mutex<HashMap<&'static str, VecDeque<AsanaError>>>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl InMemoryAsana {
    pub fn fail_next(&self, method: &'static str, errors: Vec<AsanaError>) {
        self.failures
            .lock()
            .unwrap()
            .entry(method)
            .or_default()
            .extend(errors);
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
    }

    fn enter(&self, method: &'static str) -> Result<(), AsanaError> {
        *self.calls.lock().unwrap().entry(method).or_default() += 1;
        let failure = self
            .failures
            .lock()
            .unwrap()
            .get_mut(method)
            .and_then(|queue| queue.pop_front());
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AsanaApi for InMemoryAsana {
    async fn portfolio_projects(&self, _portfolio_gid: &str) -> Result<Vec<Project>, AsanaError> {
        self.enter("portfolio_projects")?;
        Ok(self.projects.clone())
    }

    async fn project(&self, project_gid: &str) -> Result<Project, AsanaError> {
        self.enter("project")?;
        self.projects
            .iter()
            .find(|p| p.gid == project_gid)
            .cloned()
            .ok_or_else(|| AsanaError::NotFound(format!("project {}", project_gid)))
    }

    async fn project_tasks(&self, project_gid: &str) -> Result<Vec<Task>, AsanaError> {
        self.enter("project_tasks")?;
        self.tasks
            .get(project_gid)
            .cloned()
            .ok_or_else(|| AsanaError::NotFound(format!("project {}", project_gid)))
    }

    async fn task(&self, task_gid: &str) -> Result<Task, AsanaError> {
        self.enter("task")?;
        self.tasks
            .values()
            .flatten()
            .find(|t| t.gid == task_gid)
            .cloned()
            .ok_or_else(|| AsanaError::NotFound(format!("task {}", task_gid)))
    }

    async fn subtasks(&self, _task_gid: &str) -> Result<Vec<Task>, AsanaError> {
        self.enter("subtasks")?;
        Ok(Vec::new())
    }

    async fn team_users(&self, _team_gid: &str) -> Result<Vec<User>, AsanaError> {
        self.enter("team_users")?;
        Ok(self.users.clone())
    }

    async fn user(&self, user_gid: &str) -> Result<User, AsanaError> {
        self.enter("user")?;
        self.users
            .iter()
            .find(|u| u.gid == user_gid)
            .cloned()
            .ok_or_else(|| AsanaError::NotFound(format!("user {}", user_gid)))
    }
}

pub fn days_from_today(days: i64) -> NaiveDate {
    Utc::now().date_naive() + ChronoDuration::days(days)
}

pub fn project(gid: &str, name: &str) -> Project {
    Project {
        gid: gid.to_string(),
        name: name.to_string(),
        owner: None,
        start_on: None,
        due_on: None,
        created_at: None,
        archived: false,
        notes: None,
        permalink_url: None,
    }
}

pub fn task(gid: &str, name: &str, assignee: Option<&str>, completed: bool, due_in_days: i64) -> Task {
    Task {
        gid: gid.to_string(),
        name: name.to_string(),
        assignee: assignee.map(|name| UserRef {
            gid: format!("9{}", name.len()),
            name: Some(name.to_string()),
        }),
        completed,
        completed_at: None,
        created_at: None,
        due_on: Some(days_from_today(due_in_days)),
        notes: None,
        permalink_url: None,
    }
}

/// Project 42 "Project X" with three overdue tasks, one done and one upcoming.
pub fn project_x() -> InMemoryAsana {
    let mut asana = InMemoryAsana {
        projects: vec![project("42", "Project X"), project("43", "Project Y")],
        ..Default::default()
    };
    asana.tasks.insert(
        "42".to_string(),
        vec![
            task("501", "Draft contract", Some("Dana"), false, -5),
            task("502", "Collect quotes", Some("Eli"), false, -2),
            task("503", "Sign off budget", Some("Dana"), false, -1),
            task("504", "Kickoff meeting", Some("Eli"), true, -7),
            task("505", "Order hardware", None, false, 6),
        ],
    );
    asana.tasks.insert("43".to_string(), Vec::new());
    asana
}

pub fn config() -> TaskpulseConfig {
    serde_yaml::from_str(
        r#"
assistant:
  max_iterations: 4
llm:
  model: test-model
asana:
  portfolio_gid: "7"
  team_gid: "8"
  retry:
    max_attempts: 3
    initial_backoff_ms: 1
    max_backoff_ms: 5
"#,
    )
    .unwrap()
}

pub fn assistant(llm: &MockLLM, asana: Arc<InMemoryAsana>) -> taskpulse_core::Assistant {
    AssistantFactory::create_with_components(&config(), Arc::new(llm.clone()), asana).unwrap()
}

pub fn call(id: &str, name: &str, arguments: serde_json::Value) -> LLMResponse {
    LLMResponse::with_tool_calls(None, vec![ToolCall::new(id, name, arguments)])
}
