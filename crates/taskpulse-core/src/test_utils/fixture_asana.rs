use crate::asana::{AsanaApi, AsanaScope, Project, Task, User, UserRef};
use crate::errors::AsanaError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// A small portfolio frozen at 2024-03-10 noon UTC.
///
/// Portfolio "100" holds Apollo ("1", owner Alice) and Borealis ("2", owner
/// Bob). Team "300" is Alice ("7"), Bob ("8") and Carol ("9"). Task "11" is
/// shared by both projects. Calls can be made to fail or stall per method,
/// and every call is counted.
pub struct FixtureAsana {
    portfolios: HashMap<String, Vec<Project>>,
    project_tasks: HashMap<String, Vec<Task>>,
    subtasks: HashMap<String, Vec<Task>>,
    teams: HashMap<String, Vec<User>>,
    failures: Mutex<HashMap<&'static str, VecDeque<AsanaError>>>,
    stalls: Mutex<HashMap<&'static str, u32>>,
    calls: Mutex<HashMap<&'static str, u32>>,
}

fn date(value: &str) -> NaiveDate {
    value.parse().expect("fixture date")
}

fn at(day: &str) -> DateTime<Utc> {
    format!("{}T09:00:00Z", day).parse().expect("fixture timestamp")
}

fn person(gid: &str, name: &str) -> UserRef {
    UserRef {
        gid: gid.to_string(),
        name: Some(name.to_string()),
    }
}

fn task(
    gid: &str,
    name: &str,
    assignee: Option<UserRef>,
    completed_on: Option<&str>,
    due_on: Option<&str>,
    created_on: &str,
) -> Task {
    Task {
        gid: gid.to_string(),
        name: name.to_string(),
        assignee,
        completed: completed_on.is_some(),
        completed_at: completed_on.map(at),
        created_at: Some(at(created_on)),
        due_on: due_on.map(date),
        notes: None,
        permalink_url: None,
    }
}

impl FixtureAsana {
    pub fn now() -> DateTime<Utc> {
        "2024-03-10T12:00:00Z".parse().expect("fixture clock")
    }

    pub fn scope() -> AsanaScope {
        AsanaScope {
            portfolio_gid: Some("100".to_string()),
            team_gid: Some("300".to_string()),
            workspace_gid: None,
        }
    }

    pub fn sample() -> Self {
        let alice = person("7", "Alice");
        let bob = person("8", "Bob");
        let carol = person("9", "Carol");

        let project = |gid: &str, name: &str, owner: &UserRef| Project {
            gid: gid.to_string(),
            name: name.to_string(),
            owner: Some(owner.clone()),
            start_on: Some(date("2024-02-01")),
            due_on: Some(date("2024-04-30")),
            created_at: Some(at("2024-01-15")),
            archived: false,
            notes: None,
            permalink_url: Some(format!("https://app.asana.com/0/{}", gid)),
        };

        let launch_plan = task(
            "11",
            "Draft launch plan",
            Some(alice.clone()),
            None,
            Some("2024-03-01"),
            "2024-02-20",
        );
        let apollo_tasks = vec![
            launch_plan.clone(),
            task("12", "Review budget", Some(bob.clone()), None, Some("2024-03-05"), "2024-03-01"),
            task("13", "Book venue", Some(alice.clone()), None, Some("2024-03-08"), "2024-03-02"),
            task(
                "14",
                "Design mockups",
                Some(carol.clone()),
                Some("2024-03-09"),
                Some("2024-03-04"),
                "2024-03-03",
            ),
            task("15", "Write press release", None, None, Some("2024-03-20"), "2024-03-05"),
        ];

        let mut update_docs = task("22", "Update docs", Some(carol.clone()), None, None, "2024-03-07");
        update_docs.notes = Some("Follow the launch checklist".to_string());
        let borealis_tasks = vec![
            task(
                "21",
                "Migrate database",
                Some(bob.clone()),
                Some("2024-03-08"),
                Some("2024-03-08"),
                "2024-03-06",
            ),
            update_docs,
            launch_plan,
        ];

        let team = vec![
            User {
                gid: "7".to_string(),
                name: "Alice".to_string(),
                email: Some("alice@example.com".to_string()),
            },
            User {
                gid: "8".to_string(),
                name: "Bob".to_string(),
                email: Some("bob@example.com".to_string()),
            },
            User {
                gid: "9".to_string(),
                name: "Carol".to_string(),
                email: None,
            },
        ];

        Self {
            portfolios: HashMap::from([(
                "100".to_string(),
                vec![project("1", "Apollo", &alice), project("2", "Borealis", &bob)],
            )]),
            project_tasks: HashMap::from([
                ("1".to_string(), apollo_tasks),
                ("2".to_string(), borealis_tasks),
            ]),
            subtasks: HashMap::from([(
                "11".to_string(),
                vec![task("111", "Outline sections", Some(alice), None, None, "2024-02-21")],
            )]),
            teams: HashMap::from([("300".to_string(), team)]),
            failures: Mutex::new(HashMap::new()),
            stalls: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Queues errors returned by the next calls to `method`, one per call.
    pub fn fail_next(&self, method: &'static str, errors: Vec<AsanaError>) {
        self.failures
            .lock()
            .unwrap()
            .entry(method)
            .or_default()
            .extend(errors);
    }

    /// Makes the next `count` calls to `method` hang until cancelled.
    pub fn stall_next(&self, method: &'static str, count: u32) {
        *self.stalls.lock().unwrap().entry(method).or_default() += count;
    }

    pub fn calls(&self, method: &str) -> u32 {
        self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
    }

    async fn enter(&self, method: &'static str) -> Result<(), AsanaError> {
        *self.calls.lock().unwrap().entry(method).or_default() += 1;

        let stall = {
            let mut stalls = self.stalls.lock().unwrap();
            match stalls.get_mut(method) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            }
        };
        if stall {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        let failure = self
            .failures
            .lock()
            .unwrap()
            .get_mut(method)
            .and_then(VecDeque::pop_front);
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn all_tasks(&self) -> impl Iterator<Item = &Task> {
        self.project_tasks
            .values()
            .flatten()
            .chain(self.subtasks.values().flatten())
    }
}

#[async_trait]
impl AsanaApi for FixtureAsana {
    async fn portfolio_projects(&self, portfolio_gid: &str) -> Result<Vec<Project>, AsanaError> {
        self.enter("portfolio_projects").await?;
        self.portfolios
            .get(portfolio_gid)
            .cloned()
            .ok_or_else(|| AsanaError::NotFound(format!("Portfolio {}", portfolio_gid)))
    }

    async fn project(&self, project_gid: &str) -> Result<Project, AsanaError> {
        self.enter("project").await?;
        self.portfolios
            .values()
            .flatten()
            .find(|p| p.gid == project_gid)
            .cloned()
            .ok_or_else(|| AsanaError::NotFound(format!("Project {}", project_gid)))
    }

    async fn project_tasks(&self, project_gid: &str) -> Result<Vec<Task>, AsanaError> {
        self.enter("project_tasks").await?;
        self.project_tasks
            .get(project_gid)
            .cloned()
            .ok_or_else(|| AsanaError::NotFound(format!("Project {}", project_gid)))
    }

    async fn task(&self, task_gid: &str) -> Result<Task, AsanaError> {
        self.enter("task").await?;
        self.all_tasks()
            .find(|t| t.gid == task_gid)
            .cloned()
            .ok_or_else(|| AsanaError::NotFound(format!("Task {}", task_gid)))
    }

    async fn subtasks(&self, task_gid: &str) -> Result<Vec<Task>, AsanaError> {
        self.enter("subtasks").await?;
        if let Some(subtasks) = self.subtasks.get(task_gid) {
            return Ok(subtasks.clone());
        }
        if self.all_tasks().any(|t| t.gid == task_gid) {
            Ok(Vec::new())
        } else {
            Err(AsanaError::NotFound(format!("Task {}", task_gid)))
        }
    }

    async fn team_users(&self, team_gid: &str) -> Result<Vec<User>, AsanaError> {
        self.enter("team_users").await?;
        self.teams
            .get(team_gid)
            .cloned()
            .ok_or_else(|| AsanaError::NotFound(format!("Team {}", team_gid)))
    }

    async fn user(&self, user_gid: &str) -> Result<User, AsanaError> {
        self.enter("user").await?;
        self.teams
            .values()
            .flatten()
            .find(|u| u.gid == user_gid)
            .cloned()
            .ok_or_else(|| AsanaError::NotFound(format!("User {}", user_gid)))
    }
}
