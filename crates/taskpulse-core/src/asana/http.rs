use super::{AsanaApi, Project, Task, User};
use crate::config::AsanaConfig;
use crate::errors::{AsanaError, AssistantError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

const PROJECT_FIELDS: &str = "name,owner.name,start_on,due_on,created_at,archived,notes,permalink_url";
const TASK_FIELDS: &str = "name,assignee.name,completed,completed_at,created_at,due_on,notes,permalink_url";
const USER_FIELDS: &str = "name,email";
const PAGE_SIZE: u32 = 100;

#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct PageEnvelope<T> {
    data: Vec<T>,
    #[serde(default)]
    next_page: Option<NextPage>,
}

#[derive(Deserialize)]
struct NextPage {
    offset: String,
}

/// Read-only Asana REST client.
#[derive(Debug, Clone)]
pub struct AsanaHttpClient {
    client: Client,
    base_url: String,
    access_token: String,
    timeout: Duration,
}

impl AsanaHttpClient {
    pub fn new(access_token: String) -> Self {
        Self {
            client: Client::new(),
            base_url: "https://app.asana.com/api/1.0".to_string(),
            access_token,
            timeout: Duration::from_secs(20),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_config(config: &AsanaConfig) -> Result<Self, AssistantError> {
        let token = config.auth.access_token.clone().ok_or_else(|| {
            AssistantError::ConfigError(
                "No Asana access token provided. Set access_token or access_token_env".to_string(),
            )
        })?;
        Ok(Self::new(token)
            .with_base_url(config.base_url.clone())
            .with_timeout(Duration::from_secs(config.timeout_secs)))
    }

    async fn send(&self, path: &str, query: &[(&str, String)]) -> Result<reqwest::Response, AsanaError> {
        let url = format!("{}{}", self.base_url, path);
        log::debug!("Asana GET {} {:?}", url, query);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(query)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response.text().await.unwrap_or_default();
        log::warn!("Asana request {} failed with status {}: {}", path, status, body);

        Err(match status {
            StatusCode::NOT_FOUND => AsanaError::NotFound(format!("Asana resource {}", path)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                AsanaError::Unauthorized(format!("status {}", status))
            }
            StatusCode::TOO_MANY_REQUESTS => AsanaError::RateLimited { retry_after },
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => AsanaError::Timeout,
            s if s.is_server_error() => AsanaError::Transport(format!("status {}", s)),
            s => AsanaError::InvalidResponse(format!("status {}: {}", s, body)),
        })
    }

    async fn get_one<T: DeserializeOwned>(&self, path: &str, opt_fields: &str) -> Result<T, AsanaError> {
        let response = self
            .send(path, &[("opt_fields", opt_fields.to_string())])
            .await?;
        let envelope: DataEnvelope<T> = response.json().await?;
        Ok(envelope.data)
    }

    async fn get_all<T: DeserializeOwned>(&self, path: &str, opt_fields: &str) -> Result<Vec<T>, AsanaError> {
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let mut query = vec![
                ("opt_fields", opt_fields.to_string()),
                ("limit", PAGE_SIZE.to_string()),
            ];
            if let Some(offset) = &offset {
                query.push(("offset", offset.clone()));
            }

            let page: PageEnvelope<T> = self.send(path, &query).await?.json().await?;
            records.extend(page.data);

            match page.next_page {
                Some(next) => offset = Some(next.offset),
                None => break,
            }
        }

        Ok(records)
    }
}

#[async_trait]
impl AsanaApi for AsanaHttpClient {
    async fn portfolio_projects(&self, portfolio_gid: &str) -> Result<Vec<Project>, AsanaError> {
        self.get_all(&format!("/portfolios/{}/items", portfolio_gid), PROJECT_FIELDS)
            .await
    }

    async fn project(&self, project_gid: &str) -> Result<Project, AsanaError> {
        self.get_one(&format!("/projects/{}", project_gid), PROJECT_FIELDS)
            .await
    }

    async fn project_tasks(&self, project_gid: &str) -> Result<Vec<Task>, AsanaError> {
        self.get_all(&format!("/projects/{}/tasks", project_gid), TASK_FIELDS)
            .await
    }

    async fn task(&self, task_gid: &str) -> Result<Task, AsanaError> {
        self.get_one(&format!("/tasks/{}", task_gid), TASK_FIELDS).await
    }

    async fn subtasks(&self, task_gid: &str) -> Result<Vec<Task>, AsanaError> {
        self.get_all(&format!("/tasks/{}/subtasks", task_gid), TASK_FIELDS)
            .await
    }

    async fn team_users(&self, team_gid: &str) -> Result<Vec<User>, AsanaError> {
        self.get_all(&format!("/teams/{}/users", team_gid), USER_FIELDS)
            .await
    }

    async fn user(&self, user_gid: &str) -> Result<User, AsanaError> {
        self.get_one(&format!("/users/{}", user_gid), USER_FIELDS).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query};
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use tokio::net::TcpListener;

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == "Bearer test-token")
    }

    async fn project(Path(gid): Path<String>, headers: HeaderMap) -> axum::response::Response {
        if !authorized(&headers) {
            return AxumStatus::UNAUTHORIZED.into_response();
        }
        match gid.as_str() {
            "1" => Json(json!({"data": {"gid": "1", "name": "Apollo", "owner": {"gid": "7", "name": "Alice"}}}))
                .into_response(),
            "429" => (AxumStatus::TOO_MANY_REQUESTS, [("retry-after", "2")], "slow down").into_response(),
            "503" => AxumStatus::SERVICE_UNAVAILABLE.into_response(),
            _ => AxumStatus::NOT_FOUND.into_response(),
        }
    }

    async fn team_users(
        Path(_gid): Path<String>,
        Query(query): Query<HashMap<String, String>>,
    ) -> Json<serde_json::Value> {
        match query.get("offset").map(String::as_str) {
            None => Json(json!({
                "data": [{"gid": "7", "name": "Alice"}],
                "next_page": {"offset": "page2", "path": "/teams/1/users?offset=page2"}
            })),
            Some(_) => Json(json!({
                "data": [{"gid": "8", "name": "Bob", "email": "bob@example.com"}],
                "next_page": null
            })),
        }
    }

    async fn start_server() -> String {
        let app = Router::new()
            .route("/projects/{gid}", get(project))
            .route("/teams/{gid}/users", get(team_users));
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_fetches_record_from_data_envelope() {
        let base = start_server().await;
        let client = AsanaHttpClient::new("test-token".to_string()).with_base_url(base);

        let project = client.project("1").await.expect("project");
        assert_eq!(project.name, "Apollo");
        assert_eq!(project.owner.and_then(|o| o.name).as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn test_status_codes_map_to_typed_errors() {
        let base = start_server().await;
        let client = AsanaHttpClient::new("test-token".to_string()).with_base_url(base.clone());

        assert!(matches!(client.project("2").await, Err(AsanaError::NotFound(_))));
        assert_eq!(
            client.project("429").await,
            Err(AsanaError::RateLimited {
                retry_after: Some(Duration::from_secs(2))
            })
        );
        assert!(matches!(client.project("503").await, Err(AsanaError::Transport(_))));

        let unauthorized = AsanaHttpClient::new("wrong".to_string()).with_base_url(base);
        assert!(matches!(
            unauthorized.project("1").await,
            Err(AsanaError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_follows_pagination() {
        let base = start_server().await;
        let client = AsanaHttpClient::new("test-token".to_string()).with_base_url(base);

        let users = client.team_users("1").await.expect("users");
        let names: Vec<_> = users.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
    }

    #[test]
    fn test_from_config_requires_token() {
        let config = AsanaConfig::default();
        assert!(AsanaHttpClient::from_config(&config).is_err());
    }
}
