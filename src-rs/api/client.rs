use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::result::{DashError, DashResult};
use crate::task::{Task, TaskStats, TaskStatus};
use crate::tools::Tool;

/// Thin client over the backend's dashboard API. Every call is async and
/// therefore a suspension point; callers are responsible for deciding
/// whether a response still applies when it finally arrives.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("reqwest client"),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn check_health(&self) -> DashResult<bool> {
        let resp = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Ok(resp.status().is_success())
    }

    pub async fn list_tasks(
        &self,
        status: Option<TaskStatus>,
        limit: usize,
    ) -> DashResult<Vec<Task>> {
        let mut path = format!("/tasks?limit={}", limit);
        if let Some(status) = status {
            path.push_str(&format!("&status={}", status));
        }
        let body = self.request(Method::GET, &path, None).await?;
        Ok(collect_items(&body, "tasks"))
    }

    pub async fn task_stats(&self) -> DashResult<TaskStats> {
        let body = self.request(Method::GET, "/tasks/stats", None).await?;
        let stats = body.get("stats").cloned().unwrap_or(Value::Null);
        Ok(serde_json::from_value(stats)?)
    }

    pub async fn get_task(&self, task_id: &str) -> DashResult<Task> {
        let body = self
            .request(Method::GET, &format!("/tasks/{}", task_id), None)
            .await?;
        let task = body.get("task").cloned().unwrap_or(Value::Null);
        Ok(serde_json::from_value(task)?)
    }

    pub async fn cancel_task(&self, task_id: &str) -> DashResult<()> {
        self.request(Method::POST, &format!("/tasks/{}/cancel", task_id), None)
            .await?;
        Ok(())
    }

    pub async fn delete_task(&self, task_id: &str) -> DashResult<()> {
        self.request(Method::DELETE, &format!("/tasks/{}/delete", task_id), None)
            .await?;
        Ok(())
    }

    pub async fn list_tools(&self) -> DashResult<Vec<Tool>> {
        let body = self.request(Method::GET, "/tools", None).await?;
        Ok(collect_items(&body, "tools"))
    }

    /// Applies a batch of `"enable:<name>"` / `"disable:<name>"` tags in one
    /// request. The backend treats the batch as all-or-nothing from the
    /// client's point of view.
    pub async fn save_and_reload_tools(&self, changes: &[String]) -> DashResult<()> {
        self.request(
            Method::POST,
            "/tools/save-and-reload",
            Some(json!({ "changes": changes })),
        )
        .await?;
        Ok(())
    }

    pub async fn get_config(&self) -> DashResult<Value> {
        self.request(Method::GET, "/config", None).await
    }

    /// The document is round-tripped verbatim except for the caller's edits;
    /// no schema is validated client-side.
    pub async fn put_config(&self, config: &Value) -> DashResult<()> {
        self.request(Method::PUT, "/config", Some(config.clone()))
            .await?;
        Ok(())
    }

    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> DashResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(token) = &self.token {
            req = req.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(body) = &body {
            req = req.json(body);
        }
        let resp = req.send().await?;
        decode_envelope(resp).await
    }
}

async fn decode_envelope(resp: Response) -> DashResult<Value> {
    let status = resp.status();
    let text = resp.text().await?;
    let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);

    if status == StatusCode::NOT_FOUND {
        let message = extract_message(&body).unwrap_or_else(|| "not found".to_string());
        return Err(DashError::NotFound(message));
    }
    if !status.is_success() {
        let message = extract_message(&body).unwrap_or_else(|| status.to_string());
        return Err(DashError::Http {
            status: status.as_u16(),
            message,
        });
    }
    if body.get("status").and_then(Value::as_str) == Some("error") {
        let message = extract_message(&body).unwrap_or_else(|| "unknown error".to_string());
        return Err(DashError::Api(message));
    }
    Ok(body)
}

/// The backend's error envelope is not uniform: some routes report under
/// `error`, others under `detail`. Both must be checked.
fn extract_message(body: &Value) -> Option<String> {
    for key in ["error", "detail", "message"] {
        if let Some(message) = body.get(key).and_then(Value::as_str) {
            if !message.is_empty() {
                return Some(message.to_string());
            }
        }
    }
    None
}

fn collect_items<T: DeserializeOwned>(body: &Value, key: &str) -> Vec<T> {
    let items = body
        .get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let mut out = Vec::new();
    for item in items {
        if let Ok(value) = serde_json::from_value(item) {
            out.push(value);
        }
    }
    out
}
