//! Capsolver task API (paid; needs a client key).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{CaptchaChallenge, CaptchaSolver, SolverError};

/// API root
pub const CAPSOLVER_ENDPOINT: &str = "https://api.capsolver.com";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskReply {
    #[serde(default)]
    error_id: i64,
    error_code: Option<String>,
    error_description: Option<String>,
    task_id: Option<String>,
    status: Option<String>,
    solution: Option<Value>,
}

impl TaskReply {
    fn failure(&self) -> Option<SolverError> {
        if self.error_id == 0 {
            return None;
        }
        let code = self.error_code.as_deref().unwrap_or("UNKNOWN");
        let detail = format!("{}: {}", code, self.error_description.as_deref().unwrap_or(""));
        Some(match code {
            "ERROR_KEY_DENIED_ACCESS" | "ERROR_INVALID_TASK_DATA" => SolverError::InvalidKey(detail),
            "ERROR_ZERO_BALANCE" => SolverError::Quota(detail),
            _ => SolverError::Unsolvable(detail),
        })
    }
}

pub struct CapsolverSolver {
    client: Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
    poll_interval: Duration,
}

impl CapsolverSolver {
    pub fn new(api_key: impl Into<String>, timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            client: Client::new(),
            endpoint: CAPSOLVER_ENDPOINT.to_string(),
            api_key: api_key.into(),
            timeout,
            poll_interval,
        }
    }

    /// Point at another API root (tests)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    async fn call(&self, method: &str, body: &Value) -> Result<TaskReply, SolverError> {
        let url = format!("{}/{}", self.endpoint, method);
        Ok(self.client.post(url).json(body).send().await?.json().await?)
    }
}

#[async_trait]
impl CaptchaSolver for CapsolverSolver {
    fn name(&self) -> &str {
        "capsolver"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn solve(&self, challenge: &CaptchaChallenge) -> Result<String, SolverError> {
        let created = self
            .call(
                "createTask",
                &json!({
                    "clientKey": self.api_key,
                    "task": {
                        "type": "ReCaptchaV2TaskProxyless",
                        "websiteURL": challenge.page_url,
                        "websiteKey": challenge.site_key,
                    }
                }),
            )
            .await?;
        if let Some(err) = created.failure() {
            return Err(err);
        }
        let task_id = created
            .task_id
            .ok_or_else(|| SolverError::Unsolvable("no task id returned".to_string()))?;
        log::info!("Capsolver task {} created", task_id);

        loop {
            tokio::time::sleep(self.poll_interval).await;
            let reply = self
                .call("getTaskResult", &json!({"clientKey": self.api_key, "taskId": task_id}))
                .await?;
            if let Some(err) = reply.failure() {
                return Err(err);
            }
            match reply.status.as_deref() {
                Some("ready") => {
                    return reply
                        .solution
                        .as_ref()
                        .and_then(|s| s.get("gRecaptchaResponse"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .ok_or_else(|| SolverError::Unsolvable("ready without a token".to_string()));
                }
                Some("failed") => return Err(SolverError::Unsolvable(format!("task {} failed", task_id))),
                other => log::debug!("Capsolver task {} status {:?}", task_id, other),
            }
        }
    }
}
