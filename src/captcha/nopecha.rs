//! NopeCHA token API (free tier works without a key).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{CaptchaChallenge, CaptchaSolver, SolverError};

/// Token endpoint
pub const NOPECHA_ENDPOINT: &str = "https://api.nopecha.com/token/";

/// Error code meaning the job is still being worked on
const NOT_READY: i64 = 14;

#[derive(Debug, Deserialize)]
struct NopechaReply {
    data: Option<String>,
    error: Option<i64>,
    message: Option<String>,
}

pub struct NopechaSolver {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
    poll_interval: Duration,
}

impl NopechaSolver {
    pub fn new(api_key: Option<String>, timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            client: Client::new(),
            endpoint: NOPECHA_ENDPOINT.to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            timeout,
            poll_interval,
        }
    }

    /// Point at another endpoint (tests)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn submit(&self, challenge: &CaptchaChallenge) -> Result<String, SolverError> {
        let mut body = json!({
            "type": "recaptcha2",
            "sitekey": challenge.site_key,
            "url": challenge.page_url,
        });
        if let Some(key) = &self.api_key {
            body["key"] = json!(key);
        }
        let reply: NopechaReply = self.client.post(&self.endpoint).json(&body).send().await?.json().await?;
        match (reply.data, reply.error) {
            (Some(job), None) => Ok(job),
            (_, Some(code)) => Err(classify(code, reply.message.as_deref().unwrap_or(""))),
            (None, None) => Err(SolverError::Unsolvable("empty reply to job submission".to_string())),
        }
    }

    async fn poll(&self, job: &str) -> Result<String, SolverError> {
        let key = self.api_key.as_deref().unwrap_or("");
        loop {
            tokio::time::sleep(self.poll_interval).await;
            let reply: NopechaReply = self
                .client
                .get(&self.endpoint)
                .query(&[("id", job), ("key", key)])
                .send()
                .await?
                .json()
                .await?;
            match (reply.data, reply.error) {
                (Some(token), None) => return Ok(token),
                (_, Some(NOT_READY)) => log::debug!("NopeCHA job {} not ready yet", job),
                (_, Some(code)) => return Err(classify(code, reply.message.as_deref().unwrap_or(""))),
                (None, None) => return Err(SolverError::Unsolvable("empty reply to result poll".to_string())),
            }
        }
    }
}

fn classify(code: i64, message: &str) -> SolverError {
    let lower = message.to_lowercase();
    let detail = format!("error {}: {}", code, message);
    if lower.contains("credit") || lower.contains("limit") || lower.contains("quota") {
        SolverError::Quota(detail)
    } else if lower.contains("key") {
        SolverError::InvalidKey(detail)
    } else {
        SolverError::Unsolvable(detail)
    }
}

#[async_trait]
impl CaptchaSolver for NopechaSolver {
    fn name(&self) -> &str {
        "nopecha"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn solve(&self, challenge: &CaptchaChallenge) -> Result<String, SolverError> {
        let job = self.submit(challenge).await?;
        log::info!("NopeCHA job {} submitted", job);
        self.poll(&job).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn challenge() -> CaptchaChallenge {
        CaptchaChallenge::recaptcha_v2("6LcKey", "https://portal.test/eset/login")
    }

    fn solver(server: &MockServer, key: Option<&str>) -> NopechaSolver {
        NopechaSolver::new(key.map(str::to_string), Duration::from_secs(5), Duration::from_millis(5))
            .with_endpoint(format!("{}/token/", server.uri()))
    }

    #[tokio::test]
    async fn test_solve_polls_until_ready() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(json!({
                "type": "recaptcha2",
                "sitekey": "6LcKey",
                "url": "https://portal.test/eset/login",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": "job-1"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("id", "job-1"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({"error": 14, "message": "Incomplete job"})))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("id", "job-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": "solved-token"})))
            .mount(&server)
            .await;

        let token = solver(&server, None).solve(&challenge()).await.unwrap();
        assert_eq!(token, "solved-token");
    }

    #[tokio::test]
    async fn test_key_is_sent_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(json!({
                "type": "recaptcha2",
                "sitekey": "6LcKey",
                "url": "https://portal.test/eset/login",
                "key": "secret-key",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": "job-2"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("key", "secret-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": "tok"})))
            .mount(&server)
            .await;

        assert_eq!(solver(&server, Some("secret-key")).solve(&challenge()).await.unwrap(), "tok");
    }

    #[tokio::test]
    async fn test_quota_error_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(409).set_body_json(json!({"error": 16, "message": "Out of credit"})),
            )
            .mount(&server)
            .await;

        let err = solver(&server, None).solve(&challenge()).await.unwrap_err();
        assert!(matches!(err, SolverError::Quota(_)));
    }

    #[test]
    fn test_classify_messages() {
        assert!(matches!(classify(10, "Invalid key"), SolverError::InvalidKey(_)));
        assert!(matches!(classify(11, "Daily limit reached"), SolverError::Quota(_)));
        assert!(matches!(classify(12, "Unknown"), SolverError::Unsolvable(_)));
    }
}
