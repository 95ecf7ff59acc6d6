//! Pushover push notifications.

use std::time::Duration;

use async_trait::async_trait;

use super::{Notifier, NotifyError};

pub const PUSHOVER_ENDPOINT: &str = "https://api.pushover.net/1/messages.json";

pub struct PushoverNotifier {
    client: reqwest::Client,
    endpoint: String,
    token: String,
    user: String,
}

impl PushoverNotifier {
    pub fn new(token: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            endpoint: PUSHOVER_ENDPOINT.to_string(),
            token: token.into(),
            user: user.into(),
        }
    }

    /// Point at another API root
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Notifier for PushoverNotifier {
    fn name(&self) -> &str {
        "pushover"
    }

    async fn send(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        if self.token.is_empty() {
            return Err(NotifyError::Unconfigured("pushover_token"));
        }
        if self.user.is_empty() {
            return Err(NotifyError::Unconfigured("pushover_user"));
        }

        let form = [
            ("token", self.token.as_str()),
            ("user", self.user.as_str()),
            ("title", title),
            ("message", message),
            ("html", "1"),
        ];
        let response = self.client.post(&self.endpoint).form(&form).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(NotifyError::Rejected(response.status().as_u16()))
        }
    }
}
