//! Signal messages through the `signal-cli` command.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::{Notifier, NotifyError};

const SIGNAL_CLI: &str = "signal-cli";
const SEND_TIMEOUT: Duration = Duration::from_secs(60);

pub struct SignalNotifier {
    program: String,
    sender: String,
    recipient: String,
}

impl SignalNotifier {
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self {
            program: SIGNAL_CLI.to_string(),
            sender: sender.into(),
            recipient: recipient.into(),
        }
    }

    /// Run another executable instead of `signal-cli`
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn args(&self, title: &str, message: &str) -> Vec<String> {
        vec![
            "-a".to_string(),
            self.sender.clone(),
            "send".to_string(),
            "-m".to_string(),
            format!("{}\n{}", title, message),
            self.recipient.clone(),
        ]
    }
}

#[async_trait]
impl Notifier for SignalNotifier {
    fn name(&self) -> &str {
        "signal"
    }

    async fn send(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        if self.sender.is_empty() {
            return Err(NotifyError::Unconfigured("signal_user"));
        }
        if self.recipient.is_empty() {
            return Err(NotifyError::Unconfigured("signal_recipient"));
        }

        let output = tokio::time::timeout(
            SEND_TIMEOUT,
            Command::new(&self.program).args(self.args(title, message)).output(),
        )
        .await
        .map_err(|_| NotifyError::Timeout)?
        .map_err(|e| NotifyError::Command(format!("{}: {}", self.program, e)))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(NotifyError::Command(String::from_utf8_lossy(&output.stderr).trim().to_string()))
        }
    }
}
