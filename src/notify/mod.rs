//! End-of-run notifications.
//!
//! A notifier never fails the run: delivery problems are logged and
//! swallowed by `Notifier::notify`.

mod console;
mod pushover;
mod signal;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{NotifyConfig, NotifyService};

pub use console::LogNotifier;
pub use pushover::{PUSHOVER_ENDPOINT, PushoverNotifier};
pub use signal::SignalNotifier;

/// Why a notification could not be delivered
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("missing setting: {0}")]
    Unconfigured(&'static str),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service answered with status {0}")]
    Rejected(u16),

    #[error("command failed: {0}")]
    Command(String),

    #[error("timed out")]
    Timeout,
}

/// Delivery channel for the run summary
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Name for logs
    fn name(&self) -> &str;

    /// Deliver one message
    async fn send(&self, title: &str, message: &str) -> Result<(), NotifyError>;

    /// Deliver, logging instead of returning failures
    async fn notify(&self, title: &str, message: &str) {
        match self.send(title, message).await {
            Ok(()) => log::info!("Notification sent via {}", self.name()),
            Err(e) => log::error!("Notification via {} failed: {}", self.name(), e),
        }
    }
}

/// Puts a fixed prefix in front of every message
pub struct PrefixedNotifier {
    prefix: String,
    inner: Box<dyn Notifier>,
}

impl PrefixedNotifier {
    pub fn new(prefix: impl Into<String>, inner: Box<dyn Notifier>) -> Self {
        Self {
            prefix: prefix.into(),
            inner,
        }
    }
}

#[async_trait]
impl Notifier for PrefixedNotifier {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn send(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        self.inner.send(title, &format!("{}{}", self.prefix, message)).await
    }
}

/// Notifier for the configured service, wrapped with the message prefix
pub fn from_config(config: &NotifyConfig) -> Box<dyn Notifier> {
    let inner: Box<dyn Notifier> = match config.service {
        NotifyService::Log => Box::new(LogNotifier),
        NotifyService::Pushover => Box::new(PushoverNotifier::new(&config.pushover_token, &config.pushover_user)),
        NotifyService::Signal => Box::new(SignalNotifier::new(&config.signal_user, &config.signal_recipient)),
    };
    if config.message_prefix.is_empty() {
        inner
    } else {
        Box::new(PrefixedNotifier::new(config.message_prefix.clone(), inner))
    }
}

/// Keeps every message, for tests
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct RecordingNotifier {
    sent: std::sync::Arc<std::sync::Mutex<Vec<(String, String)>>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub(crate) fn messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push((title.to_string(), message.to_string()));
        Ok(())
    }
}
