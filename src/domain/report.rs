//! Per-obligation results and the run report.

use super::Obligation;

/// Outcome of one handler invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerResult {
    pub succeeded: bool,
    pub message: String,
}

impl HandlerResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            message: message.into(),
        }
    }
}

/// One dispatched obligation and what came of it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub obligation: Obligation,
    pub result: HandlerResult,
    /// Error category when the failure came from an error rather than the handler's verdict
    pub category: Option<String>,
}

/// Category of an obligation no handler is registered for
pub const UNREGISTERED_CATEGORY: &str = "unregistered-obligation";

/// Failure that stopped the run before or during detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFailure {
    pub category: String,
    pub message: String,
}

/// Aggregate outcome of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub authenticated: bool,
    pub entries: Vec<ReportEntry>,
    pub fatal: Option<RunFailure>,
}

impl RunReport {
    /// Record an obligation's result
    pub fn record(&mut self, obligation: Obligation, result: HandlerResult, category: Option<String>) {
        self.entries.push(ReportEntry {
            obligation,
            result,
            category,
        });
    }

    /// Mark the run as failed before completion
    pub fn abort(&mut self, category: impl Into<String>, message: impl Into<String>) {
        self.fatal = Some(RunFailure {
            category: category.into(),
            message: message.into(),
        });
    }

    /// Authenticated, nothing fatal, and every obligation succeeded
    pub fn is_success(&self) -> bool {
        self.authenticated && self.fatal.is_none() && self.entries.iter().all(|e| e.result.succeeded)
    }

    pub fn failed_entries(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| !e.result.succeeded)
    }

    /// Failure category for the exit line, `None` on success
    pub fn category(&self) -> Option<&str> {
        if let Some(fatal) = &self.fatal {
            return Some(&fatal.category);
        }
        if !self.authenticated {
            return Some("auth");
        }
        self.failed_entries()
            .next()
            .map(|e| e.category.as_deref().unwrap_or("handler"))
    }

    /// Notification title and body
    pub fn summary(&self) -> (String, String) {
        let unregistered = self
            .entries
            .iter()
            .any(|e| e.category.as_deref() == Some(UNREGISTERED_CATEGORY));
        let title = if self.is_success() {
            "Success!"
        } else if unregistered {
            "Error: no handler registered"
        } else {
            "Error"
        };

        let mut lines = Vec::new();
        if let Some(fatal) = &self.fatal {
            lines.push(format!("Run failed ({}): {}", fatal.category, fatal.message));
        }
        for entry in &self.entries {
            let mark = if entry.result.succeeded { "✓" } else { "✗" };
            lines.push(format!("{} {}: {}", mark, entry.obligation, entry.result.message));
        }
        if lines.is_empty() {
            lines.push("No pending actions".to_string());
        }
        (title.to_string(), lines.join("\n"))
    }
}
