use async_trait::async_trait;
use colored::*;

use super::{Notifier, NotifyError};

/// Prints the message on the console
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        log::info!("MSG: {} {}", title, message);
        println!("{} {} {}", "MSG:".cyan(), title.bold(), message);
        Ok(())
    }
}
