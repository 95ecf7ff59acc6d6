//! Human-in-the-loop fallback: the token is pasted at the terminal.

use std::time::Duration;

use async_trait::async_trait;
use colored::*;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;

use super::{CaptchaChallenge, CaptchaSolver, SolverError};

pub struct InteractiveSolver {
    input: Mutex<Box<dyn AsyncBufRead + Unpin + Send>>,
    timeout: Duration,
}

impl InteractiveSolver {
    /// Read answers from the process stdin
    pub fn stdin(timeout: Duration) -> Self {
        Self::from_reader(BufReader::new(tokio::io::stdin()), timeout)
    }

    pub fn from_reader(reader: impl AsyncBufRead + Unpin + Send + 'static, timeout: Duration) -> Self {
        Self {
            input: Mutex::new(Box::new(reader)),
            timeout,
        }
    }
}

#[async_trait]
impl CaptchaSolver for InteractiveSolver {
    fn name(&self) -> &str {
        "interactive"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn solve(&self, challenge: &CaptchaChallenge) -> Result<String, SolverError> {
        println!("{}", "Captcha needs a human".yellow().bold());
        println!("  Page:     {}", challenge.page_url.cyan());
        println!("  Site key: {}", challenge.site_key.cyan());
        println!("Solve it in a browser and paste the g-recaptcha-response token:");

        let mut line = String::new();
        let mut input = self.input.lock().await;
        let read = input
            .read_line(&mut line)
            .await
            .map_err(|e| SolverError::Unsolvable(format!("reading token: {}", e)))?;
        if read == 0 {
            return Err(SolverError::Unsolvable("input closed".to_string()));
        }
        let token = line.trim();
        if token.is_empty() {
            return Err(SolverError::Unsolvable("empty token".to_string()));
        }
        Ok(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge() -> CaptchaChallenge {
        CaptchaChallenge::recaptcha_v2("6LcKey", "https://portal.test/eset/login")
    }

    #[tokio::test]
    async fn test_reads_token_line() {
        let solver = InteractiveSolver::from_reader(&b"  pasted-token \n"[..], Duration::from_secs(1));
        assert_eq!(solver.solve(&challenge()).await.unwrap(), "pasted-token");
    }

    #[tokio::test]
    async fn test_closed_input_is_unsolvable() {
        let solver = InteractiveSolver::from_reader(&b""[..], Duration::from_secs(1));
        assert!(matches!(solver.solve(&challenge()).await, Err(SolverError::Unsolvable(_))));
    }

    #[tokio::test]
    async fn test_blank_line_is_unsolvable() {
        let solver = InteractiveSolver::from_reader(&b"\n"[..], Duration::from_secs(1));
        assert!(matches!(solver.solve(&challenge()).await, Err(SolverError::Unsolvable(_))));
    }
}
