//! Captcha resolution
//!
//! A challenge scraped from the login page is handed to a
//! [`CaptchaResolver`], which tries its backends strictly in order:
//! the free automated service, the paid one (only with a key), and a human
//! at the terminal (only when enabled). Each backend gets its own timeout.

mod capsolver;
mod manual;
mod nopecha;
mod resolver;
mod scrape;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use capsolver::{CAPSOLVER_ENDPOINT, CapsolverSolver};
pub use manual::InteractiveSolver;
pub use nopecha::{NOPECHA_ENDPOINT, NopechaSolver};
pub use resolver::{CaptchaResolver, ResolverState};
pub use scrape::scrape_challenge;

/// Default time budget for one backend attempt
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(120);

/// Default delay between result polls of the automated services
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Kind of challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeKind {
    /// Checkbox/image puzzle, version 2
    RecaptchaV2,
}

impl fmt::Display for ChallengeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChallengeKind::RecaptchaV2 => write!(f, "recaptcha-v2"),
        }
    }
}

/// A challenge found on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptchaChallenge {
    pub kind: ChallengeKind,
    pub site_key: String,
    pub page_url: String,
}

impl CaptchaChallenge {
    pub fn recaptcha_v2(site_key: impl Into<String>, page_url: impl Into<String>) -> Self {
        Self {
            kind: ChallengeKind::RecaptchaV2,
            site_key: site_key.into(),
            page_url: page_url.into(),
        }
    }
}

/// Solved token for one challenge
///
/// Not `Clone`: a solution is consumed by the single login submission it
/// was obtained for.
#[derive(Debug, PartialEq, Eq)]
pub struct CaptchaSolution {
    token: String,
    site_key: String,
}

impl CaptchaSolution {
    pub(crate) fn new(challenge: &CaptchaChallenge, token: String) -> Self {
        Self {
            token,
            site_key: challenge.site_key.clone(),
        }
    }

    /// Site key of the challenge this solves
    pub fn site_key(&self) -> &str {
        &self.site_key
    }

    /// Consume the solution into the form value
    pub fn into_token(self) -> String {
        self.token
    }
}

/// Why a backend gave up
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolverError {
    #[error("quota exhausted: {0}")]
    Quota(String),

    #[error("invalid access key: {0}")]
    InvalidKey(String),

    #[error("no answer within {0:?}")]
    Timeout(Duration),

    #[error("no answer: {0}")]
    Unsolvable(String),

    #[error("service unreachable: {0}")]
    Transport(String),
}

/// A captcha-solving backend
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Time budget for one attempt
    fn timeout(&self) -> Duration;

    /// Produce a token for the challenge
    async fn solve(&self, challenge: &CaptchaChallenge) -> Result<String, SolverError>;
}

impl From<reqwest::Error> for SolverError {
    fn from(err: reqwest::Error) -> Self {
        SolverError::Transport(err.to_string())
    }
}
