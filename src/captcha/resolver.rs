//! Fallback chain over captcha backends.

use std::fmt;
use std::io::IsTerminal;
use std::time::Duration;

use crate::auth::AuthError;
use crate::config::CaptchaConfig;

use super::{CaptchaChallenge, CaptchaSolution, CaptchaSolver, CapsolverSolver, InteractiveSolver, NopechaSolver, SolverError};

/// Where the resolver is in its state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverState {
    Idle,
    /// A challenge was handed in
    Detected,
    /// Working on backend N (1-based, in priority order)
    Solving(usize),
    Solved,
    /// Every backend failed
    Exhausted,
}

impl fmt::Display for ResolverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolverState::Idle => write!(f, "idle"),
            ResolverState::Detected => write!(f, "detected"),
            ResolverState::Solving(n) => write!(f, "solving({})", n),
            ResolverState::Solved => write!(f, "solved"),
            ResolverState::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Ordered chain of captcha backends
pub struct CaptchaResolver {
    solvers: Vec<Box<dyn CaptchaSolver>>,
    state: ResolverState,
    history: Vec<ResolverState>,
}

impl CaptchaResolver {
    /// Create a resolver with no backends
    pub fn new() -> Self {
        Self {
            solvers: Vec::new(),
            state: ResolverState::Idle,
            history: vec![ResolverState::Idle],
        }
    }

    /// Append a backend at the lowest priority (builder pattern)
    pub fn with_solver(mut self, solver: impl CaptchaSolver + 'static) -> Self {
        self.solvers.push(Box::new(solver));
        self
    }

    /// Build the standard chain: free service, paid service (with a key),
    /// then the terminal (when enabled and attended)
    pub fn from_config(config: &CaptchaConfig) -> Self {
        let timeout = Duration::from_millis(config.backend_timeout_ms);
        let poll = Duration::from_millis(config.poll_interval_ms);

        let mut resolver = Self::new().with_solver(NopechaSolver::new(config.nopecha_api_key.clone(), timeout, poll));
        if let Some(key) = config.capsolver_api_key.as_deref().filter(|k| !k.is_empty()) {
            resolver = resolver.with_solver(CapsolverSolver::new(key, timeout, poll));
        }
        if config.interactive {
            if std::io::stdin().is_terminal() {
                resolver = resolver.with_solver(InteractiveSolver::stdin(timeout));
            } else {
                log::warn!("Interactive captcha requested but stdin is not a terminal; skipping");
            }
        }
        log::info!("Captcha backends: {}", resolver.backend_names().join(" -> "));
        resolver
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.solvers.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.solvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solvers.is_empty()
    }

    pub fn state(&self) -> ResolverState {
        self.state
    }

    /// Every state entered so far, oldest first
    pub fn history(&self) -> &[ResolverState] {
        &self.history
    }

    fn enter(&mut self, state: ResolverState) {
        log::debug!("Captcha resolver: {} -> {}", self.state, state);
        self.state = state;
        self.history.push(state);
    }

    /// Solve a freshly detected challenge
    ///
    /// Backends are tried once each, in order; a failed backend is never
    /// revisited within one call.
    pub async fn resolve(&mut self, challenge: &CaptchaChallenge) -> Result<CaptchaSolution, AuthError> {
        self.enter(ResolverState::Detected);
        log::info!("Captcha {} detected (site key {})", challenge.kind, challenge.site_key);

        for idx in 0..self.solvers.len() {
            self.enter(ResolverState::Solving(idx + 1));
            let solver = &self.solvers[idx];
            let budget = solver.timeout();
            let outcome = match tokio::time::timeout(budget, solver.solve(challenge)).await {
                Ok(Ok(token)) if token.trim().is_empty() => Err(SolverError::Unsolvable("empty token".to_string())),
                Ok(result) => result,
                Err(_) => Err(SolverError::Timeout(budget)),
            };
            match outcome {
                Ok(token) => {
                    log::info!("Captcha solved by {}", solver.name());
                    self.enter(ResolverState::Solved);
                    return Ok(CaptchaSolution::new(challenge, token));
                }
                Err(err) => log::warn!("Captcha backend {} failed: {}", solver.name(), err),
            }
        }

        self.enter(ResolverState::Exhausted);
        Err(AuthError::CaptchaExhausted)
    }
}

impl Default for CaptchaResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend with a canned outcome that counts its calls
    struct StubSolver {
        name: &'static str,
        outcome: Result<String, SolverError>,
        delay: Duration,
        timeout: Duration,
        calls: Arc<AtomicUsize>,
    }

    impl StubSolver {
        fn ok(name: &'static str, token: &str) -> Self {
            Self::with(name, Ok(token.to_string()))
        }

        fn failing(name: &'static str, err: SolverError) -> Self {
            Self::with(name, Err(err))
        }

        fn with(name: &'static str, outcome: Result<String, SolverError>) -> Self {
            Self {
                name,
                outcome,
                delay: Duration::ZERO,
                timeout: Duration::from_secs(1),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn hanging(name: &'static str) -> Self {
            let mut stub = Self::ok(name, "too-late");
            stub.delay = Duration::from_secs(5);
            stub.timeout = Duration::from_millis(20);
            stub
        }
    }

    #[async_trait]
    impl CaptchaSolver for StubSolver {
        fn name(&self) -> &str {
            self.name
        }

        fn timeout(&self) -> Duration {
            self.timeout
        }

        async fn solve(&self, _challenge: &CaptchaChallenge) -> Result<String, SolverError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.outcome.clone()
        }
    }

    fn challenge() -> CaptchaChallenge {
        CaptchaChallenge::recaptcha_v2("6LcKey", "https://portal.test/eset/login")
    }

    #[tokio::test]
    async fn test_fallback_order_reaches_interactive() {
        let quota = StubSolver::failing("free", SolverError::Quota("daily limit".into()));
        let quota_calls = quota.calls.clone();
        let slow = StubSolver::hanging("paid");
        let slow_calls = slow.calls.clone();
        let human = StubSolver::ok("interactive", "human-token");

        let mut resolver = CaptchaResolver::new().with_solver(quota).with_solver(slow).with_solver(human);
        let solution = resolver.resolve(&challenge()).await.unwrap();

        assert_eq!(solution.into_token(), "human-token");
        assert_eq!(
            resolver.history(),
            &[
                ResolverState::Idle,
                ResolverState::Detected,
                ResolverState::Solving(1),
                ResolverState::Solving(2),
                ResolverState::Solving(3),
                ResolverState::Solved,
            ]
        );
        assert_eq!(quota_calls.load(Ordering::SeqCst), 1);
        assert_eq!(slow_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_first_success_stops_chain() {
        let second = StubSolver::ok("paid", "unused");
        let second_calls = second.calls.clone();
        let mut resolver = CaptchaResolver::new()
            .with_solver(StubSolver::ok("free", "free-token"))
            .with_solver(second);

        assert_eq!(resolver.resolve(&challenge()).await.unwrap().into_token(), "free-token");
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
        assert_eq!(resolver.state(), ResolverState::Solved);
    }

    #[tokio::test]
    async fn test_all_failing_is_exhausted() {
        let mut resolver = CaptchaResolver::new()
            .with_solver(StubSolver::failing("free", SolverError::InvalidKey("bad".into())))
            .with_solver(StubSolver::ok("paid", "   "));

        let err = resolver.resolve(&challenge()).await.unwrap_err();
        assert!(matches!(err, AuthError::CaptchaExhausted));
        assert_eq!(resolver.state(), ResolverState::Exhausted);
        assert_eq!(
            &resolver.history()[1..],
            &[
                ResolverState::Detected,
                ResolverState::Solving(1),
                ResolverState::Solving(2),
                ResolverState::Exhausted,
            ]
        );
    }

    #[tokio::test]
    async fn test_no_backends_is_exhausted() {
        let mut resolver = CaptchaResolver::new();
        assert!(resolver.resolve(&challenge()).await.is_err());
        assert_eq!(resolver.state(), ResolverState::Exhausted);
    }

    #[tokio::test]
    async fn test_each_resolve_starts_fresh() {
        let mut resolver = CaptchaResolver::new().with_solver(StubSolver::ok("free", "tok"));
        resolver.resolve(&challenge()).await.unwrap();
        resolver.resolve(&challenge()).await.unwrap();
        let detected = resolver
            .history()
            .iter()
            .filter(|s| **s == ResolverState::Detected)
            .count();
        assert_eq!(detected, 2);
    }

    #[test]
    fn test_from_config_chain() {
        let mut config = CaptchaConfig::default();
        assert_eq!(CaptchaResolver::from_config(&config).backend_names(), vec!["nopecha"]);

        config.capsolver_api_key = Some("key".to_string());
        assert_eq!(
            CaptchaResolver::from_config(&config).backend_names(),
            vec!["nopecha", "capsolver"]
        );
    }
}
