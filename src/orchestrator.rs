//! One run: login → detect → dispatch → notify.
//!
//! Everything before dispatch is run-fatal. During dispatch a failing
//! obligation is recorded and the run moves on to the next one. The run
//! always ends with exactly one notification and a cookie save.

use chrono::{Local, NaiveDate};

use crate::auth::{Authenticator, Credential};
use crate::captcha::CaptchaResolver;
use crate::detect::ObligationDetector;
use crate::dispatch::{HandlerContext, HandlerRegistry};
use crate::domain::{HandlerResult, RunReport, current_filing_period};
use crate::error::{FilerError, Result};
use crate::notify::Notifier;
use crate::portal::Portal;
use crate::session::Session;

pub struct Orchestrator {
    portal: Portal,
    authenticator: Authenticator,
    detector: ObligationDetector,
    registry: HandlerRegistry,
    notifier: Box<dyn Notifier>,
    today: NaiveDate,
}

impl Orchestrator {
    /// Orchestrator with the standard handlers, filing for today's period
    pub fn new(portal: Portal, resolver: CaptchaResolver, notifier: Box<dyn Notifier>) -> Self {
        Self {
            authenticator: Authenticator::new(portal.clone(), resolver),
            detector: ObligationDetector::new(portal.clone()),
            portal,
            registry: HandlerRegistry::standard(),
            notifier,
            today: Local::now().date_naive(),
        }
    }

    pub fn with_registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Pin the date the filing period is derived from
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Period this run files for
    pub fn period(&self) -> String {
        current_filing_period(self.today)
    }

    /// Run the pipeline and report; never returns early without notifying
    pub async fn run(&mut self, session: &mut Session, credential: &Credential) -> RunReport {
        let mut report = RunReport::default();
        if let Err(e) = self.execute(session, credential, &mut report).await {
            log::error!("Run aborted ({}): {}", e.category(), e);
            report.abort(e.category(), e.to_string());
        }

        let (title, message) = report.summary();
        self.notifier.notify(&title, &message).await;

        if let Err(e) = session.persist() {
            log::warn!("Failed to save cookies: {}", e);
        }
        report
    }

    /// Report a run that could not start (no credentials, no session)
    ///
    /// Still ends with the single notification every run sends.
    pub async fn abort(&self, error: &FilerError) -> RunReport {
        log::error!("Run aborted before login ({}): {}", error.category(), error);
        let mut report = RunReport::default();
        report.abort(error.category(), error.to_string());

        let (title, message) = report.summary();
        self.notifier.notify(&title, &message).await;
        report
    }

    async fn execute(&mut self, session: &mut Session, credential: &Credential, report: &mut RunReport) -> Result<()> {
        let login = self.authenticator.login(session, credential).await?;
        report.authenticated = true;
        log::info!("Authenticated (resumed session: {})", login.resumed);

        let profile = self.detector.fetch_profile(session).await?;
        log::info!("Hello {}", profile.first_name());

        let period = self.period();
        let obligations = self.detector.detect(session, &period).await?;
        if obligations.is_empty() {
            log::info!("No pending actions for period {}", period);
            return Ok(());
        }

        let ctx = HandlerContext {
            portal: self.portal.clone(),
            profile,
            today: self.today,
        };
        for obligation in obligations {
            match self.registry.dispatch(session, &ctx, &obligation).await {
                Ok(result) => {
                    log::info!("{}: {}", obligation, result.message);
                    report.record(obligation, result, None);
                }
                Err(e) => {
                    log::error!("{}: {}", obligation, e);
                    report.record(obligation, HandlerResult::failure(e.to_string()), Some(e.category().to_string()));
                }
            }
        }
        Ok(())
    }
}
