//! Login against the portal.
//!
//! A persisted session is reused when the application root still shows the
//! logout link. Otherwise the login page is fetched, any challenge on it is
//! solved, and the credentials are submitted. A captcha rejection gets
//! exactly one more attempt with a freshly solved challenge taken from the
//! retry page; a credential rejection ends the run immediately.

use std::fmt;

use thiserror::Error;

use crate::captcha::{CaptchaResolver, scrape_challenge};
use crate::portal::{BAD_CREDENTIALS_MARKER, CAPTCHA_REJECTED_MARKER, LOGOUT_MARKER, Portal};
use crate::session::{Response, Session, TransportError};

/// Login attempts per run
const MAX_ATTEMPTS: usize = 2;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("incorrect username or password")]
    InvalidCredentials,

    #[error("captcha answer rejected twice")]
    CaptchaRejected,

    #[error("no captcha backend produced an answer")]
    CaptchaExhausted,

    #[error("captcha expected but not found on {0}")]
    ChallengeMissing(String),

    #[error("login response matched no known outcome")]
    UnrecognizedResponse,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Login identifier and secret
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    identifier: String,
    secret: String,
}

impl Credential {
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub(crate) fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("identifier", &self.identifier)
            .field("secret", &"***")
            .finish()
    }
}

/// Proof that the session is logged in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authenticated {
    /// Logged in via persisted cookies, no credentials sent
    pub resumed: bool,
}

enum Outcome {
    LoggedIn,
    BadCredentials,
    CaptchaRejected,
    Unknown,
}

fn classify(response: &Response) -> Outcome {
    if response.contains(BAD_CREDENTIALS_MARKER) {
        Outcome::BadCredentials
    } else if response.contains(CAPTCHA_REJECTED_MARKER) {
        Outcome::CaptchaRejected
    } else if response.contains(LOGOUT_MARKER) {
        Outcome::LoggedIn
    } else {
        Outcome::Unknown
    }
}

pub struct Authenticator {
    portal: Portal,
    resolver: CaptchaResolver,
}

impl Authenticator {
    pub fn new(portal: Portal, resolver: CaptchaResolver) -> Self {
        Self { portal, resolver }
    }

    pub fn resolver(&self) -> &CaptchaResolver {
        &self.resolver
    }

    /// Check whether the session's cookies still carry a login
    pub async fn is_logged_in(&self, session: &mut Session) -> Result<bool, AuthError> {
        let home = session.get(self.portal.base()).await?;
        Ok(home.contains(LOGOUT_MARKER))
    }

    pub async fn login(&mut self, session: &mut Session, credential: &Credential) -> Result<Authenticated, AuthError> {
        if self.is_logged_in(session).await? {
            log::info!("Session still valid, skipping login");
            return Ok(Authenticated { resumed: true });
        }

        for attempt in 1..=MAX_ATTEMPTS {
            let page_url = if attempt == 1 {
                self.portal.login_page()
            } else {
                self.portal.login_retry_page(credential.identifier())
            };
            let page = session.get(&page_url).await?;

            let mut form = vec![
                ("usuario".to_string(), credential.identifier().to_string()),
                ("clave".to_string(), credential.secret().to_string()),
            ];
            match scrape_challenge(&page.body, &page_url) {
                Some(challenge) => {
                    let solution = self.resolver.resolve(&challenge).await?;
                    form.push(("g-recaptcha-response".to_string(), solution.into_token()));
                }
                None if attempt > 1 => return Err(AuthError::ChallengeMissing(page_url)),
                None => log::debug!("No captcha on {}", page_url),
            }

            log::info!("Submitting credentials (attempt {}/{})", attempt, MAX_ATTEMPTS);
            let response = session.post_form(self.portal.authenticate(), form).await?;
            match classify(&response) {
                Outcome::LoggedIn => {
                    log::info!("Logged in");
                    return Ok(Authenticated { resumed: false });
                }
                Outcome::BadCredentials => return Err(AuthError::InvalidCredentials),
                Outcome::CaptchaRejected => log::warn!("Captcha rejected on attempt {}", attempt),
                Outcome::Unknown => return Err(AuthError::UnrecognizedResponse),
            }
        }

        Err(AuthError::CaptchaRejected)
    }
}
