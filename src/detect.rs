//! Obligation detection.
//!
//! Reads the account state (profile controls and pending forms) and turns
//! it into an ordered list of obligations. Profile updates come first: the
//! portal will not accept filings while the profile is out of date.
//!
//! Detection is a function of the portal's answers and the filing period
//! passed in; nothing local carries over between runs.

use serde::Deserialize;
use serde_json::json;

use crate::domain::profile::lenient_string;
use crate::domain::{Obligation, Profile, profile_field_key};
use crate::error::{FilerError, Result};
use crate::portal::{self, Portal};
use crate::session::Session;

#[derive(Debug, Default, Deserialize)]
struct ProfileControls {
    #[serde(rename = "debeActualizar", default)]
    must_update: bool,
    #[serde(rename = "vinculos", default)]
    links: Vec<ProfileLink>,
}

#[derive(Debug, Deserialize)]
struct ProfileLink {
    #[serde(rename = "texto", default, deserialize_with = "lenient_string")]
    text: String,
    #[serde(default, deserialize_with = "lenient_string")]
    url: String,
}

#[derive(Debug, Deserialize)]
struct PendingForm {
    #[serde(rename = "impuesto", default, deserialize_with = "lenient_string")]
    code: String,
    #[serde(rename = "periodo", default, deserialize_with = "lenient_string")]
    period: String,
}

pub struct ObligationDetector {
    portal: Portal,
}

impl ObligationDetector {
    pub fn new(portal: Portal) -> Self {
        Self { portal }
    }

    /// Fetch the taxpayer profile; a profile without a name is unusable
    pub async fn fetch_profile(&self, session: &mut Session) -> Result<Profile> {
        let url = self.portal.token_url(portal::PROFILE, &json!({}))?;
        let response = session.get(url).await?;
        let profile: Profile = response
            .json()
            .map_err(|e| FilerError::Portal(format!("could not parse profile data: {}", e)))?;
        if profile.name.trim().is_empty() {
            return Err(FilerError::Portal("could not get user data".to_string()));
        }
        Ok(profile)
    }

    /// Obligations due for `period`, profile updates first
    pub async fn detect(&self, session: &mut Session, period: &str) -> Result<Vec<Obligation>> {
        let mut obligations = self.profile_obligations(session).await?;
        obligations.extend(self.form_obligations(session, period).await?);
        log::info!("Detected {} obligation(s) for period {}", obligations.len(), period);
        Ok(obligations)
    }

    async fn profile_obligations(&self, session: &mut Session) -> Result<Vec<Obligation>> {
        let url = self.portal.token_url(portal::PROFILE_CONTROLS, &json!({}))?;
        let response = session.get(url).await?;
        let controls: ProfileControls = response.json().unwrap_or_else(|e| {
            log::warn!("Unreadable profile controls, assuming none pending: {}", e);
            ProfileControls::default()
        });

        if !controls.must_update {
            log::info!("No pending profile actions");
            return Ok(Vec::new());
        }
        Ok(controls
            .links
            .into_iter()
            .filter(|link| !link.text.trim().is_empty())
            .map(|link| {
                log::info!("Profile data {} must be updated", link.text);
                Obligation::profile_field(profile_field_key(&link.text), link.text.trim(), link.url)
            })
            .collect())
    }

    async fn form_obligations(&self, session: &mut Session, period: &str) -> Result<Vec<Obligation>> {
        let url = self.portal.token_url(portal::PENDING_FORMS, &json!({}))?;
        let response = session.get(url).await?;
        let pending: Vec<PendingForm> = response.json().unwrap_or_else(|e| {
            log::warn!("Unreadable pending forms, assuming none: {}", e);
            Vec::new()
        });

        let mut obligations = Vec::new();
        for form in pending.into_iter().filter(|f| !f.code.is_empty()) {
            if form.period == period {
                obligations.push(Obligation::form(form.code, form.period));
            } else {
                log::info!(
                    "Form {} listed for period {}; waiting for the next fiscal period",
                    form.code,
                    form.period
                );
            }
        }
        Ok(obligations)
    }
}
