//! Handler dispatch
//!
//! Two lookup tables, one per obligation kind, filled from a fixed registry
//! at startup. Dispatching an obligation nobody registered for is a
//! configuration error, never a silent skip. A handler's own failure is
//! scoped to its obligation and comes back as a failed `HandlerResult`.

mod activity_percentages;
mod profile_update;
mod receipts;
mod registry_update;
mod support;
mod vat;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::codec::CodecError;
use crate::domain::{HandlerResult, Obligation, Profile};
use crate::error::{FilerError, Result};
use crate::portal::Portal;
use crate::session::{Session, TransportError};

pub use activity_percentages::ActivityPercentagesHandler;
pub use receipts::ReceiptSummaryHandler;
pub use registry_update::RegistryUpdateHandler;
pub use vat::VatReturnHandler;

/// Why a handler could not complete its obligation
#[derive(Debug, Error)]
pub enum HandlerFailure {
    /// The portal refused or answered unexpectedly; carries its description when it gave one
    #[error("{0}")]
    Portal(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("invalid JSON from portal: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{handler} cannot handle {obligation}")]
    WrongObligation { handler: String, obligation: String },
}

impl HandlerFailure {
    pub fn portal(message: impl Into<String>) -> Self {
        HandlerFailure::Portal(message.into())
    }
}

/// Read-only run facts every handler may use
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub portal: Portal,
    pub profile: Profile,
    pub today: NaiveDate,
}

/// Resolves one kind of obligation against the portal
#[async_trait]
pub trait ObligationHandler: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Fetch state, submit the payload, interpret the answer
    async fn resolve(
        &self,
        session: &mut Session,
        ctx: &HandlerContext,
        obligation: &Obligation,
    ) -> std::result::Result<HandlerResult, HandlerFailure>;
}

/// Form code → handler and profile field → handler
#[derive(Default)]
pub struct HandlerRegistry {
    forms: HashMap<String, Box<dyn ObligationHandler>>,
    profile_fields: HashMap<String, Box<dyn ObligationHandler>>,
}

impl HandlerRegistry {
    /// Registry with nothing registered
    pub fn new() -> Self {
        Self::default()
    }

    /// The fixed set of handlers shipped with the tool
    pub fn standard() -> Self {
        Self::new()
            .register_form(vat::FORM_CODE, VatReturnHandler)
            .register_form(receipts::FORM_CODE, ReceiptSummaryHandler)
            .register_profile_field(registry_update::FIELD, RegistryUpdateHandler)
            .register_profile_field(activity_percentages::FIELD, ActivityPercentagesHandler)
    }

    pub fn register_form(mut self, code: &str, handler: impl ObligationHandler + 'static) -> Self {
        self.forms.insert(code.to_string(), Box::new(handler));
        self
    }

    pub fn register_profile_field(mut self, field: &str, handler: impl ObligationHandler + 'static) -> Self {
        self.profile_fields.insert(field.to_string(), Box::new(handler));
        self
    }

    fn lookup(&self, obligation: &Obligation) -> Option<&dyn ObligationHandler> {
        let table = match obligation {
            Obligation::Form { .. } => &self.forms,
            Obligation::ProfileField { .. } => &self.profile_fields,
        };
        table.get(obligation.handler_key()).map(|h| h.as_ref())
    }

    /// Check whether a handler is registered for the obligation
    pub fn handles(&self, obligation: &Obligation) -> bool {
        self.lookup(obligation).is_some()
    }

    /// Route an obligation to its handler
    ///
    /// Only a missing registration is an error; handler failures are
    /// folded into a failed result.
    pub async fn dispatch(
        &self,
        session: &mut Session,
        ctx: &HandlerContext,
        obligation: &Obligation,
    ) -> Result<HandlerResult> {
        let handler = self
            .lookup(obligation)
            .ok_or_else(|| FilerError::UnregisteredObligation(obligation.to_string()))?;

        log::info!("Dispatching {} to {}", obligation, handler.name());
        match handler.resolve(session, ctx, obligation).await {
            Ok(result) => Ok(result),
            Err(failure) => {
                log::warn!("{} failed for {}: {}", handler.name(), obligation, failure);
                Ok(HandlerResult::failure(failure.to_string()))
            }
        }
    }
}

/// Guard for handlers that only take form obligations; returns the period
pub(crate) fn expect_form<'a>(handler: &str, obligation: &'a Obligation) -> std::result::Result<&'a str, HandlerFailure> {
    match obligation {
        Obligation::Form { period, .. } => Ok(period),
        other => Err(HandlerFailure::WrongObligation {
            handler: handler.to_string(),
            obligation: other.to_string(),
        }),
    }
}

/// Guard for handlers that only take profile obligations; returns the link
pub(crate) fn expect_profile_field<'a>(
    handler: &str,
    obligation: &'a Obligation,
) -> std::result::Result<&'a str, HandlerFailure> {
    match obligation {
        Obligation::ProfileField { link, .. } => Ok(link),
        other => Err(HandlerFailure::WrongObligation {
            handler: handler.to_string(),
            obligation: other.to_string(),
        }),
    }
}
