//! Form 955: periodic receipt summary ("talón").

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::domain::{HandlerResult, Obligation};
use crate::session::Session;

use super::support::{json_answer, menu_url, portal_error, require_marker};
use super::{HandlerContext, HandlerFailure, ObligationHandler, expect_form};

pub(crate) const FORM_CODE: &str = "955";

/// Receipt management application in the menu
const MENU_APPLICATION: &str = "DI03100";
/// Form number the summary is filed under
const SUMMARY_FORM: u32 = 241;
/// Operation id of receipt registration
const REGISTRATION_OPERATION: &str = "6";
const OPERATIONS: &str = "gdi/di/gestion/listarTiposOperaciones";
const PROCESS_SUMMARY: &str = "gdi/di/talonresumen/procesarTalon";
const MANAGEMENT_MARKER: &str = "Gestión de Comprobantes";
const REGISTRATION_MARKER: &str = "Registro de Comprobantes - Presentación de Talón";

pub struct ReceiptSummaryHandler;

#[async_trait]
impl ObligationHandler for ReceiptSummaryHandler {
    fn name(&self) -> &str {
        "receipt-summary"
    }

    async fn resolve(
        &self,
        session: &mut Session,
        ctx: &HandlerContext,
        obligation: &Obligation,
    ) -> Result<HandlerResult, HandlerFailure> {
        let period = expect_form(self.name(), obligation)?;
        let period_number: u32 = period
            .parse()
            .map_err(|_| HandlerFailure::portal(format!("Invalid filing period {}", period)))?;
        let portal = &ctx.portal;

        let management = menu_url(session, portal, MENU_APPLICATION)
            .await?
            .ok_or_else(|| HandlerFailure::portal("Receipt management menu not found"))?;
        let page = session.get(portal.endpoint(&management)).await?;
        require_marker(&page, MANAGEMENT_MARKER, "Not able to manage receipts")?;

        log::info!("Getting access to receipt forms");
        let operations = json_answer(
            &session
                .get(portal.token_url(OPERATIONS, &json!({"ruc": ctx.profile.ruc}))?)
                .await?,
            "getting operations",
        )?;
        let registration = operations
            .as_array()
            .into_iter()
            .flatten()
            .find(|op| operation_id(op).as_deref() == Some(REGISTRATION_OPERATION))
            .and_then(|op| op.get("url"))
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| HandlerFailure::portal("No access to receipt forms"))?;

        let forms = session.get(portal.endpoint(registration)).await?;
        require_marker(&forms, REGISTRATION_MARKER, "No receipt forms available")?;

        log::info!("Sending receipt form {} for period {}", SUMMARY_FORM, period);
        let args = json!({"periodo": period_number, "formulario": SUMMARY_FORM});
        let failure = format!("Filing receipt form {}", SUMMARY_FORM);
        let answer = session
            .post_json(portal.token_url(PROCESS_SUMMARY, &args)?, &json!({}))
            .await?
            .json::<Value>()
            .map_err(|_| HandlerFailure::portal(failure.clone()))?;

        if answer.get("exito") == Some(&Value::Bool(true)) {
            Ok(HandlerResult::success(format!(
                "Receipts for period {} filed successfully!",
                period
            )))
        } else {
            Err(HandlerFailure::portal(portal_error(&answer).unwrap_or(failure)))
        }
    }
}

/// Operation ids come as strings or numbers
fn operation_id(op: &Value) -> Option<String> {
    match op.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
