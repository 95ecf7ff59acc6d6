//! Form 211: monthly VAT return.
//!
//! The return is filed exactly as the portal pre-fills it: every input on
//! the declaration page is echoed back, blanks as zero.

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value, json};

use crate::domain::{HandlerResult, Obligation};
use crate::session::Session;

use super::support::{input_fields, json_answer, menu_url, portal_error, require_marker, truthy};
use super::{HandlerContext, HandlerFailure, ObligationHandler, expect_form};

pub(crate) const FORM_CODE: &str = "211";

/// Sworn-declaration application in the menu
const MENU_APPLICATION: &str = "SG00005";
/// Printed form number behind tax 211
const PRINTED_FORM: &str = "120";
const PERMIT: &str = "declaracion/permite";
const SUBMIT: &str = "presentar";
const DECLARATION_MARKER: &str = "Presentar Declaración";
/// Inputs the portal computes itself
const SKIPPED_FIELDS: &[&str] = &["C2", "C3"];

pub struct VatReturnHandler;

#[async_trait]
impl ObligationHandler for VatReturnHandler {
    fn name(&self) -> &str {
        "vat-return"
    }

    async fn resolve(
        &self,
        session: &mut Session,
        ctx: &HandlerContext,
        obligation: &Obligation,
    ) -> Result<HandlerResult, HandlerFailure> {
        let period = expect_form(self.name(), obligation)?;
        let portal = &ctx.portal;

        let declarations = menu_url(session, portal, MENU_APPLICATION)
            .await?
            .ok_or_else(|| HandlerFailure::portal("Tax payer menu not found"))?;
        let page = session.get(portal.endpoint(&declarations)).await?;
        require_marker(&page, DECLARATION_MARKER, "Tax payer not found")?;

        let permit_args = json!({
            "ruc": ctx.profile.ruc,
            "dv": ctx.profile.dv,
            "periodo": period,
            "impuesto": FORM_CODE,
            "formulario": PRINTED_FORM,
            "fechaDiferida": null,
        });
        let permit = json_answer(
            &session.get(portal.token_url(PERMIT, &permit_args)?).await?,
            "checking form permission",
        )?;
        if !truthy(permit.get("permite")) {
            return Err(HandlerFailure::portal(
                portal_error(&permit).unwrap_or_else(|| "Tax form could not be retrieved".to_string()),
            ));
        }
        let permit_url = permit.get("url").and_then(Value::as_str).unwrap_or_default();
        log::info!("Retrieving declaration form for period {}", period);
        let form = session.get(portal.on_host(permit_url)).await?;

        let payload = declaration_payload(permit_url, &input_fields(&form.body));
        log::info!("Sending VAT return with {} fields", payload.len());
        let answer = json_answer(
            &session.post_json(portal.endpoint(SUBMIT), &Value::Object(payload)).await?,
            "filing VAT",
        )?;

        if truthy(answer.get("exito")) {
            Ok(HandlerResult::success("VAT filed successfully!"))
        } else {
            Err(HandlerFailure::portal(portal_error(&answer).unwrap_or_else(|| {
                "No response received when filing VAT. Try again later.".to_string()
            })))
        }
    }
}

/// Form token carried in the permit URL
fn form_token(permit_url: &str) -> String {
    Regex::new(r"[?&]_cyp=([^&]+)")
        .ok()
        .and_then(|re| re.captures(permit_url).map(|c| c[1].to_string()))
        .unwrap_or_default()
}

/// Submission body: `_cyp` followed by the page's inputs
fn declaration_payload(permit_url: &str, inputs: &[(String, String)]) -> Map<String, Value> {
    let dynamic = Regex::new(r"^dynamicProps\(([^)]+)\)").ok();
    let mut payload = Map::new();
    payload.insert("_cyp".to_string(), Value::String(form_token(permit_url)));

    for (raw_name, raw_value) in inputs {
        let name = dynamic
            .as_ref()
            .and_then(|re| re.captures(raw_name))
            .map(|c| c[1].to_string())
            .unwrap_or_else(|| raw_name.clone());
        if name.is_empty() || SKIPPED_FIELDS.contains(&name.as_str()) {
            continue;
        }
        let value = match name.as_str() {
            "segundoApellido" => raw_value.clone(),
            "fechaDiferida" => String::new(),
            "exportador" => "0".to_string(),
            _ if raw_value.is_empty() => "0".to_string(),
            _ => raw_value.clone(),
        };
        if !value.is_empty() && value != "null" {
            payload.insert(name, Value::String(value));
        }
    }
    payload
}
