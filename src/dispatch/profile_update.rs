//! Profile update workflow shared by the profile handlers.
//!
//! recover current data → build the capture → (validate) → save → open the
//! generated request document → accept it.

use serde_json::{Map, Value, json};

use crate::domain::HandlerResult;
use crate::session::Session;

use super::support::{json_answer, ng_init, portal_error, quoted_argument, require_empty_list, require_marker};
use super::{HandlerContext, HandlerFailure};

const RECOVER: &str = "actualizacion/recuperar";
const CHECK_STEP: &str = "actualizacion/verificarPaso";
const VERIFY: &str = "actualizacion/verificar";
const SAVE: &str = "actualizacion/guardar?";
const ACCEPT_DOCUMENT: &str = "ru/documento/archivos/aceptarDocumento";
const DOCUMENT_MARKER: &str = "Enviar Solicitud";
const DOCUMENT_CONTROLLER: &str = "DocumentoArchivosController";

/// What differs between the profile sections
pub(crate) trait ProfileForm: Send + Sync {
    /// Update category the portal files this under
    fn category(&self) -> &'static str;

    /// Text identifying the section's landing page
    fn page_marker(&self) -> &'static str;

    /// Capture from the recovered data
    fn capture(&self, recovered: &Value, ctx: &HandlerContext) -> Map<String, Value>;

    /// Extra fields for the validation round; `None` skips validation
    fn verification_fields(&self, recovered: &Value, ctx: &HandlerContext) -> Option<Map<String, Value>>;

    fn success_message(&self) -> &'static str;
}

/// Run the update for `form`, starting at the section's `link`
pub(crate) async fn submit_profile_update<F: ProfileForm>(
    form: &F,
    session: &mut Session,
    ctx: &HandlerContext,
    link: &str,
) -> Result<HandlerResult, HandlerFailure> {
    let portal = &ctx.portal;
    let category = form.category();

    let landing = session.get(portal.on_host(link)).await?;
    require_marker(&landing, form.page_marker(), "No profile available")?;

    let recover_args = json!({"ruc": ctx.profile.ruc, "categoria": category});
    let recovered = json_answer(
        &session.get(portal.token_url(RECOVER, &recover_args)?).await?,
        "recovering data",
    )?;

    let mut capture = form.capture(&recovered, ctx);
    if let Some(extra) = form.verification_fields(&recovered, ctx) {
        let step = json!({
            "ruc": ctx.profile.ruc,
            "categoria": category,
            "paso": "generales",
            "captura": capture,
        });
        log::info!("Checking {} step", category);
        require_empty_list(&session.post_json(portal.endpoint(CHECK_STEP), &step).await?)?;

        capture.extend(extra);
        let verify = json!({"ruc": ctx.profile.ruc, "categoria": category, "captura": capture});
        log::info!("Verifying {} data", category);
        require_empty_list(&session.post_json(portal.endpoint(VERIFY), &verify).await?)?;
    }

    let save = json!({"ruc": ctx.profile.ruc, "categoria": category, "captura": capture});
    log::info!("Saving {} data", category);
    let saved = json_answer(&session.post_json(portal.endpoint(SAVE), &save).await?, "saving data")?;
    if saved.get("exito") == Some(&Value::Bool(false)) {
        return Err(HandlerFailure::portal(
            portal_error(&saved).unwrap_or_else(|| "Unknown error saving data".to_string()),
        ));
    }

    let document_url = saved.get("url").and_then(Value::as_str).unwrap_or_default();
    let document = session.get(portal.endpoint(document_url)).await?;
    require_marker(&document, DOCUMENT_MARKER, "Update request document not available")?;

    let init = ng_init(&document.body, DOCUMENT_CONTROLLER)
        .ok_or_else(|| HandlerFailure::portal("Could not find document controller"))?;
    let document_id =
        quoted_argument(&init).ok_or_else(|| HandlerFailure::portal("Could not parse document ID"))?;

    log::info!("Confirming document {}", document_id);
    let accepted = session
        .post_json(portal.endpoint(ACCEPT_DOCUMENT), &json!({"id": document_id}))
        .await?;
    // The follow-up page only completes the browser flow; its absence is fine
    let next = accepted
        .json::<Value>()
        .ok()
        .and_then(|v| v.get("url").and_then(Value::as_str).map(str::to_string))
        .filter(|u| !u.is_empty());
    if let Some(next) = next {
        session.get(portal.endpoint(&next)).await?;
    }

    Ok(HandlerResult::success(form.success_message()))
}

/// String field of a recovered section, empty when absent
pub(crate) fn text(section: &Value, key: &str) -> Value {
    match section.get(key) {
        Some(Value::Null) | None => Value::String(String::new()),
        Some(v) => v.clone(),
    }
}

/// Raw field of a recovered section, `null` when absent
pub(crate) fn raw(section: &Value, key: &str) -> Value {
    section.get(key).cloned().unwrap_or(Value::Null)
}

/// Ordered capture map from `(key, value)` pairs
pub(crate) fn fields(pairs: Vec<(&str, Value)>) -> Map<String, Value> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}
