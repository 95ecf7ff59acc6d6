//! Shared scraping and portal-answer helpers for the handlers.

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::{Value, json};

use crate::portal::{self, Portal};
use crate::session::{Response, Session};

use super::HandlerFailure;

/// URL of a menu application, relative to the application root
pub(crate) async fn menu_url(
    session: &mut Session,
    portal: &Portal,
    application: &str,
) -> Result<Option<String>, HandlerFailure> {
    let response = session.get(portal.token_url(portal::MENU, &json!({}))?).await?;
    let menu: Vec<Value> = response.json().unwrap_or_else(|e| {
        log::warn!("Unreadable menu: {}", e);
        Vec::new()
    });
    Ok(menu
        .iter()
        .find(|item| item.get("aplicacion").and_then(Value::as_str) == Some(application))
        .and_then(|item| item.get("url"))
        .and_then(Value::as_str)
        .map(str::to_string))
}

/// Fail unless the page shows `marker`
pub(crate) fn require_marker(response: &Response, marker: &str, failure: &str) -> Result<(), HandlerFailure> {
    if response.contains(marker) {
        Ok(())
    } else {
        log::debug!("Marker {:?} missing from {}", marker, response.url);
        Err(HandlerFailure::portal(failure))
    }
}

/// Parse a JSON answer, naming what was expected on failure
pub(crate) fn json_answer(response: &Response, what: &str) -> Result<Value, HandlerFailure> {
    response
        .json()
        .map_err(|_| HandlerFailure::portal(format!("Invalid response when {}", what)))
}

/// The portal's own error text: `operacion.errores[0].descripcion`
pub(crate) fn portal_error(answer: &Value) -> Option<String> {
    answer
        .pointer("/operacion/errores/0/descripcion")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Loose truthiness of a portal flag
pub(crate) fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty() && s != "false",
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

/// Validation endpoints answer `[]` when there is nothing to complain about
pub(crate) fn require_empty_list(response: &Response) -> Result<(), HandlerFailure> {
    if response.body.trim() == "[]" {
        Ok(())
    } else {
        Err(HandlerFailure::portal(response.body.trim()))
    }
}

/// `(name, value)` of every `<input>` on the page, in document order
pub(crate) fn input_fields(html: &str) -> Vec<(String, String)> {
    let Ok(selector) = Selector::parse("input") else {
        return Vec::new();
    };
    Html::parse_document(html)
        .select(&selector)
        .map(|el| {
            let attr = |name: &str| el.value().attr(name).unwrap_or("").to_string();
            (attr("name"), attr("value"))
        })
        .collect()
}

/// `data-ng-init` of the first div whose controller mentions `controller`
pub(crate) fn ng_init(html: &str, controller: &str) -> Option<String> {
    let selector = Selector::parse("div[data-ng-controller]").ok()?;
    Html::parse_document(html)
        .select(&selector)
        .find(|el| {
            el.value()
                .attr("data-ng-controller")
                .is_some_and(|c| c.contains(controller))
        })
        .and_then(|el| el.value().attr("data-ng-init"))
        .map(str::to_string)
}

/// First single-quoted argument of an init expression, trailing commas removed
pub(crate) fn quoted_argument(init: &str) -> Option<String> {
    let re = Regex::new(r"'([^']+)'").ok()?;
    let caps = re.captures(init)?;
    let id = caps[1].trim_end_matches(',');
    (!id.is_empty()).then(|| id.to_string())
}
