//! Request/response values exchanged with the portal.

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// HTTP method used by the portal flows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

/// Form fields whose values never appear in logs
const REDACTED_FIELDS: &[&str] = &["clave", "password"];

/// Request body
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// `application/x-www-form-urlencoded` fields
    Form(Vec<(String, String)>),
    /// Compact JSON text
    Json(String),
}

impl Body {
    /// Body rendered as text for debug logging, secrets masked
    pub fn preview(&self) -> String {
        match self {
            Body::Form(fields) => fields
                .iter()
                .map(|(k, v)| {
                    if REDACTED_FIELDS.contains(&k.as_str()) {
                        format!("{}=***", k)
                    } else {
                        format!("{}={}", k, v)
                    }
                })
                .collect::<Vec<_>>()
                .join("&"),
            Body::Json(json) => json.clone(),
        }
    }
}

/// A single request to the portal
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Body>,
    /// When set, a non-2xx final status is a `TransportError`
    pub require_success: bool,
}

impl Request {
    /// GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            require_success: false,
        }
    }

    /// POST with form fields
    pub fn post_form<K, V>(url: impl Into<String>, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let fields = fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self {
            method: Method::Post,
            url: url.into(),
            headers: Vec::new(),
            body: Some(Body::Form(fields)),
            require_success: false,
        }
    }

    /// POST with a JSON document
    pub fn post_json(url: impl Into<String>, value: &Value) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: Some(Body::Json(value.to_string())),
            require_success: false,
        }
    }

    /// Add a header (builder pattern)
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Mark non-2xx responses as unacceptable
    pub fn require_success(mut self) -> Self {
        self.require_success = true;
        self
    }

    /// Look up a header value (case-insensitive)
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Turn this request into the follow-up for a redirect
    ///
    /// 301/302/303 downgrade a POST to a bodiless GET, 307/308 replay it.
    pub(crate) fn redirected(&self, location: String, status: u16) -> Self {
        let mut next = self.clone();
        next.url = location;
        if matches!(status, 301..=303) && self.method == Method::Post {
            next.method = Method::Get;
            next.body = None;
            next.headers.retain(|(k, _)| !k.eq_ignore_ascii_case("content-type"));
        }
        next
    }
}

/// Response from the portal (or from the mock-substitution directory)
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// URL that produced this response
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Response {
    /// 200 response with a body and no headers
    pub fn ok(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: 200,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Add a header (builder pattern)
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Check for a 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check for a redirect status
    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303 | 307 | 308)
    }

    /// All values of a header (case-insensitive)
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Raw `Set-Cookie` header values
    pub fn set_cookies(&self) -> impl Iterator<Item = &str> {
        self.header_values("set-cookie")
    }

    /// Parse the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }

    /// Check whether the body contains a marker string
    pub fn contains(&self, marker: &str) -> bool {
        self.body.contains(marker)
    }
}

/// Kind of transport failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connection,
    HttpStatus,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::Timeout => write!(f, "timeout"),
            TransportErrorKind::Connection => write!(f, "connection"),
            TransportErrorKind::HttpStatus => write!(f, "http-status"),
        }
    }
}

/// Network-level failure or an unacceptable response status
///
/// The transport never retries; retry policy belongs to the caller.
#[derive(Debug, Clone, Error)]
#[error("{kind} error for {url}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub url: String,
    pub message: String,
    pub status: Option<u16>,
}

impl TransportError {
    pub fn timeout(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Timeout,
            url: url.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn connection(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Connection,
            url: url.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self {
            kind: TransportErrorKind::HttpStatus,
            url: url.into(),
            message: format!("unacceptable status {}", status),
            status: Some(status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_post_json_sets_content_type() {
        let req = Request::post_json("https://portal/eset/presentar", &json!({"a": 1}));
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.header_value("content-type"), Some("application/json"));
        assert_eq!(req.body, Some(Body::Json("{\"a\":1}".to_string())));
    }

    #[test]
    fn test_redirect_after_post_becomes_get() {
        let req = Request::post_form("https://portal/eset/authenticate", [("usuario", "x")]);
        let next = req.redirected("https://portal/eset".to_string(), 302);
        assert_eq!(next.method, Method::Get);
        assert!(next.body.is_none());
        assert_eq!(next.url, "https://portal/eset");
    }

    #[test]
    fn test_redirect_307_keeps_body() {
        let req = Request::post_form("https://portal/a", [("k", "v")]);
        let next = req.redirected("https://portal/b".to_string(), 307);
        assert_eq!(next.method, Method::Post);
        assert!(next.body.is_some());
    }

    #[test]
    fn test_response_set_cookies() {
        let resp = Response::ok("https://portal/", "")
            .with_header("Set-Cookie", "a=1")
            .with_header("content-type", "text/html")
            .with_header("set-cookie", "b=2");
        let cookies: Vec<&str> = resp.set_cookies().collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
    }

    #[test]
    fn test_form_preview() {
        let body = Body::Form(vec![("usuario".into(), "u".into()), ("clave".into(), "p".into())]);
        assert_eq!(body.preview(), "usuario=u&clave=***");
    }

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::http_status("https://portal/x", 503);
        assert_eq!(err.to_string(), "http-status error for https://portal/x: unacceptable status 503");
        assert_eq!(err.status, Some(503));
    }
}
