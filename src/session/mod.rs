//! Session transport
//!
//! A `Session` is the one stateful HTTP client of a run. Around every
//! request it:
//! - waits out the pacing window since the previous request completed
//! - picks a fresh identity (User-Agent) from the pool
//! - attaches the cookies that apply and merges the ones that come back
//! - follows redirects hop by hop so no `Set-Cookie` is missed
//!
//! The cookie jar is loaded from the cookie store when the session is
//! opened and written back by [`Session::persist`].

mod cookies;
mod exchange;
mod identity;
mod mockup;
mod pacing;
mod request;
#[cfg(test)]
pub(crate) mod scripted;

use std::path::{Path, PathBuf};

use url::Url;

pub use cookies::{CookieJar, StoredCookie};
pub use exchange::{DEFAULT_TIMEOUT, Exchange, HttpExchange};
pub use identity::{DEFAULT_IDENTITY, IdentityPool};
pub use mockup::MockupExchange;
pub use pacing::{Pacer, PacingWindow};
pub use request::{Body, Method, Request, Response, TransportError, TransportErrorKind};

use crate::config::Config;
use crate::error::Result;

/// Redirect hops followed for a single request
pub const MAX_REDIRECTS: usize = 10;

/// Name of the jar kept next to the local responses in mockup mode
pub const MOCKUP_COOKIES: &str = ".cookies.txt";

/// Bytes of request/response bodies shown in debug logs
const DEBUG_PREVIEW_BYTES: usize = 200;

const ACCEPT: &str = "text/html,application/xhtml+xml,application/json;q=0.9,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "es-PY,es;q=0.9,en;q=0.5";

/// The authenticated-or-not HTTP session of one run
pub struct Session {
    exchange: Box<dyn Exchange>,
    jar: CookieJar,
    identities: IdentityPool,
    identity: Option<String>,
    pacer: Pacer,
    store: Option<PathBuf>,
    requests: usize,
}

impl Session {
    /// Create a session with an empty jar
    ///
    /// Pacing is disabled when the exchange is not a network exchange.
    pub fn new(exchange: Box<dyn Exchange>, identities: IdentityPool, window: PacingWindow) -> Self {
        let pacer = if exchange.paced() {
            Pacer::new(window)
        } else {
            Pacer::disabled()
        };
        Self {
            exchange,
            jar: CookieJar::new(),
            identities,
            identity: None,
            pacer,
            store: None,
            requests: 0,
        }
    }

    /// Open the run's session: network or mockup exchange, identity pool,
    /// pacing window and cookie store, all from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let (exchange, cookies): (Box<dyn Exchange>, PathBuf) = if config.mockup.enabled {
            log::info!("Mockup mode: answering from {}", config.mockup.dir.display());
            (
                Box::new(MockupExchange::new(&config.mockup.dir)),
                config.mockup.dir.join(MOCKUP_COOKIES),
            )
        } else {
            (
                Box::new(HttpExchange::new(config.timeout(), config.http.verify_tls)?),
                config.http.cookies_file.clone(),
            )
        };
        let identities = IdentityPool::load(&config.http.user_agents_file)?;
        Self::new(exchange, identities, config.pacing_window()).with_cookie_store(cookies)
    }

    /// Load the cookie store at `path` and persist back to it
    pub fn with_cookie_store(mut self, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        self.jar = CookieJar::load(&path)?;
        self.store = Some(path);
        Ok(self)
    }

    /// Replace the jar
    pub fn with_jar(mut self, jar: CookieJar) -> Self {
        self.jar = jar;
        self
    }

    pub fn jar(&self) -> &CookieJar {
        &self.jar
    }

    /// Identity used for the most recent request
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Number of logical requests executed
    pub fn requests_sent(&self) -> usize {
        self.requests
    }

    pub fn cookie_store(&self) -> Option<&Path> {
        self.store.as_deref()
    }

    /// Write the jar to the cookie store, if one is attached
    pub fn persist(&self) -> Result<()> {
        match &self.store {
            Some(path) => self.jar.save(path),
            None => Ok(()),
        }
    }

    /// Execute one request
    ///
    /// Never retries. A non-2xx final status is only an error when the
    /// request asked for it with `require_success`.
    pub async fn execute(&mut self, request: Request) -> std::result::Result<Response, TransportError> {
        self.requests += 1;
        self.follow(request).await
    }

    pub async fn get(&mut self, url: impl Into<String>) -> std::result::Result<Response, TransportError> {
        self.execute(Request::get(url)).await
    }

    pub async fn post_form<K, V>(
        &mut self,
        url: impl Into<String>,
        fields: impl IntoIterator<Item = (K, V)>,
    ) -> std::result::Result<Response, TransportError>
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.execute(Request::post_form(url, fields)).await
    }

    pub async fn post_json(
        &mut self,
        url: impl Into<String>,
        value: &serde_json::Value,
    ) -> std::result::Result<Response, TransportError> {
        self.execute(Request::post_json(url, value)).await
    }

    async fn follow(&mut self, request: Request) -> std::result::Result<Response, TransportError> {
        let require_success = request.require_success;
        let mut current = request;

        for _ in 0..=MAX_REDIRECTS {
            // Every hop is a request of its own: paced, with a fresh identity
            self.pacer.wait().await;
            self.identity = Some(self.identities.pick(&mut rand::thread_rng()).to_string());

            let outgoing = self.prepare(&current)?;
            log::debug!("{} {}", outgoing.method, outgoing.url);
            if let Some(body) = &outgoing.body {
                log::debug!("Request body: {}", preview(&body.preview()));
            }

            let sent = self.exchange.send(&outgoing).await;
            self.pacer.record_completion();
            let response = sent?;
            log::debug!("Response {} from {}: {}", response.status, response.url, preview(&response.body));
            self.absorb_cookies(&current.url, &response);

            let location = response
                .header_values("location")
                .next()
                .filter(|_| response.is_redirect());
            if let Some(location) = location {
                let next = resolve_location(&current.url, location)?;
                log::debug!("Redirect {} -> {}", response.status, next);
                current = current.redirected(next, response.status);
                continue;
            }

            if require_success && !response.is_success() {
                return Err(TransportError::http_status(&response.url, response.status));
            }
            return Ok(response);
        }

        Err(TransportError::connection(
            &current.url,
            format!("more than {} redirects", MAX_REDIRECTS),
        ))
    }

    /// Attach identity, default accept headers and cookies
    fn prepare(&self, request: &Request) -> std::result::Result<Request, TransportError> {
        let url = parse_url(&request.url)?;
        let mut outgoing = request.clone();
        outgoing
            .headers
            .retain(|(k, _)| !k.eq_ignore_ascii_case("user-agent") && !k.eq_ignore_ascii_case("cookie"));

        let identity = self.identity.as_deref().unwrap_or(DEFAULT_IDENTITY);
        outgoing.headers.push(("User-Agent".to_string(), identity.to_string()));
        if request.header_value("accept").is_none() {
            outgoing.headers.push(("Accept".to_string(), ACCEPT.to_string()));
        }
        if request.header_value("accept-language").is_none() {
            outgoing
                .headers
                .push(("Accept-Language".to_string(), ACCEPT_LANGUAGE.to_string()));
        }
        if let Some(cookie) = self.jar.header_for(&url, now()) {
            outgoing.headers.push(("Cookie".to_string(), cookie));
        }
        Ok(outgoing)
    }

    fn absorb_cookies(&mut self, request_url: &str, response: &Response) {
        let source = Url::parse(&response.url).or_else(|_| Url::parse(request_url));
        let Ok(source) = source else {
            return;
        };
        let now = now();
        for header in response.set_cookies() {
            self.jar.merge_set_cookie(header, &source, now);
        }
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn parse_url(url: &str) -> std::result::Result<Url, TransportError> {
    Url::parse(url).map_err(|e| TransportError::connection(url, format!("invalid URL: {}", e)))
}

fn resolve_location(base: &str, location: &str) -> std::result::Result<String, TransportError> {
    parse_url(base)?
        .join(location)
        .map(|u| u.to_string())
        .map_err(|e| TransportError::connection(base, format!("invalid redirect target {}: {}", location, e)))
}

/// First bytes of a body, cut at a character boundary
fn preview(text: &str) -> &str {
    if text.len() <= DEBUG_PREVIEW_BYTES {
        return text;
    }
    let mut end = DEBUG_PREVIEW_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::scripted::ScriptedExchange;
    use super::*;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    const HOST: &str = "https://portal.test";

    fn session(exchange: ScriptedExchange) -> Session {
        Session::new(Box::new(exchange), IdentityPool::builtin(), PacingWindow::default())
    }

    #[tokio::test]
    async fn test_cookies_sent_and_merged() {
        let exchange = ScriptedExchange::new()
            .respond(
                Method::Get,
                "/eset",
                Ok(Response::ok("", "home").with_header("Set-Cookie", "JSESSIONID=two; Path=/")),
            )
            .on(Method::Get, "/eset/perfil", "{}");
        let mut jar = CookieJar::new();
        jar.merge(StoredCookie::new("JSESSIONID", "one", "portal.test", "/"), now());
        let mut session = session(exchange.clone()).with_jar(jar);

        session.get(format!("{}/eset", HOST)).await.unwrap();
        session.get(format!("{}/eset/perfil", HOST)).await.unwrap();

        let sent = exchange.sent();
        assert_eq!(sent[0].header_value("cookie"), Some("JSESSIONID=one"));
        assert_eq!(sent[1].header_value("cookie"), Some("JSESSIONID=two"));
        assert_eq!(session.jar().len(), 1);
    }

    #[tokio::test]
    async fn test_identity_attached_from_pool() {
        let exchange = ScriptedExchange::new().on(Method::Get, "/eset", "home");
        let pool = IdentityPool::new(vec!["agent-a".into(), "agent-b".into()]).unwrap();
        let mut session = Session::new(Box::new(exchange.clone()), pool.clone(), PacingWindow::default());

        for _ in 0..5 {
            session.get(format!("{}/eset", HOST)).await.unwrap();
        }
        for req in exchange.sent() {
            let agent = req.header_value("user-agent").unwrap();
            assert!(pool.contains(agent));
            assert!(req.header_value("accept").is_some());
        }
        assert_eq!(session.requests_sent(), 5);
    }

    #[tokio::test]
    async fn test_redirect_followed_with_cookies_from_each_hop() {
        let exchange = ScriptedExchange::new()
            .respond(
                Method::Post,
                "/eset/authenticate",
                Ok(Response {
                    url: String::new(),
                    status: 302,
                    headers: vec![
                        ("Location".into(), "/eset".into()),
                        ("Set-Cookie".into(), "JSESSIONID=fresh; Path=/".into()),
                    ],
                    body: String::new(),
                }),
            )
            .on(Method::Get, "/eset", "<a href=\"/eset/logout\">");
        let mut session = session(exchange.clone());

        let resp = session
            .post_form(format!("{}/eset/authenticate", HOST), [("usuario", "u"), ("clave", "p")])
            .await
            .unwrap();
        assert!(resp.contains("/eset/logout"));

        let follow = exchange.sent_to("/eset");
        assert_eq!(follow.len(), 1);
        assert_eq!(follow[0].method, Method::Get);
        assert_eq!(follow[0].header_value("cookie"), Some("JSESSIONID=fresh"));
        assert_eq!(session.requests_sent(), 1);
    }

    #[tokio::test]
    async fn test_redirect_loop_is_connection_error() {
        let mut redirect = Response::ok("", "").with_header("Location", "/loop");
        redirect.status = 302;
        let exchange = ScriptedExchange::new().respond(Method::Get, "/loop", Ok(redirect));
        let mut session = session(exchange);
        let err = session.get(format!("{}/loop", HOST)).await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Connection);
    }

    #[tokio::test]
    async fn test_require_success_rejects_error_status() {
        let mut failing = Response::ok("", "boom");
        failing.status = 503;
        let exchange = ScriptedExchange::new().respond(Method::Get, "/eset/presentar", Ok(failing));
        let mut session = session(exchange);

        let lenient = session.get(format!("{}/eset/presentar", HOST)).await.unwrap();
        assert_eq!(lenient.status, 503);

        let err = session
            .execute(Request::get(format!("{}/eset/presentar", HOST)).require_success())
            .await
            .unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::HttpStatus);
        assert_eq!(err.status, Some(503));
    }

    #[tokio::test]
    async fn test_transport_error_is_not_retried() {
        let exchange = ScriptedExchange::new().respond(
            Method::Get,
            "/eset",
            Err(TransportError::timeout(format!("{}/eset", HOST), "timed out")),
        );
        let mut session = session(exchange.clone());
        let err = session.get(format!("{}/eset", HOST)).await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Timeout);
        assert_eq!(exchange.sent().len(), 1);
    }

    /// Exchange that is paced like the network one
    struct PacedExchange(ScriptedExchange);

    #[async_trait::async_trait]
    impl Exchange for PacedExchange {
        async fn send(&self, request: &Request) -> std::result::Result<Response, TransportError> {
            self.0.send(request).await
        }
    }

    #[tokio::test]
    async fn test_gaps_between_requests_stay_in_window() {
        let exchange = ScriptedExchange::new().on(Method::Get, "/eset", "home");
        let window = PacingWindow::from_millis(20, 60);
        let mut session = Session::new(Box::new(PacedExchange(exchange)), IdentityPool::builtin(), window);

        let mut starts = Vec::new();
        for _ in 0..4 {
            starts.push(Instant::now());
            session.get(format!("{}/eset", HOST)).await.unwrap();
        }
        for pair in starts.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= Duration::from_millis(20), "gap {:?} below window", gap);
            assert!(gap <= Duration::from_millis(60) + Duration::from_millis(50), "gap {:?} above window", gap);
        }
    }

    /// Paced exchange that notes when each request went out
    struct TimedExchange {
        inner: ScriptedExchange,
        sent_at: std::sync::Arc<std::sync::Mutex<Vec<Instant>>>,
    }

    #[async_trait::async_trait]
    impl Exchange for TimedExchange {
        async fn send(&self, request: &Request) -> std::result::Result<Response, TransportError> {
            self.sent_at.lock().unwrap().push(Instant::now());
            self.inner.send(request).await
        }
    }

    #[tokio::test]
    async fn test_redirect_hops_are_paced_with_fresh_identity() {
        let mut redirect = Response::ok("", "").with_header("Location", "/eset");
        redirect.status = 302;
        let exchange = ScriptedExchange::new()
            .respond(Method::Post, "/eset/authenticate", Ok(redirect))
            .on(Method::Get, "/eset", "home");
        let sent_at = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let timed = TimedExchange {
            inner: exchange.clone(),
            sent_at: sent_at.clone(),
        };
        let pool = IdentityPool::new(vec!["agent-a".into(), "agent-b".into()]).unwrap();
        let mut session = Session::new(Box::new(timed), pool.clone(), PacingWindow::from_millis(20, 60));

        let resp = session
            .post_form(format!("{}/eset/authenticate", HOST), [("usuario", "u")])
            .await
            .unwrap();
        assert_eq!(resp.body, "home");

        let times = sent_at.lock().unwrap().clone();
        assert_eq!(times.len(), 2);
        let gap = times[1] - times[0];
        assert!(gap >= Duration::from_millis(20), "gap {:?} below window", gap);
        assert!(gap <= Duration::from_millis(60) + Duration::from_millis(50), "gap {:?} above window", gap);

        for req in exchange.sent() {
            assert!(pool.contains(req.header_value("user-agent").unwrap()));
        }
        assert_eq!(session.requests_sent(), 1);
    }

    #[tokio::test]
    async fn test_persist_writes_cookie_store() {
        let dir = TempDir::new().unwrap();
        let store = dir.path().join("cookies.txt");
        let exchange = ScriptedExchange::new().respond(
            Method::Get,
            "/eset",
            Ok(Response::ok("", "home").with_header("Set-Cookie", "JSESSIONID=abc; Path=/eset")),
        );

        let mut session = session(exchange).with_cookie_store(&store).unwrap();
        assert!(session.jar().is_empty());
        session.get(format!("{}/eset", HOST)).await.unwrap();
        session.persist().unwrap();

        let reloaded = CookieJar::load(&store).unwrap();
        assert_eq!(reloaded.get("JSESSIONID", "portal.test", "/eset").unwrap().value, "abc");
    }

    fn mockup_config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.mockup.enabled = true;
        config.mockup.dir = dir.to_path_buf();
        config.http.user_agents_file = dir.join("user-agents.txt");
        config
    }

    #[tokio::test]
    async fn test_from_config_mockup_uses_own_cookie_jar() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("eset.html"), "home").unwrap();
        let config = mockup_config(dir.path());

        let mut session = Session::from_config(&config).unwrap();
        assert_eq!(session.cookie_store(), Some(dir.path().join(MOCKUP_COOKIES).as_path()));
        assert_eq!(session.get(format!("{}/eset", HOST)).await.unwrap().body, "home");
    }

    #[test]
    fn test_from_config_rejects_empty_identity_file() {
        let dir = TempDir::new().unwrap();
        let config = mockup_config(dir.path());
        std::fs::write(&config.http.user_agents_file, "\n\n").unwrap();

        let err = Session::from_config(&config).err().unwrap();
        assert_eq!(err.category(), "config");
    }

    #[test]
    fn test_preview_respects_char_boundary() {
        let text = "ñ".repeat(150);
        let cut = preview(&text);
        assert!(cut.len() <= DEBUG_PREVIEW_BYTES);
        assert_eq!(cut.len(), 200);
        assert_eq!(preview("short"), "short");
    }
}
