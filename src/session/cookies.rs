//! Cookie jar persisted in the Netscape `cookies.txt` format.
//!
//! Cookies are keyed by (name, domain, path); a newer `Set-Cookie` for the
//! same key replaces the stored one. Expiry is only what the server sent:
//! expired cookies stop being sent, and a `Set-Cookie` that is already
//! expired removes the stored cookie.

use std::fs;
use std::path::Path;

use cookie::Cookie;
use url::Url;

use crate::error::Result;

const NETSCAPE_HEADER: &str = "# Netscape HTTP Cookie File";
const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

/// One stored cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    /// Lower-case domain without a leading dot
    pub domain: String,
    /// Also sent to subdomains (domain cookie vs host-only cookie)
    pub include_subdomains: bool,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    /// Unix timestamp; `None` for session cookies
    pub expires: Option<i64>,
}

impl StoredCookie {
    /// Host-only session cookie, mostly useful for tests and fixtures
    pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: normalize_domain(&domain.into()),
            include_subdomains: false,
            path: path.into(),
            secure: false,
            http_only: false,
            expires: None,
        }
    }

    fn same_key(&self, other: &StoredCookie) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }

    /// Check server-provided expiry against `now`
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires.is_some_and(|at| at <= now)
    }

    fn matches(&self, url: &Url, now: i64) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        let domain_ok = host == self.domain || (self.include_subdomains && host.ends_with(&format!(".{}", self.domain)));
        let secure_ok = !self.secure || url.scheme() == "https";
        domain_ok && secure_ok && path_matches(&self.path, url.path()) && !self.is_expired(now)
    }

    fn to_netscape_line(&self) -> String {
        let domain = if self.include_subdomains {
            format!(".{}", self.domain)
        } else {
            self.domain.clone()
        };
        let prefix = if self.http_only { HTTP_ONLY_PREFIX } else { "" };
        format!(
            "{}{}\t{}\t{}\t{}\t{}\t{}\t{}",
            prefix,
            domain,
            bool_field(self.include_subdomains),
            self.path,
            bool_field(self.secure),
            self.expires.map(|e| e.to_string()).unwrap_or_default(),
            self.name,
            self.value
        )
    }

    fn from_netscape_line(line: &str) -> Option<Self> {
        let (line, http_only) = match line.strip_prefix(HTTP_ONLY_PREFIX) {
            Some(rest) => (rest, true),
            None => (line, false),
        };
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 7 {
            return None;
        }
        let expires = match fields[4].trim() {
            "" | "0" => None,
            raw => Some(raw.parse::<i64>().ok()?),
        };
        Some(Self {
            name: fields[5].to_string(),
            value: fields[6].to_string(),
            domain: normalize_domain(fields[0]),
            include_subdomains: fields[1].eq_ignore_ascii_case("TRUE") || fields[0].starts_with('.'),
            path: fields[2].to_string(),
            secure: fields[3].eq_ignore_ascii_case("TRUE"),
            http_only,
            expires,
        })
    }
}

/// Cookie jar owned by the session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: Vec<StoredCookie>,
}

impl CookieJar {
    /// Create an empty jar
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a jar from disk; a missing file yields an empty jar
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("No cookie store at {}, starting with an empty jar", path.display());
            return Ok(Self::new());
        }
        let text = fs::read_to_string(path)?;
        let jar = Self::parse(&text);
        log::info!("Loaded {} cookies from {}", jar.len(), path.display());
        Ok(jar)
    }

    /// Parse Netscape cookie text, skipping comments and malformed lines
    pub fn parse(text: &str) -> Self {
        let mut jar = Self::new();
        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim_end_matches('\r');
            if line.trim().is_empty() || (line.starts_with('#') && !line.starts_with(HTTP_ONLY_PREFIX)) {
                continue;
            }
            match StoredCookie::from_netscape_line(line) {
                Some(cookie) => jar.insert(cookie),
                None => log::warn!("Skipping malformed cookie line {}", lineno + 1),
            }
        }
        jar
    }

    /// Render the jar as Netscape cookie text
    pub fn to_netscape(&self) -> String {
        let mut out = String::from(NETSCAPE_HEADER);
        out.push_str("\n# This file was generated by file-taxes. Edit at your own risk.\n\n");
        for cookie in &self.cookies {
            out.push_str(&cookie.to_netscape_line());
            out.push('\n');
        }
        out
    }

    /// Overwrite the store at `path` with this jar
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_netscape())?;
        log::debug!("Saved {} cookies to {}", self.len(), path.display());
        Ok(())
    }

    /// Merge a cookie: last write wins per (name, domain, path)
    pub fn merge(&mut self, cookie: StoredCookie, now: i64) {
        if cookie.is_expired(now) {
            self.cookies.retain(|c| !c.same_key(&cookie));
        } else {
            self.insert(cookie);
        }
    }

    /// Merge one `Set-Cookie` header received for `url`
    pub fn merge_set_cookie(&mut self, header: &str, url: &Url, now: i64) {
        match parse_set_cookie(header, url, now) {
            Some(cookie) => self.merge(cookie, now),
            None => log::warn!("Ignoring unparseable Set-Cookie from {}", url),
        }
    }

    /// `Cookie` header value for a request to `url`, if any cookie applies
    pub fn header_for(&self, url: &Url, now: i64) -> Option<String> {
        let mut matching: Vec<&StoredCookie> = self.cookies.iter().filter(|c| c.matches(url, now)).collect();
        if matching.is_empty() {
            return None;
        }
        // Longer paths first, as browsers do
        matching.sort_by(|a, b| b.path.len().cmp(&a.path.len()));
        Some(
            matching
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Find a cookie by its key
    pub fn get(&self, name: &str, domain: &str, path: &str) -> Option<&StoredCookie> {
        let domain = normalize_domain(domain);
        self.cookies
            .iter()
            .find(|c| c.name == name && c.domain == domain && c.path == path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StoredCookie> {
        self.cookies.iter()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    fn insert(&mut self, cookie: StoredCookie) {
        match self.cookies.iter_mut().find(|c| c.same_key(&cookie)) {
            Some(existing) => *existing = cookie,
            None => self.cookies.push(cookie),
        }
    }
}

/// Turn a `Set-Cookie` header into a stored cookie, defaulting domain/path from the URL
fn parse_set_cookie(header: &str, url: &Url, now: i64) -> Option<StoredCookie> {
    let parsed = Cookie::parse(header.to_string()).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();

    let (domain, include_subdomains) = match parsed.domain() {
        Some(d) if !d.trim_matches('.').is_empty() => (normalize_domain(d), true),
        _ => (host, false),
    };
    let path = parsed
        .path()
        .filter(|p| p.starts_with('/'))
        .map(str::to_string)
        .unwrap_or_else(|| default_path(url));

    // Max-Age wins over Expires
    let expires = match parsed.max_age() {
        Some(max_age) => Some(now.saturating_add(max_age.whole_seconds())),
        None => parsed.expires_datetime().map(|at| at.unix_timestamp()),
    };

    Some(StoredCookie {
        name: parsed.name().to_string(),
        value: parsed.value().to_string(),
        domain,
        include_subdomains,
        path,
        secure: parsed.secure().unwrap_or(false),
        http_only: parsed.http_only().unwrap_or(false),
        expires,
    })
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Directory of the request path, per RFC 6265 §5.1.4
fn default_path(url: &Url) -> String {
    let path = url.path();
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

fn path_matches(cookie_path: &str, request_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/') || request_path[cookie_path.len()..].starts_with('/'))
}

fn bool_field(value: bool) -> &'static str {
    if value { "TRUE" } else { "FALSE" }
}
