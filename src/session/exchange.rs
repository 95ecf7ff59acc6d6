//! Wire exchange: sends one request, returns one response.
//!
//! The exchange does no cookie handling, redirect following or pacing;
//! the `Session` layers those on top so every backend behaves the same.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::redirect::Policy;

use crate::error::{FilerError, Result};

use super::request::{Body, Method, Request, Response, TransportError};

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Something that can carry a single request to the portal
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Send exactly one request; never retries, never follows redirects
    async fn send(&self, request: &Request) -> std::result::Result<Response, TransportError>;

    /// Whether requests through this exchange are subject to pacing
    fn paced(&self) -> bool {
        true
    }
}

/// Network exchange backed by reqwest
pub struct HttpExchange {
    client: Client,
}

impl HttpExchange {
    /// Build the client
    ///
    /// Certificate validation follows `verify_tls`; the portal serves a
    /// self-signed certificate, so the shipped default is off.
    pub fn new(timeout: Duration, verify_tls: bool) -> Result<Self> {
        if !verify_tls {
            log::warn!("TLS certificate validation is disabled");
        }
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .danger_accept_invalid_certs(!verify_tls)
            .build()
            .map_err(|e| FilerError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    fn map_error(url: &str, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::timeout(url, err.to_string())
        } else {
            TransportError::connection(url, err.to_string())
        }
    }
}

#[async_trait]
impl Exchange for HttpExchange {
    async fn send(&self, request: &Request) -> std::result::Result<Response, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };
        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match &request.body {
            Some(Body::Form(fields)) => builder.form(fields),
            Some(Body::Json(json)) => builder.body(json.clone()),
            None => builder,
        };

        let resp = builder.send().await.map_err(|e| Self::map_error(&request.url, e))?;

        let url = resp.url().to_string();
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();
        let body = resp.text().await.map_err(|e| Self::map_error(&url, e))?;

        Ok(Response {
            url,
            status,
            headers,
            body,
        })
    }
}
