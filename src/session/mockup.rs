//! Offline exchange that answers from a directory of stored responses.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use url::Url;

use super::exchange::Exchange;
use super::request::{Request, Response, TransportError};

/// Serves `<dir>/<url path>` files in place of network I/O
#[derive(Debug, Clone)]
pub struct MockupExchange {
    root: PathBuf,
}

impl MockupExchange {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Files tried for a URL path, in preference order
    pub fn candidates(&self, url_path: &str) -> Vec<PathBuf> {
        let rel = url_path.trim_start_matches('/').trim_end_matches('/');
        if rel.is_empty() {
            return vec![self.root.join("index.json"), self.root.join("index.html")];
        }
        let base = self.root.join(rel);
        vec![
            self.root.join(format!("{}.json", rel)),
            self.root.join(format!("{}.html", rel)),
            base.join("index.json"),
            base.join("index.html"),
            base,
        ]
    }

    fn resolve(&self, url_path: &str) -> Result<PathBuf, Vec<PathBuf>> {
        let candidates = self.candidates(url_path);
        match candidates.iter().find(|p| p.is_file()) {
            Some(found) => Ok(found.clone()),
            None => Err(candidates),
        }
    }
}

#[async_trait]
impl Exchange for MockupExchange {
    async fn send(&self, request: &Request) -> Result<Response, TransportError> {
        let parsed = Url::parse(&request.url)
            .map_err(|e| TransportError::connection(&request.url, format!("invalid URL: {}", e)))?;

        let file = self.resolve(parsed.path()).map_err(|tried| {
            let tried: Vec<String> = tried.iter().map(|p| p.display().to_string()).collect();
            TransportError::connection(&request.url, format!("no mockup file (tried {})", tried.join(", ")))
        })?;
        log::debug!("MOCKUP {} {} -> {}", request.method, request.url, file.display());

        let body = tokio::fs::read_to_string(&file)
            .await
            .map_err(|e| TransportError::connection(&request.url, format!("{}: {}", file.display(), e)))?;
        Ok(Response::ok(request.url.clone(), body))
    }

    fn paced(&self) -> bool {
        false
    }
}
