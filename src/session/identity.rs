//! User-agent identity pool.
//!
//! One identity per line; a fresh one is picked uniformly at random for
//! every request.

use std::fs;
use std::path::Path;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::error::{FilerError, Result};

/// Identity used when no pool file exists
pub const DEFAULT_IDENTITY: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                                    AppleWebKit/537.36 (KHTML, like Gecko) \
                                    Chrome/120.0.0.0 Safari/537.36";

/// Non-empty pool of user-agent strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityPool {
    identities: Vec<String>,
}

impl IdentityPool {
    /// Build a pool; an empty list is a configuration error
    pub fn new(identities: Vec<String>) -> Result<Self> {
        let identities: Vec<String> = identities
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if identities.is_empty() {
            return Err(FilerError::Config("identity pool is empty".to_string()));
        }
        Ok(Self { identities })
    }

    /// Pool holding only the built-in identity
    pub fn builtin() -> Self {
        Self {
            identities: vec![DEFAULT_IDENTITY.to_string()],
        }
    }

    /// Load the pool file
    ///
    /// A missing file falls back to the built-in identity; a file with no
    /// usable lines is fatal.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::warn!("Identity pool {} not found, using built-in identity", path.display());
            return Ok(Self::builtin());
        }
        let text = fs::read_to_string(path)?;
        let pool = Self::new(text.lines().map(str::to_string).collect()).map_err(|_| {
            FilerError::Config(format!("identity pool file {} is empty", path.display()))
        })?;
        log::info!("Loaded {} identities from {}", pool.len(), path.display());
        Ok(pool)
    }

    /// Pick an identity uniformly at random
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        self.identities
            .choose(rng)
            .map(String::as_str)
            .unwrap_or(DEFAULT_IDENTITY)
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.identities.iter().any(|i| i == identity)
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}
