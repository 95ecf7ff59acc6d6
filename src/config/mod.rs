//! Configuration for file-taxes.
//!
//! Layers, lowest priority first:
//! 1. Built-in defaults
//! 2. YAML file (explicit path, ~/.config/file-taxes/file-taxes.yml or ./file-taxes.yml)
//! 3. Environment variables
//! 4. Command-line overrides

mod overrides;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::auth::Credential;
use crate::error::{FilerError, Result};
use crate::portal::DEFAULT_HOST;
use crate::session::PacingWindow;

pub use overrides::{ConfigOverrides, ENV_CAPSOLVER_API_KEY, ENV_NOPECHA_API_KEY, ENV_PASSWORD, ENV_USERNAME};

/// Prefix put in front of every notification message
pub const DEFAULT_MESSAGE_PREFIX: &str = "\u{1F1F5}\u{1F1FE} taxes\n";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub credentials: CredentialsConfig,
    pub captcha: CaptchaConfig,
    pub http: HttpConfig,
    pub notify: NotifyConfig,
    pub mockup: MockupConfig,
    pub verbose: bool,
    pub debug: bool,
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Taxpayer identifier (RUC without check digit)
    pub username: String,
    pub password: String,
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("username", &self.username)
            .field("password", &redacted(Some(&self.password)))
            .finish()
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptchaConfig {
    /// Optional for the free tier
    pub nopecha_api_key: Option<String>,
    /// Paid backend, only used when set
    pub capsolver_api_key: Option<String>,
    /// Ask on the terminal when the services fail
    pub interactive: bool,
    pub backend_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            nopecha_api_key: None,
            capsolver_api_key: None,
            interactive: false,
            backend_timeout_ms: 120_000,
            poll_interval_ms: 2_000,
        }
    }
}

impl fmt::Debug for CaptchaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptchaConfig")
            .field("nopecha_api_key", &redacted(self.nopecha_api_key.as_deref()))
            .field("capsolver_api_key", &redacted(self.capsolver_api_key.as_deref()))
            .field("interactive", &self.interactive)
            .field("backend_timeout_ms", &self.backend_timeout_ms)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub base_url: String,
    /// Netscape cookie jar carried between runs
    pub cookies_file: PathBuf,
    /// One User-Agent per line; the built-in identity is used when missing
    pub user_agents_file: PathBuf,
    /// The portal's certificate chain does not validate everywhere
    pub verify_tls: bool,
    pub timeout_ms: u64,
    pub pacing_min_ms: u64,
    pub pacing_max_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_HOST.to_string(),
            cookies_file: data_dir().join("cookies.txt"),
            user_agents_file: dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(env!("CARGO_PKG_NAME"))
                .join("user-agents.txt"),
            verify_tls: false,
            timeout_ms: 60_000,
            pacing_min_ms: 1_000,
            pacing_max_ms: 4_000,
        }
    }
}

/// Where the end-of-run summary goes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NotifyService {
    /// Console only
    #[default]
    Log,
    Pushover,
    Signal,
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub service: NotifyService,
    pub message_prefix: String,
    pub pushover_token: String,
    pub pushover_user: String,
    /// Account registered with signal-cli
    pub signal_user: String,
    pub signal_recipient: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            service: NotifyService::Log,
            message_prefix: DEFAULT_MESSAGE_PREFIX.to_string(),
            pushover_token: String::new(),
            pushover_user: String::new(),
            signal_user: String::new(),
            signal_recipient: String::new(),
        }
    }
}

impl fmt::Debug for NotifyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifyConfig")
            .field("service", &self.service)
            .field("message_prefix", &self.message_prefix)
            .field("pushover_token", &redacted(Some(&self.pushover_token)))
            .field("pushover_user", &self.pushover_user)
            .field("signal_user", &self.signal_user)
            .field("signal_recipient", &self.signal_recipient)
            .finish()
    }
}

/// Offline mode answering every request from local files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockupConfig {
    pub enabled: bool,
    pub dir: PathBuf,
}

impl Default for MockupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: PathBuf::from("mockup"),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let project_name = env!("CARGO_PKG_NAME");
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => log::warn!("Failed to load config from {}: {}", primary_config.display(), e),
                }
            }
        }

        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => log::warn!("Failed to load config from {}: {}", fallback_config.display(), e),
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| FilerError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| FilerError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        log::info!("Loaded config from: {}", path.display());
        Ok(config)
    }

    /// Apply environment variables, then command-line overrides
    pub fn resolve(mut self, overrides: &ConfigOverrides) -> Self {
        self.apply_env(|name| std::env::var(name).ok());
        overrides.apply(&mut self);
        self
    }

    /// Credential for the portal login; both parts are required
    pub fn credential(&self) -> Result<Credential> {
        let username = self.credentials.username.trim();
        if username.is_empty() || self.credentials.password.is_empty() {
            return Err(FilerError::Config(format!(
                "username and password are required (config file, {} / {} or --username / --password)",
                ENV_USERNAME, ENV_PASSWORD
            )));
        }
        Ok(Credential::new(username, self.credentials.password.clone()))
    }

    pub fn pacing_window(&self) -> PacingWindow {
        PacingWindow::from_millis(self.http.pacing_min_ms, self.http.pacing_max_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.http.timeout_ms)
    }
}

/// Per-user data directory (`~/.local/share/file-taxes` on Linux)
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(env!("CARGO_PKG_NAME"))
}

fn redacted(secret: Option<&str>) -> &'static str {
    match secret {
        Some(s) if !s.is_empty() => "<redacted>",
        _ => "<unset>",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.http.base_url, "https://marangatu.set.gov.py");
        assert!(!config.http.verify_tls);
        assert_eq!(config.http.pacing_min_ms, 1_000);
        assert_eq!(config.http.pacing_max_ms, 4_000);
        assert_eq!(config.captcha.backend_timeout_ms, 120_000);
        assert_eq!(config.notify.service, NotifyService::Log);
        assert_eq!(config.notify.message_prefix, "🇵🇾 taxes\n");
        assert!(!config.mockup.enabled);
    }

    #[test]
    fn test_load_partial_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("file-taxes.yml");
        fs::write(
            &path,
            "credentials:\n  username: \"4567890\"\nhttp:\n  pacing_min_ms: 2000\nnotify:\n  service: pushover\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.credentials.username, "4567890");
        assert_eq!(config.http.pacing_min_ms, 2000);
        assert_eq!(config.http.pacing_max_ms, 4000);
        assert_eq!(config.notify.service, NotifyService::Pushover);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("absent.yml");
        assert!(matches!(Config::load(Some(&path)), Err(FilerError::Config(_))));
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.yml");
        fs::write(&path, "http: [unterminated").unwrap();
        assert!(matches!(Config::load_from_file(&path), Err(FilerError::Config(_))));
    }

    #[test]
    fn test_credential_required() {
        let mut config = Config::default();
        assert!(matches!(config.credential(), Err(FilerError::Config(_))));

        config.credentials.username = " 4567890 ".to_string();
        config.credentials.password = "s3cret".to_string();
        assert_eq!(config.credential().unwrap().identifier(), "4567890");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut config = Config::default();
        config.credentials.password = "s3cret".to_string();
        config.captcha.capsolver_api_key = Some("CAP-123".to_string());
        config.notify.pushover_token = "tok-456".to_string();

        let debug = format!("{:?}", config);
        assert!(!debug.contains("s3cret"));
        assert!(!debug.contains("CAP-123"));
        assert!(!debug.contains("tok-456"));
        assert!(debug.contains("<redacted>"));
    }
}
