//! Environment and command-line overrides.

use std::path::PathBuf;

use super::{Config, NotifyService};

pub const ENV_USERNAME: &str = "FILE_TAXES_USERNAME";
pub const ENV_PASSWORD: &str = "FILE_TAXES_PASSWORD";
pub const ENV_NOPECHA_API_KEY: &str = "NOPECHA_API_KEY";
pub const ENV_CAPSOLVER_API_KEY: &str = "CAPSOLVER_API_KEY";

impl Config {
    /// Apply environment variables; empty values are ignored
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(username) = var(ENV_USERNAME) {
            self.credentials.username = username;
        }
        if let Some(password) = var(ENV_PASSWORD) {
            self.credentials.password = password;
        }
        if let Some(key) = var(ENV_NOPECHA_API_KEY) {
            self.captcha.nopecha_api_key = Some(key);
        }
        if let Some(key) = var(ENV_CAPSOLVER_API_KEY) {
            self.captcha.capsolver_api_key = Some(key);
        }
    }
}

/// Values given on the command line; `None`/`false` leaves the config alone
#[derive(Clone, Default)]
pub struct ConfigOverrides {
    pub username: Option<String>,
    pub password: Option<String>,
    pub nopecha_api_key: Option<String>,
    pub capsolver_api_key: Option<String>,
    pub interactive_captcha: bool,
    pub notification_service: Option<NotifyService>,
    pub message_prefix: Option<String>,
    pub mockup: bool,
    pub mockup_dir: Option<PathBuf>,
    pub verify_tls: bool,
    pub verbose: bool,
    pub debug: bool,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(username) = &self.username {
            config.credentials.username = username.clone();
        }
        if let Some(password) = &self.password {
            config.credentials.password = password.clone();
        }
        if let Some(key) = &self.nopecha_api_key {
            config.captcha.nopecha_api_key = Some(key.clone());
        }
        if let Some(key) = &self.capsolver_api_key {
            config.captcha.capsolver_api_key = Some(key.clone());
        }
        if let Some(service) = self.notification_service {
            config.notify.service = service;
        }
        if let Some(prefix) = &self.message_prefix {
            config.notify.message_prefix = prefix.clone();
        }
        if let Some(dir) = &self.mockup_dir {
            config.mockup.dir = dir.clone();
            config.mockup.enabled = true;
        }

        config.captcha.interactive |= self.interactive_captcha;
        config.mockup.enabled |= self.mockup;
        config.http.verify_tls |= self.verify_tls;
        config.verbose |= self.verbose;
        config.debug |= self.debug;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = Config::default();
        config.credentials.username = "1111111".to_string();
        config.apply_env(env(&[
            (ENV_USERNAME, "4567890"),
            (ENV_PASSWORD, "s3cret"),
            (ENV_CAPSOLVER_API_KEY, "CAP-123"),
            (ENV_NOPECHA_API_KEY, ""),
        ]));

        assert_eq!(config.credentials.username, "4567890");
        assert_eq!(config.credentials.password, "s3cret");
        assert_eq!(config.captcha.capsolver_api_key.as_deref(), Some("CAP-123"));
        assert_eq!(config.captcha.nopecha_api_key, None);
    }

    #[test]
    fn test_cli_beats_env() {
        let mut config = Config::default();
        config.apply_env(env(&[(ENV_USERNAME, "4567890")]));
        let overrides = ConfigOverrides {
            username: Some("7654321".to_string()),
            notification_service: Some(NotifyService::Signal),
            ..Default::default()
        };
        overrides.apply(&mut config);

        assert_eq!(config.credentials.username, "7654321");
        assert_eq!(config.notify.service, NotifyService::Signal);
    }

    #[test]
    fn test_flags_only_switch_on() {
        let mut config = Config::default();
        config.http.verify_tls = true;
        ConfigOverrides::default().apply(&mut config);
        assert!(config.http.verify_tls);
        assert!(!config.mockup.enabled);
    }

    #[test]
    fn test_mockup_dir_enables_mockup() {
        let mut config = Config::default();
        let overrides = ConfigOverrides {
            mockup_dir: Some(PathBuf::from("/tmp/portal")),
            ..Default::default()
        };
        overrides.apply(&mut config);
        assert!(config.mockup.enabled);
        assert_eq!(config.mockup.dir, PathBuf::from("/tmp/portal"));
    }
}
