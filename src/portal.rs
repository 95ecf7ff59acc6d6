//! Portal endpoints and page markers.

use serde_json::Value;
use url::form_urlencoded::byte_serialize;

use crate::codec::{self, CodecError};

/// Production portal host
pub const DEFAULT_HOST: &str = "https://marangatu.set.gov.py";

/// Present on every page of an authenticated session
pub const LOGOUT_MARKER: &str = "/eset/logout";

/// Login rejected because of the credentials
pub const BAD_CREDENTIALS_MARKER: &str = "Usuario o Contraseña incorrectos";

/// Login rejected because of the captcha answer
pub const CAPTCHA_REJECTED_MARKER: &str = "Código de Seguridad no es correcto";

pub const PROFILE: &str = "perfil/publico";
pub const PROFILE_CONTROLS: &str = "perfil/informacionControlesPerfil";
pub const PENDING_FORMS: &str = "perfil/vencimientos";
pub const MENU: &str = "perfil/menu";

/// URL builder for one portal host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Portal {
    host: String,
}

impl Default for Portal {
    fn default() -> Self {
        Self::new(DEFAULT_HOST)
    }
}

impl Portal {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Application root, also the session check page
    pub fn base(&self) -> String {
        format!("{}/eset", self.host)
    }

    pub fn login_page(&self) -> String {
        format!("{}/eset/login", self.host)
    }

    /// Login page re-presenting the challenge after a failed attempt
    pub fn login_retry_page(&self, identifier: &str) -> String {
        let usuario: String = byte_serialize(identifier.as_bytes()).collect();
        format!("{}/eset/login?login_error=2&usuario={}", self.host, usuario)
    }

    pub fn authenticate(&self) -> String {
        format!("{}/authenticate", self.base())
    }

    /// Endpoint relative to the application root
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base(), path.trim_start_matches('/'))
    }

    /// Endpoint carrying `args` in the token parameter
    pub fn token_url(&self, path: &str, args: &Value) -> Result<String, CodecError> {
        Ok(format!("{}?{}", self.endpoint(path), codec::token_query(args)?))
    }

    /// Absolute path on the host (`/eset/...` links handed out by the portal)
    pub fn on_host(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.host, path)
        } else {
            format!("{}/{}", self.host, path)
        }
    }
}
