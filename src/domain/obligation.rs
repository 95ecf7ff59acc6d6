//! Outstanding actions detected on the account.

use std::fmt;

/// Something the portal requires of the taxpayer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Obligation {
    /// A periodic form to file
    Form {
        /// Form code as the portal lists it (`211`, `955`)
        code: String,
        /// Period `YYYYMM`
        period: String,
    },
    /// A profile section that must be brought up to date
    ProfileField {
        /// Normalised key (`registro_de_contribuyentes`)
        field: String,
        /// Text shown by the portal
        label: String,
        /// Link to the update page, relative to the host
        link: String,
    },
}

impl Obligation {
    pub fn form(code: impl Into<String>, period: impl Into<String>) -> Self {
        Obligation::Form {
            code: code.into(),
            period: period.into(),
        }
    }

    pub fn profile_field(field: impl Into<String>, label: impl Into<String>, link: impl Into<String>) -> Self {
        Obligation::ProfileField {
            field: field.into(),
            label: label.into(),
            link: link.into(),
        }
    }

    /// Registry lookup key within the obligation's kind
    pub fn handler_key(&self) -> &str {
        match self {
            Obligation::Form { code, .. } => code,
            Obligation::ProfileField { field, .. } => field,
        }
    }

    pub fn is_profile(&self) -> bool {
        matches!(self, Obligation::ProfileField { .. })
    }
}

impl fmt::Display for Obligation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Obligation::Form { code, period } => write!(f, "tax form no. {} ({})", code, period),
            Obligation::ProfileField { label, .. } => write!(f, "profile data {}", label),
        }
    }
}
