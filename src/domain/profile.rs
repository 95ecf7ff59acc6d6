//! Public profile of the logged-in taxpayer.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Profile {
    /// Taxpayer number
    #[serde(rename = "rucActivo", default, deserialize_with = "lenient_string")]
    pub ruc: String,

    /// Check digit
    #[serde(rename = "dvActivo", default, deserialize_with = "lenient_string")]
    pub dv: String,

    /// Full name, surname first
    #[serde(rename = "nombre", default, deserialize_with = "lenient_string")]
    pub name: String,
}

impl Profile {
    /// Name to greet with: the second word when there is one
    pub fn first_name(&self) -> &str {
        let mut words = self.name.split_whitespace();
        let first = words.next();
        words.next().or(first).unwrap_or("User")
    }
}

/// Strings the portal sometimes sends as numbers or nulls
pub(crate) fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}
