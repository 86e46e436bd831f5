//! Request DTOs for the greeting API
//!
//! Defines the structure of incoming query strings and request bodies.

use serde::Deserialize;

use crate::greeting::{Locale, Params, DEFAULT_NAME};

/// Longest accepted name, in characters.
pub const MAX_NAME_LEN: usize = 256;
/// Largest accepted fill size.
pub const MAX_FILL: usize = 1_000_000;

/// Query string of GET /hello
///
/// # Fields
/// - `name`: Who to greet (defaults to "World")
/// - `locale`: `en-US` or `ru-RU` (defaults to `en-US`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HelloQuery {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub locale: Option<Locale>,
}

impl HelloQuery {
    /// Validates the query
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        match &self.name {
            Some(name) if name.chars().count() > MAX_NAME_LEN => Some(format!(
                "Name exceeds maximum length of {} characters",
                MAX_NAME_LEN
            )),
            _ => None,
        }
    }

    /// Greeting params with defaults applied.
    pub fn into_params(self) -> Params {
        let name = self
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_NAME.to_string());
        Params::new(name, self.locale.unwrap_or(Locale::EnUs))
    }
}

/// Request body for POST /fill
#[derive(Debug, Clone, Deserialize)]
pub struct FillRequest {
    /// Number of synthetic greetings to request
    pub n: usize,
}

impl FillRequest {
    pub fn validate(&self) -> Option<String> {
        if self.n > MAX_FILL {
            return Some(format!("n exceeds maximum of {}", MAX_FILL));
        }
        None
    }
}
