//! Greeting Module
//!
//! The upstream computation behind the cache: greeting a name in a locale.

mod maker;

pub use maker::{fill, CachedMaker, GreetingError, Maker, SimpleMaker, FILL_NAME_PREFIX};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cache::CacheKey;

/// Name used when a request does not provide one.
pub const DEFAULT_NAME: &str = "World";

// == Locale ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Locale {
    #[serde(rename = "en-US")]
    EnUs,
    #[serde(rename = "ru-RU")]
    RuRu,
}

impl Locale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::EnUs => "en-US",
            Locale::RuRu => "ru-RU",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Params ==
/// Greeting input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Params {
    pub name: String,
    pub locale: Locale,
}

impl Params {
    pub fn new(name: impl Into<String>, locale: Locale) -> Self {
        Self {
            name: name.into(),
            locale,
        }
    }

    /// Deterministic cache key for these params.
    ///
    /// Locales never contain ':', so the first ':' always separates the two
    /// fields and distinct params never share a key.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::from(format!("{}:{}", self.locale, self.name))
    }
}
