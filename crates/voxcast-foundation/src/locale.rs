//! BCP-47-style locale tags.
//!
//! Engines report the locales they can speak as tags like `en-US` or
//! `de`. The tag is normalized on construction (language lowercased,
//! region uppercased) so values from different engines compare equal.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locale(String);

impl Locale {
    /// Build a locale from a tag such as `en-US`, `en_US` or `de`.
    ///
    /// Underscore separators (common in POSIX `LANG` values) are
    /// accepted and normalized to hyphens.
    pub fn new(tag: impl AsRef<str>) -> Self {
        let tag = tag.as_ref().trim();
        let mut parts = tag.splitn(2, ['-', '_']);
        let language = parts.next().unwrap_or_default().to_ascii_lowercase();
        match parts.next() {
            Some(region) if !region.is_empty() => {
                Locale(format!("{}-{}", language, region.to_ascii_uppercase()))
            }
            _ => Locale(language),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The primary language subtag, e.g. `en` for `en-US`.
    pub fn language(&self) -> &str {
        self.0.split('-').next().unwrap_or(&self.0)
    }

    /// The region subtag if present, e.g. `US` for `en-US`.
    pub fn region(&self) -> Option<&str> {
        self.0.split('-').nth(1)
    }

    /// Whether both locales share the same primary language.
    pub fn matches_language(&self, other: &Locale) -> bool {
        self.language() == other.language()
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Locale {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Locale::new(s))
    }
}

impl Default for Locale {
    /// The system locale, falling back to `en-US` when the environment
    /// gives no usable answer.
    fn default() -> Self {
        system_locale()
    }
}

/// Detect the system locale from the environment.
///
/// Checks `LC_ALL`, `LC_MESSAGES` and `LANG` in that order, the usual
/// POSIX precedence. Values like `en_US.UTF-8` have their codeset
/// suffix stripped. `C` and `POSIX` are treated as no answer.
pub fn system_locale() -> Locale {
    for var in ["LC_ALL", "LC_MESSAGES", "LANG"] {
        if let Ok(value) = std::env::var(var) {
            let tag = value.split('.').next().unwrap_or_default();
            if tag.is_empty() || tag == "C" || tag == "POSIX" {
                continue;
            }
            tracing::debug!("System locale {} from {}", tag, var);
            return Locale::new(tag);
        }
    }
    Locale::new("en-US")
}
