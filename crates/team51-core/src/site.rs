//! Site references.
//!
//! Most commands accept a site either as a numeric ID or as a domain. The
//! providers differ in which form they accept, so the distinction is kept
//! until a client resolves it.

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A site identified by numeric ID or by domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(untagged)]
pub enum SiteRef {
    #[display("{_0}")]
    Id(u64),
    #[display("{_0}")]
    Domain(String),
}

impl SiteRef {
    /// Parse user input into a site reference.
    ///
    /// All-digit input is an ID. Anything else is treated as a domain with
    /// the URL scheme, path and trailing slash removed.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("site must not be empty".to_string()));
        }

        if trimmed.chars().all(|c| c.is_ascii_digit()) {
            return trimmed
                .parse::<u64>()
                .map(SiteRef::Id)
                .map_err(|e| Error::InvalidInput(format!("invalid site ID {}: {}", trimmed, e)));
        }

        let without_scheme = trimmed
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(trimmed);
        let host = without_scheme
            .split('/')
            .next()
            .unwrap_or(without_scheme)
            .to_lowercase();

        if host.is_empty() || host.contains(char::is_whitespace) {
            return Err(Error::InvalidInput(format!("invalid site: {}", input)));
        }

        Ok(SiteRef::Domain(host))
    }

    pub fn is_id(&self) -> bool {
        matches!(self, SiteRef::Id(_))
    }

    pub fn as_domain(&self) -> Option<&str> {
        match self {
            SiteRef::Id(_) => None,
            SiteRef::Domain(domain) => Some(domain),
        }
    }

    /// Whether a URL or bare host refers to this site's domain.
    pub fn matches_url(&self, url: &str) -> bool {
        match (self, SiteRef::parse(url)) {
            (SiteRef::Domain(domain), Ok(SiteRef::Domain(other))) => {
                other == *domain || other.trim_start_matches("www.") == domain.trim_start_matches("www.")
            }
            _ => false,
        }
    }
}

impl std::str::FromStr for SiteRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Returns `"is_coming_soon"` when the WordPress.com site object has its
/// `is_coming_soon` flag set, and an empty string otherwise.
pub fn eval_is_coming_soon(site: &serde_json::Value) -> &'static str {
    match site.get("is_coming_soon").and_then(|v| v.as_bool()) {
        Some(true) => "is_coming_soon",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_numeric_id() {
        assert_eq!(SiteRef::parse("123456").unwrap(), SiteRef::Id(123456));
        assert!(SiteRef::parse("123456").unwrap().is_id());
    }

    #[test]
    fn test_parse_domain_strips_scheme_and_path() {
        let site = SiteRef::parse("https://Example.com/wp-admin/").unwrap();
        assert_eq!(site, SiteRef::Domain("example.com".to_string()));
        assert_eq!(site.as_domain(), Some("example.com"));
        assert_eq!(site.to_string(), "example.com");
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(SiteRef::parse("   ").is_err());
        assert!(SiteRef::parse("https://").is_err());
    }

    #[test]
    fn test_matches_url_ignores_www() {
        let site = SiteRef::parse("example.com").unwrap();
        assert!(site.matches_url("https://www.example.com"));
        assert!(site.matches_url("example.com/"));
        assert!(!site.matches_url("other.com"));
        assert!(!SiteRef::Id(1).matches_url("example.com"));
    }

    #[test]
    fn test_eval_is_coming_soon_true() {
        let site = json!({ "ID": 1, "is_coming_soon": true });
        assert_eq!(eval_is_coming_soon(&site), "is_coming_soon");
    }

    #[test]
    fn test_eval_is_coming_soon_false_or_missing() {
        assert_eq!(eval_is_coming_soon(&json!({ "is_coming_soon": false })), "");
        assert_eq!(eval_is_coming_soon(&json!({ "ID": 1 })), "");
        assert_eq!(eval_is_coming_soon(&json!({ "is_coming_soon": "yes" })), "");
    }
}
