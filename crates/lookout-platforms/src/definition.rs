//! Platform definition types.
//!
//! A platform definition describes how to probe one site for an account:
//! where the profile page lives and which page text proves the account
//! exists or does not.

use crate::error::{PlatformError, Result};
use lookout_core::ServiceId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Placeholder substituted with the identifier in `url_template`.
pub const IDENTIFIER_PLACEHOLDER: &str = "{}";

/// Complete platform definition loaded from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformDefinition {
    /// Core platform metadata
    pub platform: PlatformMetadata,

    /// Page-content rules for deciding existence
    pub indicators: Indicators,
}

/// Core platform metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformMetadata {
    /// Unique platform identifier (e.g., "github", "reddit")
    pub id: ServiceId,

    /// Human-readable platform name
    pub name: String,

    /// Profile URL with a `{}` placeholder for the identifier
    pub url_template: String,

    /// Minimum interval between requests, overriding the dispatcher default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_interval_ms: Option<u64>,
}

/// Case-insensitive substrings that settle whether a profile exists.
///
/// Not-found indicators are checked before found indicators, so a page
/// containing both is treated as not found.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Indicators {
    /// Text proving the profile exists
    pub found: Vec<String>,
    /// Text proving the profile does not exist
    pub not_found: Vec<String>,
}

impl PlatformDefinition {
    /// Get the platform ID.
    #[must_use]
    pub fn id(&self) -> &ServiceId {
        &self.platform.id
    }

    /// Get the platform name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.platform.name
    }

    /// Per-platform rate-limit interval, if the definition sets one.
    #[must_use]
    pub fn min_interval(&self) -> Option<Duration> {
        self.platform.min_interval_ms.map(Duration::from_millis)
    }

    /// Build the profile URL for an identifier.
    #[must_use]
    pub fn profile_url(&self, identifier: &str) -> String {
        self.platform
            .url_template
            .replacen(IDENTIFIER_PLACEHOLDER, identifier.trim(), 1)
    }

    /// Validate the definition for completeness and correctness.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| PlatformError::ValidationError {
            platform_id: self.platform.id.to_string(),
            reason: reason.to_string(),
        };

        if self.platform.name.trim().is_empty() {
            return Err(invalid("platform name cannot be empty"));
        }

        let template = &self.platform.url_template;
        if !(template.starts_with("https://") || template.starts_with("http://")) {
            return Err(invalid("url_template must be an http(s) URL"));
        }

        if template.matches(IDENTIFIER_PLACEHOLDER).count() != 1 {
            return Err(invalid("url_template must contain exactly one {} placeholder"));
        }

        if self.indicators.found.is_empty() {
            return Err(invalid("at least one found indicator is required"));
        }

        let mut all = self.indicators.found.iter().chain(&self.indicators.not_found);
        if all.any(|indicator| indicator.trim().is_empty()) {
            return Err(invalid("indicators cannot be blank"));
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn create_test_definition(id: &str) -> PlatformDefinition {
        PlatformDefinition {
            platform: PlatformMetadata {
                id: ServiceId::new(id).expect("valid platform ID"),
                name: format!("Test {id}"),
                url_template: format!("https://{id}.example.com/u/{{}}"),
                min_interval_ms: None,
            },
            indicators: Indicators {
                found: vec!["followers".to_string()],
                not_found: vec!["page not found".to_string()],
            },
        }
    }

    #[test]
    fn test_valid_definition() {
        let definition = create_test_definition("test-platform");
        assert!(definition.validate().is_ok());
        assert_eq!(
            definition.profile_url(" octocat "),
            "https://test-platform.example.com/u/octocat"
        );
    }

    #[test]
    fn test_template_without_placeholder() {
        let mut definition = create_test_definition("test-platform");
        definition.platform.url_template = "https://example.com/u/".to_string();

        let err = definition.validate().expect_err("template must be rejected");
        assert!(err.to_string().contains("placeholder"));
    }

    #[test]
    fn test_template_with_two_placeholders() {
        let mut definition = create_test_definition("test-platform");
        definition.platform.url_template = "https://example.com/{}/{}".to_string();
        assert!(definition.validate().is_err());
    }

    #[test]
    fn test_requires_found_indicator() {
        let mut definition = create_test_definition("test-platform");
        definition.indicators.found.clear();
        assert!(definition.validate().is_err());
    }

    #[test]
    fn test_blank_indicator_rejected() {
        let mut definition = create_test_definition("test-platform");
        definition.indicators.not_found.push("  ".to_string());
        assert!(definition.validate().is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
[platform]
id = "github"
name = "GitHub"
url_template = "https://github.com/{}"
min_interval_ms = 1500

[indicators]
found = ["contributions"]
not_found = ["Not Found"]
"#;

        let definition: PlatformDefinition = toml::from_str(toml_str).expect("parse definition");
        assert_eq!(definition.id().as_str(), "github");
        assert_eq!(definition.min_interval(), Some(Duration::from_millis(1500)));
        assert!(definition.validate().is_ok());
    }
}
