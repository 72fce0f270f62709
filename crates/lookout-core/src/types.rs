//! Shared types used across the Lookout workspace.
//!
//! This module defines the newtypes and enums that every other crate speaks:
//! service identifiers, query kinds, adapter categories and the failure
//! taxonomy carried by result records.

use crate::error::LookoutError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Newtype for service identifiers with validation.
///
/// Service IDs name one adapter (a lookup service or a bulk-verification
/// platform). They must be lowercase alphanumeric with hyphens, 3-50 characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceId(String);

impl ServiceId {
    /// Create a new `ServiceId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID doesn't match the required format.
    pub fn new(id: impl Into<String>) -> Result<Self, LookoutError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate service ID format: lowercase alphanumeric with hyphens, 3-50 chars.
    fn validate(id: &str) -> Result<(), LookoutError> {
        static SERVICE_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = SERVICE_REGEX
            .get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9-]{1,48}[a-z0-9]$").expect("valid regex"));

        if id.len() < 3 || id.len() > 50 {
            return Err(LookoutError::Validation(format!(
                "invalid service ID: must be 3-50 characters, got {} characters",
                id.len()
            )));
        }

        if regex.is_match(id) {
            Ok(())
        } else {
            Err(LookoutError::Validation(format!(
                "invalid service ID: must be lowercase alphanumeric with hyphens, got '{id}'"
            )))
        }
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ServiceId {
    type Error = LookoutError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ServiceId> for String {
    fn from(id: ServiceId) -> Self {
        id.0
    }
}

impl FromStr for ServiceId {
    type Err = LookoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Classified category of an input query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// A handle or account name (`johndoe`)
    Username,
    /// An email address
    Email,
    /// A URL that points at an image resource
    ImageUrl,
    /// A link on a known URL-shortener host
    ShortLink,
    /// Any other absolute URL
    Url,
}

impl QueryKind {
    /// All kinds, in declaration order.
    pub const ALL: [QueryKind; 5] = [
        Self::Username,
        Self::Email,
        Self::ImageUrl,
        Self::ShortLink,
        Self::Url,
    ];

    /// Stable snake-case name, used in config keys and logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Username => "username",
            Self::Email => "email",
            Self::ImageUrl => "image_url",
            Self::ShortLink => "short_link",
            Self::Url => "url",
        }
    }

    /// Whether queries of this kind are case-insensitive identifiers.
    ///
    /// Identifier kinds are lowercased when building cache fingerprints.
    #[must_use]
    pub fn is_identifier(&self) -> bool {
        matches!(self, Self::Username | Self::Email)
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryKind {
    type Err = LookoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| LookoutError::Validation(format!("unknown query kind '{s}'")))
    }
}

/// Category an adapter belongs to, used to filter dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    /// Social media profile lookups
    Social,
    /// Reverse image search and image metadata
    Image,
    /// Link expansion and URL utilities
    Utility,
    /// Bulk per-platform existence probes
    Platform,
}

impl Category {
    /// Get a human-readable display name.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Social => "Social Media",
            Self::Image => "Image Analysis",
            Self::Utility => "Utility",
            Self::Platform => "Platform Check",
        }
    }
}

impl FromStr for Category {
    type Err = LookoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "social" => Ok(Self::Social),
            "image" => Ok(Self::Image),
            "utility" => Ok(Self::Utility),
            "platform" => Ok(Self::Platform),
            _ => Err(LookoutError::Validation(format!("unknown category '{s}'"))),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Why a result record failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Timeout, refused connection or server error on one attempt. Retryable.
    Transport,
    /// The service explicitly rejected the request (HTTP 403/429, CAPTCHA wall).
    Blocked,
    /// The per-call timeout elapsed before the adapter finished.
    Timeout,
    /// The batch deadline elapsed before the adapter finished.
    Deadline,
    /// Transport failures persisted through every allowed attempt.
    Exhausted,
    /// Non-retryable adapter failure (unparseable response, adapter panic).
    Adapter,
}

impl FailureKind {
    /// Whether a record with this failure may be retried at all.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport | Self::Blocked)
    }

    /// Whether the failure stems from running out of time.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout | Self::Deadline)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Transport => "transport",
            Self::Blocked => "blocked",
            Self::Timeout => "timeout",
            Self::Deadline => "deadline",
            Self::Exhausted => "exhausted",
            Self::Adapter => "adapter",
        };
        f.write_str(name)
    }
}

/// Existence marker an adapter places in a successful record's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    /// An explicit success indicator was observed
    Found,
    /// An explicit not-found indicator was observed
    NotFound,
    /// The response carried neither indicator
    Ambiguous,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_id_valid() {
        let valid_ids = vec!["github", "reverse-image", "tinyurl-expander", "abc"];

        for id in valid_ids {
            assert!(ServiceId::new(id).is_ok(), "Failed for: {id}");
        }
    }

    #[test]
    fn test_service_id_invalid() {
        let too_long = "a".repeat(51);
        let invalid_ids = vec![
            "gh",              // Too short
            "GitHub",          // Uppercase
            "you_tube",        // Underscore
            "red dit",         // Space
            "-github",         // Starts with hyphen
            "github-",         // Ends with hyphen
            too_long.as_str(), // Too long
        ];

        for id in invalid_ids {
            assert!(ServiceId::new(id).is_err(), "Should fail for: {id}");
        }
    }

    #[test]
    fn test_service_id_serde_validates() {
        let id: ServiceId = serde_json::from_str("\"github\"").expect("deserialize service ID");
        assert_eq!(id.as_str(), "github");

        let bad: Result<ServiceId, _> = serde_json::from_str("\"Not Valid\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_query_kind_round_trip_names() {
        for kind in QueryKind::ALL {
            assert_eq!(kind.as_str().parse::<QueryKind>().expect("parse kind"), kind);
        }
        assert!("phone".parse::<QueryKind>().is_err());
    }

    #[test]
    fn test_query_kind_serialization() {
        let json = serde_json::to_string(&QueryKind::ImageUrl).expect("serialize kind");
        assert_eq!(json, "\"image_url\"");
    }

    #[test]
    fn test_identifier_kinds() {
        assert!(QueryKind::Username.is_identifier());
        assert!(QueryKind::Email.is_identifier());
        assert!(!QueryKind::Url.is_identifier());
    }

    #[test]
    fn test_category_from_str_matches_serde() {
        let category: Category = "utility".parse().expect("known category");
        assert_eq!(category, Category::Utility);
        assert_eq!(
            serde_json::to_string(&category).expect("serialize category"),
            "\"utility\""
        );
        assert!("people-search".parse::<Category>().is_err());
    }

    #[test]
    fn test_failure_kind_retryable() {
        assert!(FailureKind::Transport.is_retryable());
        assert!(FailureKind::Blocked.is_retryable());
        assert!(!FailureKind::Timeout.is_retryable());
        assert!(!FailureKind::Exhausted.is_retryable());
        assert!(FailureKind::Deadline.is_timeout());
    }
}
