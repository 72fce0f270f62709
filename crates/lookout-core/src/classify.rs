//! Query classification.
//!
//! The dispatcher consumes a [`QueryClassifier`] to decide which
//! [`QueryKind`] a raw query belongs to. [`PatternClassifier`] is the
//! default, shape-based implementation.

use crate::types::QueryKind;
use regex::Regex;
use std::sync::OnceLock;

/// Hosts treated as URL shorteners.
pub const SHORTENER_HOSTS: &[&str] = &[
    "bit.ly",
    "tinyurl.com",
    "t.co",
    "goo.gl",
    "ow.ly",
    "is.gd",
    "buff.ly",
];

/// File extensions treated as image resources.
pub const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp", ".bmp"];

/// Result of classifying a raw query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Exactly one kind fits.
    Known(QueryKind),
    /// Several kinds fit; the caller must declare one.
    Ambiguous(Vec<QueryKind>),
    /// No kind fits.
    Unrecognized,
}

/// Pluggable query classifier.
pub trait QueryClassifier: Send + Sync {
    /// Classify a raw query.
    fn classify(&self, raw_query: &str) -> Classification;
}

/// Shape-based classifier for usernames, emails and links.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternClassifier;

impl PatternClassifier {
    /// Create a new classifier.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn classify_url(rest: &str) -> QueryKind {
        let host = host_of(rest);
        if SHORTENER_HOSTS.contains(&host.as_str()) {
            return QueryKind::ShortLink;
        }

        let path = rest
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        if IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
            QueryKind::ImageUrl
        } else {
            QueryKind::Url
        }
    }
}

impl QueryClassifier for PatternClassifier {
    fn classify(&self, raw_query: &str) -> Classification {
        static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
        static BARE_DOMAIN_REGEX: OnceLock<Regex> = OnceLock::new();

        let query = raw_query.trim();
        if query.is_empty() {
            return Classification::Unrecognized;
        }

        let lowered = query.to_ascii_lowercase();
        for scheme in ["http://", "https://"] {
            if let Some(rest) = lowered.strip_prefix(scheme) {
                if rest.is_empty() {
                    return Classification::Unrecognized;
                }
                return Classification::Known(Self::classify_url(rest));
            }
        }

        if SHORTENER_HOSTS
            .iter()
            .any(|host| lowered.starts_with(&format!("{host}/")))
        {
            return Classification::Known(QueryKind::ShortLink);
        }

        let email = EMAIL_REGEX.get_or_init(|| {
            Regex::new(r"^[^@\s]+@[^@\s]+\.[A-Za-z]{2,}$").expect("valid regex")
        });
        if email.is_match(query) {
            return Classification::Known(QueryKind::Email);
        }

        if is_username(query) {
            let bare_domain = BARE_DOMAIN_REGEX.get_or_init(|| {
                Regex::new(r"(?i)^[a-z0-9-]+(\.[a-z0-9-]+)*\.(com|org|net|io|co|me|dev|app)$")
                    .expect("valid regex")
            });
            if bare_domain.is_match(query) {
                return Classification::Ambiguous(vec![QueryKind::Username, QueryKind::Url]);
            }
            return Classification::Known(QueryKind::Username);
        }

        Classification::Unrecognized
    }
}

/// Whether `value` has the shape of a platform username.
///
/// Only letters, digits, `_`, `.` and `-` are allowed, so a username can be
/// substituted into a profile URL path without changing which page it names.
#[must_use]
pub fn is_username(value: &str) -> bool {
    static USERNAME_REGEX: OnceLock<Regex> = OnceLock::new();
    USERNAME_REGEX
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_.-]{2,30}$").expect("valid regex"))
        .is_match(value)
}

/// Lowercased host of a scheme-less URL, without port or `www.` prefix.
fn host_of(rest: &str) -> String {
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host = authority.rsplit('@').next().unwrap_or_default();
    let host = host.split(':').next().unwrap_or_default();
    host.trim_start_matches("www.").to_ascii_lowercase()
}
