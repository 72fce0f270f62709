//! The uniform result record produced by every adapter.
//!
//! A [`ResultRecord`] is a value: it is assembled once through its
//! constructors and `with_*` methods and never changed afterwards. A retry
//! produces a new record rather than editing the previous one.

use crate::types::{FailureKind, Presence, QueryKind, ServiceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Adapter-specific extracted fields.
pub type Payload = serde_json::Map<String, Value>;

/// Payload key carrying a [`Presence`] marker.
pub const PRESENCE_KEY: &str = "presence";

/// Payload key carrying the profile URL of a found account.
pub const PROFILE_URL_KEY: &str = "profile_url";

/// Outcome of one adapter invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    service: ServiceId,
    query: String,
    query_kind: QueryKind,
    success: bool,
    payload: Payload,
    error: Option<String>,
    failure: Option<FailureKind>,
    status_code: Option<u16>,
    #[serde(with = "duration_ms", rename = "elapsed_ms")]
    elapsed: Duration,
    attempts: u32,
    timestamp: DateTime<Utc>,
}

impl ResultRecord {
    fn base(service: ServiceId, query: impl Into<String>, query_kind: QueryKind) -> Self {
        Self {
            service,
            query: query.into(),
            query_kind,
            success: true,
            payload: Payload::new(),
            error: None,
            failure: None,
            status_code: None,
            elapsed: Duration::ZERO,
            attempts: 1,
            timestamp: Utc::now(),
        }
    }

    /// A successful lookup carrying extracted fields.
    #[must_use]
    pub fn success(
        service: ServiceId,
        query: impl Into<String>,
        query_kind: QueryKind,
        payload: Payload,
    ) -> Self {
        Self {
            payload,
            ..Self::base(service, query, query_kind)
        }
    }

    /// A successful probe that proved the query does not exist on the service.
    ///
    /// This is not a failure: `success` is true and the payload carries
    /// `presence = "not_found"`.
    #[must_use]
    pub fn not_found(service: ServiceId, query: impl Into<String>, query_kind: QueryKind) -> Self {
        let mut payload = Payload::new();
        payload.insert(PRESENCE_KEY.to_string(), presence_value(Presence::NotFound));
        Self::success(service, query, query_kind, payload)
    }

    /// A failed lookup.
    #[must_use]
    pub fn failed(
        service: ServiceId,
        query: impl Into<String>,
        query_kind: QueryKind,
        kind: FailureKind,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            failure: Some(kind),
            ..Self::base(service, query, query_kind)
        }
    }

    /// Attribute the record to `query`.
    ///
    /// Used when a record produced for one spelling of a query answers
    /// another that normalizes to the same lookup.
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// Attach the transport-level status code.
    #[must_use]
    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// Set the wall-clock duration covered by this record.
    #[must_use]
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    /// Set the number of attempts that led to this record.
    #[must_use]
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Identifier of the adapter that produced the record.
    #[must_use]
    pub fn service(&self) -> &ServiceId {
        &self.service
    }

    /// The query as it was dispatched.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// The kind the query was dispatched as.
    #[must_use]
    pub fn query_kind(&self) -> QueryKind {
        self.query_kind
    }

    /// Whether the lookup reached a definitive answer.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Adapter-specific extracted fields.
    #[must_use]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Human-readable failure description, present iff the record failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Failure classification, present iff the record failed.
    #[must_use]
    pub fn failure(&self) -> Option<FailureKind> {
        self.failure
    }

    /// Transport-level status, when the adapter saw one.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Wall-clock duration, including every retry.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Number of attempts made.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Creation instant.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The presence marker in the payload, if the adapter set one.
    #[must_use]
    pub fn presence(&self) -> Option<Presence> {
        self.payload
            .get(PRESENCE_KEY)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// The profile URL in the payload, if the adapter set one.
    #[must_use]
    pub fn profile_url(&self) -> Option<&str> {
        self.payload.get(PROFILE_URL_KEY).and_then(Value::as_str)
    }

    /// Whether this is a successful "not found" outcome.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.success && self.presence() == Some(Presence::NotFound)
    }

    /// Whether the service explicitly rejected the lookup.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.failure == Some(FailureKind::Blocked)
    }
}

/// JSON value for a presence marker.
#[must_use]
pub fn presence_value(presence: Presence) -> Value {
    match presence {
        Presence::Found => Value::from("found"),
        Presence::NotFound => Value::from("not_found"),
        Presence::Ambiguous => Value::from("ambiguous"),
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[allow(clippy::cast_possible_truncation)]
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> ServiceId {
        ServiceId::new("github").expect("valid service ID")
    }

    #[test]
    fn test_success_record() {
        let mut payload = Payload::new();
        payload.insert("followers".to_string(), Value::from(12));

        let record = ResultRecord::success(service(), "octocat", QueryKind::Username, payload)
            .with_status(200);

        assert!(record.is_success());
        assert!(record.error().is_none());
        assert!(record.failure().is_none());
        assert_eq!(record.status_code(), Some(200));
        assert_eq!(record.payload()["followers"], 12);
        assert_eq!(record.attempts(), 1);
    }

    #[test]
    fn test_not_found_is_success() {
        let record = ResultRecord::not_found(service(), "nobody", QueryKind::Username);

        assert!(record.is_success());
        assert!(record.is_not_found());
        assert!(record.error().is_none());
        assert_eq!(record.presence(), Some(Presence::NotFound));
    }

    #[test]
    fn test_failure_record_has_reason() {
        let record = ResultRecord::failed(
            service(),
            "octocat",
            QueryKind::Username,
            FailureKind::Blocked,
            "HTTP 429",
        )
        .with_status(429);

        assert!(!record.is_success());
        assert!(record.is_blocked());
        assert_eq!(record.error(), Some("HTTP 429"));
        assert!(!record.is_not_found());
    }

    #[test]
    fn test_with_query_keeps_outcome() {
        let record = ResultRecord::not_found(service(), "octocat", QueryKind::Username)
            .with_attempts(2)
            .with_query("OctoCat");

        assert_eq!(record.query(), "OctoCat");
        assert!(record.is_not_found());
        assert_eq!(record.attempts(), 2);
    }

    #[test]
    fn test_presence_value_matches_serde() {
        for presence in [Presence::Found, Presence::NotFound, Presence::Ambiguous] {
            let via_serde = serde_json::to_value(presence).expect("serialize presence");
            assert_eq!(presence_value(presence), via_serde);
        }
    }

    #[test]
    fn test_elapsed_serializes_as_millis() {
        let record = ResultRecord::not_found(service(), "nobody", QueryKind::Username)
            .with_elapsed(Duration::from_millis(1500));

        let json = serde_json::to_value(&record).expect("serialize record");
        assert_eq!(json["elapsed_ms"], 1500);

        let back: ResultRecord = serde_json::from_value(json).expect("deserialize record");
        assert_eq!(back.elapsed(), Duration::from_millis(1500));
    }
}
