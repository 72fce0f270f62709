//! Aggregate report over a batch of records.
//!
//! [`build_report`] is a pure function of its input: building twice from the
//! same records yields equal reports that serialize identically.

use lookout_core::{FailureKind, Presence, ResultRecord, ServiceId};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

/// Counters over a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Successful records reporting an explicit not-found outcome
    pub not_found: usize,
    pub blocked: usize,
    /// Records cut short by the per-call timeout or the batch deadline
    pub timed_out: usize,
    pub total_elapsed_ms: u64,
}

/// Records of one service, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceGroup {
    pub service: ServiceId,
    pub records: Vec<ResultRecord>,
}

/// Shape of a correlated value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueShape {
    Url,
    Email,
    Handle,
}

/// Where a correlated value was seen.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Source {
    pub service: ServiceId,
    /// Payload path, e.g. `links[0]` or `owner.email`
    pub field: String,
}

/// A URL, email or handle found in one or more payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationEntry {
    pub value: String,
    pub shape: ValueShape,
    pub sources: Vec<Source>,
    /// Seen from at least two distinct services
    pub shared: bool,
}

/// Report over one batch of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub summary: Summary,
    /// Groups in order of each service's first appearance
    pub by_service: Vec<ServiceGroup>,
    /// Sorted by value
    pub correlation: Vec<CorrelationEntry>,
}

impl Report {
    /// Correlation entries seen from more than one service.
    pub fn shared_values(&self) -> impl Iterator<Item = &CorrelationEntry> {
        self.correlation.iter().filter(|entry| entry.shared)
    }

    /// Group for one service.
    #[must_use]
    pub fn group(&self, service: &ServiceId) -> Option<&ServiceGroup> {
        self.by_service.iter().find(|group| &group.service == service)
    }
}

/// Aggregate records into a [`Report`].
#[must_use]
pub fn build_report(records: &[ResultRecord]) -> Report {
    Report {
        summary: summarize(records),
        by_service: group_by_service(records),
        correlation: correlate(records),
    }
}

fn summarize(records: &[ResultRecord]) -> Summary {
    let mut summary = Summary {
        attempted: records.len(),
        ..Summary::default()
    };

    for record in records {
        summary.total_elapsed_ms = summary
            .total_elapsed_ms
            .saturating_add(u64::try_from(record.elapsed().as_millis()).unwrap_or(u64::MAX));

        match record.failure() {
            None => {
                summary.succeeded += 1;
                if record.is_not_found() {
                    summary.not_found += 1;
                }
            }
            Some(failure) => {
                summary.failed += 1;
                if failure == FailureKind::Blocked {
                    summary.blocked += 1;
                } else if failure.is_timeout() {
                    summary.timed_out += 1;
                }
            }
        }
    }

    summary
}

fn group_by_service(records: &[ResultRecord]) -> Vec<ServiceGroup> {
    let mut groups: Vec<ServiceGroup> = Vec::new();
    for record in records {
        match groups.iter_mut().find(|g| &g.service == record.service()) {
            Some(group) => group.records.push(record.clone()),
            None => groups.push(ServiceGroup {
                service: record.service().clone(),
                records: vec![record.clone()],
            }),
        }
    }
    groups
}

fn correlate(records: &[ResultRecord]) -> Vec<CorrelationEntry> {
    let mut seen: BTreeMap<(String, ValueShape), BTreeSet<Source>> = BTreeMap::new();

    // An ambiguous probe only guessed its profile URL.
    let confirmed = records
        .iter()
        .filter(|r| r.is_success() && r.presence() != Some(Presence::Ambiguous));

    for record in confirmed {
        for (key, value) in record.payload() {
            collect(value, key.clone(), &mut |path: String, text: &str| {
                if let Some((value, shape)) = shape_of(text) {
                    seen.entry((value, shape)).or_default().insert(Source {
                        service: record.service().clone(),
                        field: path,
                    });
                }
            });
        }
    }

    seen.into_iter()
        .map(|((value, shape), sources)| {
            let services: BTreeSet<&ServiceId> = sources.iter().map(|s| &s.service).collect();
            CorrelationEntry {
                value,
                shape,
                shared: services.len() >= 2,
                sources: sources.into_iter().collect(),
            }
        })
        .collect()
}

/// Visit every string under `value`, with its dotted/indexed path.
fn collect(value: &Value, path: String, visit: &mut dyn FnMut(String, &str)) {
    match value {
        Value::String(text) => visit(path, text),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                collect(item, format!("{path}[{i}]"), visit);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                collect(item, format!("{path}.{key}"), visit);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// Normalized value and shape of a string worth correlating.
fn shape_of(text: &str) -> Option<(String, ValueShape)> {
    static URL_REGEX: OnceLock<Regex> = OnceLock::new();
    static BARE_URL_REGEX: OnceLock<Regex> = OnceLock::new();
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    static HANDLE_REGEX: OnceLock<Regex> = OnceLock::new();

    let text = text.trim();

    let url = URL_REGEX.get_or_init(|| Regex::new(r"(?i)^https?://\S+$").expect("valid regex"));
    let bare_url = BARE_URL_REGEX.get_or_init(|| {
        Regex::new(r"(?i)^[a-z0-9-]+(\.[a-z0-9-]+)*\.[a-z]{2,}/\S*$").expect("valid regex")
    });
    if url.is_match(text) || bare_url.is_match(text) {
        return Some((text.trim_end_matches('/').to_string(), ValueShape::Url));
    }

    let email = EMAIL_REGEX
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[A-Za-z]{2,}$").expect("valid regex"));
    if email.is_match(text) {
        return Some((text.to_lowercase(), ValueShape::Email));
    }

    let handle =
        HANDLE_REGEX.get_or_init(|| Regex::new(r"^@[A-Za-z0-9_.]{1,30}$").expect("valid regex"));
    if handle.is_match(text) {
        return Some((text.to_lowercase(), ValueShape::Handle));
    }

    None
}
