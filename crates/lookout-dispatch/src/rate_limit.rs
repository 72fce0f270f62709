//! Per-service request pacing.
//!
//! Every service has its own gate. Callers targeting the same service queue
//! on that gate (FIFO, via `tokio::sync::Mutex`) and each one is released no
//! earlier than the configured interval after the previous dispatch. Callers
//! targeting different services only share a brief map lookup.

use crate::error::Result;
use lookout_core::{RateLimitConfig, ServiceId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

type Gate = Arc<tokio::sync::Mutex<Option<Instant>>>;

/// Rate limiter keyed by service.
#[derive(Debug)]
pub struct RateLimiter {
    default_interval: Duration,
    intervals: HashMap<ServiceId, Duration>,
    gates: Mutex<HashMap<ServiceId, Gate>>,
}

impl RateLimiter {
    /// Create a limiter applying `default_interval` to every service.
    #[must_use]
    pub fn new(default_interval: Duration) -> Self {
        Self {
            default_interval,
            intervals: HashMap::new(),
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Build a limiter from configuration.
    ///
    /// # Errors
    /// Returns error if a configured service ID is malformed.
    pub fn from_config(config: &RateLimitConfig) -> Result<Self> {
        let mut limiter = Self::new(config.default_interval());
        for (service, ms) in &config.services {
            let service = ServiceId::new(service.as_str())?;
            limiter = limiter.with_interval(service, Duration::from_millis(*ms));
        }
        Ok(limiter)
    }

    /// Override the interval for one service.
    #[must_use]
    pub fn with_interval(mut self, service: ServiceId, interval: Duration) -> Self {
        self.intervals.insert(service, interval);
        self
    }

    /// The minimum interval enforced for `service`.
    #[must_use]
    pub fn interval_for(&self, service: &ServiceId) -> Duration {
        self.intervals
            .get(service)
            .copied()
            .unwrap_or(self.default_interval)
    }

    /// Wait until a request to `service` is permitted, then record it.
    ///
    /// Returns the recorded dispatch instant. Two instants returned for the
    /// same service are never closer together than its interval.
    pub async fn acquire(&self, service: &ServiceId) -> Instant {
        let gate = self.gate(service);
        let mut last = gate.lock().await;

        if let Some(previous) = *last {
            let ready_at = previous + self.interval_for(service);
            if ready_at > Instant::now() {
                tracing::trace!(service = %service, "waiting for rate limit");
                tokio::time::sleep_until(ready_at).await;
            }
        }

        let now = Instant::now();
        *last = Some(now);
        now
    }

    fn gate(&self, service: &ServiceId) -> Gate {
        let mut gates = self.gates.lock().expect("acquire rate limiter gates");
        Arc::clone(gates.entry(service.clone()).or_default())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default().default_interval())
    }
}
