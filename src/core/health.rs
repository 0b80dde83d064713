//! Per-source health statistics and circuit breaking.
//!
//! Every upstream quote source reports the outcome of each call here. After
//! `fail_threshold` consecutive failures the source's circuit opens for
//! `cooldown`, during which [`SourceHealth::can_attempt`] returns false and
//! resolvers skip the source.
//!
//! The breaker sends no trial request: once the cooldown has passed the next real
//! call goes through and its outcome alone decides whether the circuit
//! opens again. A single lucky success therefore re-closes a flaky source.
//! Treat `can_attempt() == false` as "skip this source for now", not as a
//! hard guarantee.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const LAST_ERROR_MAX_CHARS: usize = 160;

/// Breaker thresholds. Both values are clamped to at least one.
#[derive(Debug, Clone, Copy)]
pub struct HealthConfig {
    pub fail_threshold: u32,
    pub cooldown: Duration,
}

/// Result of one call to a source, as reported by the resolver.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub success: bool,
    pub duration_ms: f64,
    pub timeout: bool,
    pub error: String,
}

impl Outcome {
    pub fn ok(duration_ms: f64) -> Self {
        Self {
            success: true,
            duration_ms,
            timeout: false,
            error: String::new(),
        }
    }

    pub fn failed(duration_ms: f64, timeout: bool, error: impl Into<String>) -> Self {
        Self {
            success: false,
            duration_ms,
            timeout,
            error: error.into(),
        }
    }
}

#[derive(Debug, Default)]
struct SourceStats {
    ok_count: u64,
    fail_count: u64,
    timeout_count: u64,
    consecutive_fail_count: u32,
    ema_latency_ms: f64,
    last_error: String,
    last_ok_at: Option<DateTime<Utc>>,
    last_fail_at: Option<DateTime<Utc>>,
    circuit_open_until: Option<Instant>,
}

/// Read-only view of one source's statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceStatsView {
    pub ok_count: u64,
    pub fail_count: u64,
    pub timeout_count: u64,
    pub consecutive_fail_count: u32,
    pub ema_latency_ms: f64,
    pub last_error: String,
    pub last_ok_at: Option<DateTime<Utc>>,
    pub last_fail_at: Option<DateTime<Utc>>,
    pub circuit_open: bool,
    /// Seconds left before the circuit re-closes, zero when closed.
    pub circuit_open_remaining_secs: u64,
}

pub struct SourceHealth {
    stats: Mutex<HashMap<String, SourceStats>>,
    fail_threshold: u32,
    cooldown: Duration,
}

impl SourceHealth {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            stats: Mutex::new(HashMap::new()),
            fail_threshold: config.fail_threshold.max(1),
            cooldown: config.cooldown.max(Duration::from_secs(1)),
        }
    }

    /// A poisoned lock only means a panic happened mid-update; the counters
    /// are still usable, so recover instead of propagating the panic.
    fn lock_stats(&self) -> MutexGuard<'_, HashMap<String, SourceStats>> {
        self.stats.lock().unwrap_or_else(|poisoned| {
            warn!("Source health mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn can_attempt(&self, source: &str) -> bool {
        let mut stats = self.lock_stats();
        let entry = stats.entry(source.to_string()).or_default();
        match entry.circuit_open_until {
            Some(until) => Instant::now() >= until,
            None => true,
        }
    }

    pub fn record(&self, source: &str, outcome: Outcome) {
        let now = Utc::now();
        let mut stats = self.lock_stats();
        let entry = stats.entry(source.to_string()).or_default();

        if outcome.success {
            entry.ok_count += 1;
            entry.consecutive_fail_count = 0;
            entry.last_ok_at = Some(now);
            entry.last_error.clear();
            entry.ema_latency_ms = if entry.ema_latency_ms <= 0.0 {
                outcome.duration_ms
            } else {
                entry.ema_latency_ms * 0.8 + outcome.duration_ms * 0.2
            };
            if entry.circuit_open_until.take().is_some() {
                info!(source, "Circuit closed after successful call");
            }
            return;
        }

        entry.fail_count += 1;
        entry.consecutive_fail_count += 1;
        entry.last_fail_at = Some(now);
        entry.last_error = outcome.error.chars().take(LAST_ERROR_MAX_CHARS).collect();
        if outcome.timeout {
            entry.timeout_count += 1;
        }

        if entry.consecutive_fail_count >= self.fail_threshold {
            entry.circuit_open_until = Some(Instant::now() + self.cooldown);
            info!(
                source,
                consecutive_failures = entry.consecutive_fail_count,
                cooldown_secs = self.cooldown.as_secs(),
                "Circuit opened"
            );
        } else {
            debug!(
                source,
                "Failure recorded ({}/{})", entry.consecutive_fail_count, self.fail_threshold
            );
        }
    }

    pub fn snapshot(&self) -> BTreeMap<String, SourceStatsView> {
        let now = Instant::now();
        let stats = self.lock_stats();
        stats
            .iter()
            .map(|(source, s)| {
                let remaining = s
                    .circuit_open_until
                    .map(|until| until.saturating_duration_since(now))
                    .unwrap_or_default();
                let view = SourceStatsView {
                    ok_count: s.ok_count,
                    fail_count: s.fail_count,
                    timeout_count: s.timeout_count,
                    consecutive_fail_count: s.consecutive_fail_count,
                    ema_latency_ms: s.ema_latency_ms,
                    last_error: s.last_error.clone(),
                    last_ok_at: s.last_ok_at,
                    last_fail_at: s.last_fail_at,
                    circuit_open: !remaining.is_zero(),
                    circuit_open_remaining_secs: remaining.as_secs(),
                };
                (source.clone(), view)
            })
            .collect()
    }

    pub fn reset(&self) {
        self.lock_stats().clear();
        info!("Source health stats reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn health() -> SourceHealth {
        SourceHealth::new(HealthConfig {
            fail_threshold: 3,
            cooldown: Duration::from_secs(30),
        })
    }

    fn fail(health: &SourceHealth, source: &str) {
        health.record(source, Outcome::failed(5.0, false, "boom"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_opens_at_threshold() {
        let health = health();
        fail(&health, "tencent");
        fail(&health, "tencent");
        assert!(health.can_attempt("tencent"));

        fail(&health, "tencent");
        assert!(!health.can_attempt("tencent"));
        assert!(health.can_attempt("sina"));

        let snapshot = health.snapshot();
        assert!(snapshot["tencent"].circuit_open);
        assert_eq!(snapshot["tencent"].consecutive_fail_count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_recloses_after_cooldown() {
        let health = health();
        for _ in 0..3 {
            fail(&health, "tencent");
        }

        advance(Duration::from_secs(29)).await;
        assert!(!health.can_attempt("tencent"));

        advance(Duration::from_secs(1)).await;
        assert!(health.can_attempt("tencent"));

        // No half-open state: the next failure alone re-opens it
        fail(&health, "tencent");
        assert!(!health.can_attempt("tencent"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_consecutive_failures() {
        let health = health();
        for _ in 0..3 {
            fail(&health, "sina");
        }
        assert!(!health.can_attempt("sina"));

        health.record("sina", Outcome::ok(40.0));
        assert!(health.can_attempt("sina"));

        let view = &health.snapshot()["sina"];
        assert_eq!(view.consecutive_fail_count, 0);
        assert_eq!(view.fail_count, 3);
        assert_eq!(view.ok_count, 1);
        assert!(view.last_error.is_empty());
        assert!(!view.circuit_open);

        fail(&health, "sina");
        fail(&health, "sina");
        assert!(health.can_attempt("sina"));
    }

    #[test]
    fn test_latency_ema_and_timeouts() {
        let health = health();
        health.record("tiantian_fund", Outcome::ok(100.0));
        assert_eq!(health.snapshot()["tiantian_fund"].ema_latency_ms, 100.0);

        health.record("tiantian_fund", Outcome::ok(200.0));
        let ema = health.snapshot()["tiantian_fund"].ema_latency_ms;
        assert!((ema - 120.0).abs() < 1e-9);

        health.record("tiantian_fund", Outcome::failed(3000.0, true, "timed out"));
        let view = &health.snapshot()["tiantian_fund"];
        assert_eq!(view.timeout_count, 1);
        assert_eq!(view.last_error, "timed out");
        assert!(view.last_fail_at.is_some());
    }

    #[test]
    fn test_last_error_is_truncated() {
        let health = health();
        health.record("sina", Outcome::failed(1.0, false, "x".repeat(500)));
        assert_eq!(health.snapshot()["sina"].last_error.len(), LAST_ERROR_MAX_CHARS);
    }

    #[test]
    fn test_reset_clears_everything() {
        let health = health();
        fail(&health, "sina");
        health.reset();
        assert!(health.snapshot().is_empty());
    }
}
