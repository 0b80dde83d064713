//! Price-health report and the alert rules evaluated against it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::health::SourceStatsView;
use crate::core::metrics::RuntimeStats;

/// Counters and per-source health, as exposed to operators.
#[derive(Debug, Clone, Serialize)]
pub struct PriceHealthReport {
    pub runtime: RuntimeStats,
    pub sources: BTreeMap<String, SourceStatsView>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AlertThresholds {
    /// Growth of `network_fail` since the previous check.
    pub network_fail_delta: u64,
    /// Growth of `stale_hits` since the previous check.
    pub stale_hits_delta: u64,
    /// Consecutive failures of any one source.
    pub consecutive_fail: u32,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        AlertThresholds {
            network_fail_delta: 20,
            stale_hits_delta: 30,
            consecutive_fail: 5,
        }
    }
}

/// Returns one message per tripped rule.
///
/// Counter deltas are measured against `previous`; without a previous
/// reading they are zero. Counters that went backwards (process restart)
/// also count as zero.
pub fn evaluate_alerts(
    current: &PriceHealthReport,
    previous: Option<&RuntimeStats>,
    thresholds: &AlertThresholds,
) -> Vec<String> {
    let mut alerts = Vec::new();
    let runtime = &current.runtime;

    let (network_fail_delta, stale_hits_delta) = match previous {
        Some(prev) => (
            runtime.network_fail.saturating_sub(prev.network_fail),
            runtime.stale_hits.saturating_sub(prev.stale_hits),
        ),
        None => (0, 0),
    };

    if network_fail_delta >= thresholds.network_fail_delta {
        alerts.push(format!(
            "network_fail delta in window is {} (threshold {})",
            network_fail_delta, thresholds.network_fail_delta
        ));
    }
    if stale_hits_delta >= thresholds.stale_hits_delta {
        alerts.push(format!(
            "stale_hits delta in window is {} (threshold {})",
            stale_hits_delta, thresholds.stale_hits_delta
        ));
    }

    for (source, stats) in &current.sources {
        if stats.consecutive_fail_count >= thresholds.consecutive_fail {
            alerts.push(format!(
                "{} consecutive_fail={} (threshold {})",
                source, stats.consecutive_fail_count, thresholds.consecutive_fail
            ));
        }
        if stats.circuit_open {
            alerts.push(format!("{source} circuit_open=true"));
        }
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(consecutive_fail_count: u32, circuit_open: bool) -> SourceStatsView {
        SourceStatsView {
            ok_count: 0,
            fail_count: consecutive_fail_count as u64,
            timeout_count: 0,
            consecutive_fail_count,
            ema_latency_ms: 0.0,
            last_error: String::new(),
            last_ok_at: None,
            last_fail_at: None,
            circuit_open,
            circuit_open_remaining_secs: 0,
        }
    }

    fn report(network_fail: u64, stale_hits: u64) -> PriceHealthReport {
        PriceHealthReport {
            runtime: RuntimeStats {
                network_fail,
                stale_hits,
                ..RuntimeStats::default()
            },
            sources: BTreeMap::new(),
        }
    }

    #[test]
    fn test_no_previous_reading_means_no_delta_alerts() {
        let alerts = evaluate_alerts(&report(500, 500), None, &AlertThresholds::default());
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_delta_thresholds_are_inclusive() {
        let previous = RuntimeStats {
            network_fail: 10,
            stale_hits: 10,
            ..RuntimeStats::default()
        };
        let alerts = evaluate_alerts(
            &report(30, 39),
            Some(&previous),
            &AlertThresholds::default(),
        );
        assert_eq!(alerts, vec!["network_fail delta in window is 20 (threshold 20)"]);

        let alerts = evaluate_alerts(
            &report(29, 40),
            Some(&previous),
            &AlertThresholds::default(),
        );
        assert_eq!(alerts, vec!["stale_hits delta in window is 30 (threshold 30)"]);
    }

    #[test]
    fn test_counter_reset_is_not_an_alert() {
        let previous = RuntimeStats {
            network_fail: 100,
            ..RuntimeStats::default()
        };
        let alerts = evaluate_alerts(&report(0, 0), Some(&previous), &AlertThresholds::default());
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_source_rules() {
        let mut current = report(0, 0);
        current.sources.insert("sina".into(), source(5, true));
        current.sources.insert("tencent".into(), source(2, false));

        let alerts = evaluate_alerts(&current, None, &AlertThresholds::default());
        assert_eq!(
            alerts,
            vec![
                "sina consecutive_fail=5 (threshold 5)".to_string(),
                "sina circuit_open=true".to_string(),
            ]
        );
    }
}
