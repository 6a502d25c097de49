//! Load-aware bridge selection
//!
//! Picks the bridge instance that should host the next conference from a
//! registry snapshot. The policy is stateless given its input: healthy,
//! non-stale candidates ordered by ascending load with id as the tie-break,
//! so repeated calls over equal snapshots return the same instance. Only
//! monotonic operation counters are kept, for the stats surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

use crate::registry::ServiceInstance;

// ============================================================================
// Errors
// ============================================================================

/// Selection failures surfaced to callers
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionError {
    /// Bridge discovery was never enabled, or the facade is stopped
    #[error("Bridge discovery is not configured")]
    NotConfigured,

    /// Discovery is active but no eligible bridge exists right now
    #[error("No healthy bridge instance available")]
    NoHealthyInstance,
}

impl SelectionError {
    /// Whether the caller may retry later
    ///
    /// `NoHealthyInstance` is transient; `NotConfigured` is permanent for
    /// the lifetime of the configuration.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NoHealthyInstance)
    }
}

// ============================================================================
// Selector Configuration
// ============================================================================

/// Configuration for the bridge selector
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Age in seconds past which a silent instance is treated as unhealthy
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: i64,
}

fn default_stale_after_secs() -> i64 {
    60
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

// ============================================================================
// Bridge Selector
// ============================================================================

/// Selector statistics snapshot
///
/// Field names are part of the operator-facing stats contract.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BridgeSelectorStats {
    pub instance_count: usize,
    pub healthy_count: usize,
    /// Healthy instances that also passed the staleness gate
    pub operational_count: usize,
    pub selection_count: u64,
    pub failure_count: u64,
}

/// Health- and load-aware bridge selection policy
pub struct BridgeSelector {
    stale_after_secs: i64,
    selections: AtomicU64,
    failures: AtomicU64,
}

impl BridgeSelector {
    /// Create a selector with the given configuration
    pub fn new(config: SelectorConfig) -> Self {
        Self {
            stale_after_secs: config.stale_after_secs,
            selections: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Create a selector with default configuration
    pub fn with_defaults() -> Self {
        Self::new(SelectorConfig::default())
    }

    /// Whether `instance` is eligible to host new work, as of `now`
    ///
    /// An instance that stopped reporting is excluded even if its last
    /// payload said healthy; a partitioned bridge never sends a leave.
    fn is_candidate(&self, instance: &ServiceInstance, now: DateTime<Utc>) -> bool {
        instance.healthy && !instance.is_stale_at(now, self.stale_after_secs)
    }

    /// Pick the bridge for the next unit of work
    ///
    /// Operates on the one snapshot it is handed; registry mutation racing
    /// this call cannot tear the result.
    pub fn select(&self, snapshot: &[ServiceInstance]) -> Result<ServiceInstance, SelectionError> {
        let now = Utc::now();

        let best = snapshot
            .iter()
            .filter(|i| self.is_candidate(i, now))
            .min_by(|a, b| a.load.cmp(&b.load).then_with(|| a.id.cmp(&b.id)));

        match best {
            Some(instance) => {
                self.selections.fetch_add(1, Ordering::Relaxed);
                crate::metrics::inc_selection();
                tracing::debug!(
                    "Selected bridge {} (load {}) from {} candidates",
                    instance.id,
                    instance.load,
                    snapshot.len()
                );
                Ok(instance.clone())
            }
            None => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                crate::metrics::inc_selection_failure();
                tracing::warn!(
                    "No eligible bridge among {} known instances",
                    snapshot.len()
                );
                Err(SelectionError::NoHealthyInstance)
            }
        }
    }

    /// Selector statistics over `snapshot`
    pub fn stats_for(&self, snapshot: &[ServiceInstance]) -> BridgeSelectorStats {
        let now = Utc::now();
        BridgeSelectorStats {
            instance_count: snapshot.len(),
            healthy_count: snapshot.iter().filter(|i| i.healthy).count(),
            operational_count: snapshot.iter().filter(|i| self.is_candidate(i, now)).count(),
            selection_count: self.selections.load(Ordering::Relaxed),
            failure_count: self.failures.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::InstanceState;
    use crate::registry::ServiceKind;

    fn bridge(id: &str, load: u32, healthy: bool) -> ServiceInstance {
        ServiceInstance::new(
            id,
            ServiceKind::Bridge,
            false,
            InstanceState {
                healthy,
                load,
                version: None,
                region: None,
            },
        )
    }

    #[test]
    fn test_select_lowest_load_among_healthy() {
        let selector = BridgeSelector::with_defaults();
        let snapshot = vec![
            bridge("jvb-a", 3, true),
            bridge("jvb-b", 1, true),
            bridge("jvb-c", 1, false),
        ];

        let selected = selector.select(&snapshot).unwrap();
        assert_eq!(selected.id, "jvb-b");
    }

    #[test]
    fn test_select_empty_snapshot() {
        let selector = BridgeSelector::with_defaults();
        let err = selector.select(&[]).unwrap_err();
        assert_eq!(err, SelectionError::NoHealthyInstance);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_select_all_unhealthy() {
        let selector = BridgeSelector::with_defaults();
        let snapshot = vec![bridge("jvb-a", 0, false), bridge("jvb-b", 2, false)];

        assert_eq!(
            selector.select(&snapshot),
            Err(SelectionError::NoHealthyInstance)
        );
    }

    #[test]
    fn test_select_tie_break_is_deterministic() {
        let selector = BridgeSelector::with_defaults();
        let snapshot = vec![bridge("jvb-y", 2, true), bridge("jvb-x", 2, true)];

        for _ in 0..10 {
            assert_eq!(selector.select(&snapshot).unwrap().id, "jvb-x");
        }
    }

    #[test]
    fn test_select_excludes_stale_instances() {
        let selector = BridgeSelector::new(SelectorConfig {
            stale_after_secs: 30,
        });

        let mut silent = bridge("jvb-silent", 0, true);
        silent.last_seen = Utc::now() - chrono::Duration::seconds(120);
        let live = bridge("jvb-live", 5, true);

        // The silent bridge has the lower load but stopped reporting
        let selected = selector.select(&[silent.clone(), live]).unwrap();
        assert_eq!(selected.id, "jvb-live");

        // With only the silent bridge left, selection fails
        assert_eq!(
            selector.select(&[silent]),
            Err(SelectionError::NoHealthyInstance)
        );
    }

    #[test]
    fn test_selector_stats() {
        let selector = BridgeSelector::new(SelectorConfig {
            stale_after_secs: 30,
        });

        let mut stale = bridge("jvb-stale", 0, true);
        stale.last_seen = Utc::now() - chrono::Duration::seconds(90);
        let snapshot = vec![stale, bridge("jvb-a", 1, true), bridge("jvb-b", 0, false)];

        selector.select(&snapshot).unwrap();
        selector.select(&[]).unwrap_err();

        let stats = selector.stats_for(&snapshot);
        assert_eq!(stats.instance_count, 3);
        assert_eq!(stats.healthy_count, 2);
        assert_eq!(stats.operational_count, 1);
        assert_eq!(stats.selection_count, 1);
        assert_eq!(stats.failure_count, 1);
    }

    #[test]
    fn test_not_configured_is_permanent() {
        assert!(!SelectionError::NotConfigured.is_retryable());
    }
}
