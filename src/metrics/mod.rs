//! Prometheus metrics for discovery and selection
//!
//! This module tracks:
//! - Per-subsystem registry gauges (registered and healthy instances)
//! - Presence event counters, including absorbed stale/duplicate events
//! - Bridge selection outcomes
//!
//! Call [`init_metrics`] once at application startup. If initialization is
//! skipped or fails, every metric operation is a no-op so the library stays
//! usable without a metrics pipeline.

use prometheus::{
    register_counter, register_counter_vec, register_gauge_vec, Counter, CounterVec, Encoder,
    GaugeVec, TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for all discovery metrics
struct DiscoveryMetrics {
    registered_instances: GaugeVec,
    healthy_instances: GaugeVec,
    presence_events: CounterVec,
    absorbed_events: CounterVec,
    selections: Counter,
    selection_failures: Counter,
}

/// Global storage for discovery metrics
static DISCOVERY_METRICS: OnceLock<DiscoveryMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// Registration errors are returned to the caller; the application can
/// continue without metrics since every recording function degrades to a
/// no-op.
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    // Prevent double initialization
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let metrics = DiscoveryMetrics {
        registered_instances: register_gauge_vec!(
            "podium_registered_instances",
            "Instances currently present in a subsystem pool",
            &["subsystem"]
        )?,
        healthy_instances: register_gauge_vec!(
            "podium_healthy_instances",
            "Instances currently reporting healthy in a subsystem pool",
            &["subsystem"]
        )?,
        presence_events: register_counter_vec!(
            "podium_presence_events_total",
            "Membership events received per subsystem pool",
            &["subsystem", "event"]
        )?,
        absorbed_events: register_counter_vec!(
            "podium_absorbed_presence_events_total",
            "Stale or duplicate membership events absorbed by a registry",
            &["subsystem"]
        )?,
        selections: register_counter!(
            "podium_bridge_selections_total",
            "Successful bridge selections"
        )?,
        selection_failures: register_counter!(
            "podium_bridge_selection_failures_total",
            "Bridge selections that found no eligible instance"
        )?,
    };

    DISCOVERY_METRICS
        .set(metrics)
        .map_err(|_| "Discovery metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized");
    Ok(())
}

// ============================================================================
// Recording
// ============================================================================

/// Update registry gauges for one subsystem
pub fn set_instance_gauges(subsystem: &str, total: usize, healthy: usize) {
    if let Some(m) = DISCOVERY_METRICS.get() {
        m.registered_instances
            .with_label_values(&[subsystem])
            .set(total as f64);
        m.healthy_instances
            .with_label_values(&[subsystem])
            .set(healthy as f64);
    }
}

/// Count one membership event applied to a registry
pub fn inc_presence_event(subsystem: &str, event: &str) {
    if let Some(m) = DISCOVERY_METRICS.get() {
        m.presence_events
            .with_label_values(&[subsystem, event])
            .inc();
    }
}

/// Count one absorbed stale/duplicate membership event
pub fn inc_absorbed_event(subsystem: &str) {
    if let Some(m) = DISCOVERY_METRICS.get() {
        m.absorbed_events.with_label_values(&[subsystem]).inc();
    }
}

/// Count one successful bridge selection
pub fn inc_selection() {
    if let Some(m) = DISCOVERY_METRICS.get() {
        m.selections.inc();
    }
}

/// Count one failed bridge selection
pub fn inc_selection_failure() {
    if let Some(m) = DISCOVERY_METRICS.get() {
        m.selection_failures.inc();
    }
}

// ============================================================================
// Exposition
// ============================================================================

/// Render all registered metrics in Prometheus text format
pub fn render() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

// ============================================================================
// Tests
// ============================================================================
