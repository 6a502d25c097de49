//! Conference services facade
//!
//! Composes one instance registry per enabled subsystem with the bridge
//! selection policy and exposes the two contracts the orchestrator consumes:
//! "current best worker of a kind" and "discovery health snapshot".
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │         ConferenceServices           │
//! │                                      │
//! │  presence groups ──► event pumps     │
//! │                        │             │
//! │  ┌─────────────────────▼─────────┐   │
//! │  │  InstanceRegistry per enabled │   │
//! │  │  subsystem (bridge, recorder, │   │
//! │  │  sip_recorder, gateway)       │   │
//! │  └─────────────────────┬─────────┘   │
//! │        snapshots       │             │
//! │  ┌─────────────────────▼─────────┐   │
//! │  │  CapabilityFilter getters     │   │
//! │  │  BridgeSelector               │   │
//! │  │  DiscoveryStats               │   │
//! │  └───────────────────────────────┘   │
//! └──────────────────────────────────────┘
//! ```

pub mod http;

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::config::{ConfigError, DiscoveryConfig};
use crate::filter;
use crate::presence::{PresenceError, PresenceSource, PresenceSubscription};
use crate::registry::{InstanceRegistry, RegistryStats, ServiceInstance, Subsystem};
use crate::selector::{BridgeSelector, BridgeSelectorStats, SelectionError};

// ============================================================================
// Lookup Errors
// ============================================================================

/// Getter failures surfaced to callers
///
/// "Not configured" and "nothing present" are deliberately distinct: the
/// first is permanent for the lifetime of the configuration, the second is a
/// transient view of the pool.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupError {
    /// The subsystem was never enabled, or discovery is stopped
    #[error("Discovery for the {0} pool is not configured")]
    NotConfigured(Subsystem),

    /// The subsystem is enabled but no instance matches right now
    #[error("No instance present in the {0} pool")]
    NoInstance(Subsystem),
}

impl LookupError {
    /// Whether the caller may retry later
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NoInstance(_))
    }
}

// ============================================================================
// Discovery Stats
// ============================================================================

/// Aggregated discovery/selection health snapshot
///
/// Key names are a published operator contract; disabled subsystems are
/// omitted entirely rather than serialized as null.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridge_selector: Option<BridgeSelectorStats>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorder_detector: Option<RegistryStats>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sip_recorder_detector: Option<RegistryStats>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_detector: Option<RegistryStats>,
}

// ============================================================================
// Conference Services
// ============================================================================

/// An active subsystem: its registry plus the pump feeding it
struct Detector {
    registry: Arc<InstanceRegistry>,
    pump: JoinHandle<()>,
}

/// Discovery facade over the configured worker pools
///
/// Created once at process start with the two presence connections injected:
/// the bridge pool lives on its own connection, every other pool shares the
/// services connection.
pub struct ConferenceServices {
    config: DiscoveryConfig,
    service_presence: Arc<dyn PresenceSource>,
    bridge_presence: Arc<dyn PresenceSource>,
    detectors: RwLock<HashMap<Subsystem, Detector>>,
    bridge_selector: BridgeSelector,
    started: AtomicBool,
}

impl ConferenceServices {
    /// Create the facade with a validated configuration
    pub fn new(
        config: DiscoveryConfig,
        service_presence: Arc<dyn PresenceSource>,
        bridge_presence: Arc<dyn PresenceSource>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let bridge_selector = BridgeSelector::new(config.selector);

        Ok(Self {
            config,
            service_presence,
            bridge_presence,
            detectors: RwLock::new(HashMap::new()),
            bridge_selector,
            started: AtomicBool::new(false),
        })
    }

    /// Whether `start()` has run and `stop()` has not
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Configuration this facade was built with
    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Activate discovery for every enabled subsystem
    ///
    /// Builds each registry, subscribes it to its coordination group and
    /// spawns the event pump. Calling `start()` twice is a no-op; no
    /// subsystem is ever subscribed twice.
    pub async fn start(&self) -> Result<(), PresenceError> {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::debug!("Discovery already started, ignoring start()");
            return Ok(());
        }

        let mut detectors = self.detectors.write().await;
        for subsystem in self.config.enabled_subsystems() {
            let group = &self.config.group(subsystem).group;
            let source = match subsystem {
                Subsystem::Bridge => &self.bridge_presence,
                _ => &self.service_presence,
            };

            let subscription = match source.subscribe(group).await {
                Ok(subscription) => subscription,
                Err(e) => {
                    // Unwind the partially built set before reporting
                    for (_, detector) in detectors.drain() {
                        detector.pump.abort();
                    }
                    self.started.store(false, Ordering::SeqCst);
                    return Err(e);
                }
            };

            let registry = Arc::new(InstanceRegistry::new(subsystem));
            let pump = tokio::spawn(pump_events(registry.clone(), subscription));
            detectors.insert(subsystem, Detector { registry, pump });

            tracing::info!("Watching {} pool in group {}", subsystem, group);
        }

        Ok(())
    }

    /// Deactivate discovery and clear all registries
    ///
    /// Safe to call without a prior `start()` and safe to call twice. Calls
    /// already in flight observe either the pre-stop state or "not
    /// configured".
    pub async fn stop(&self) {
        if !self.started.swap(false, Ordering::SeqCst) {
            tracing::debug!("Discovery not started, stop() is a no-op");
            return;
        }

        let mut detectors = self.detectors.write().await;
        for (subsystem, detector) in detectors.drain() {
            detector.pump.abort();
            detector.registry.clear().await;
            tracing::info!("Stopped watching {} pool", subsystem);
        }
    }

    /// Registry handle for an active subsystem
    async fn registry_of(&self, subsystem: Subsystem) -> Option<Arc<InstanceRegistry>> {
        self.detectors
            .read()
            .await
            .get(&subsystem)
            .map(|d| d.registry.clone())
    }

    /// Current snapshot of an enabled subsystem's pool
    pub async fn instances_of(
        &self,
        subsystem: Subsystem,
    ) -> Result<Vec<ServiceInstance>, LookupError> {
        let registry = self
            .registry_of(subsystem)
            .await
            .ok_or(LookupError::NotConfigured(subsystem))?;
        Ok(registry.snapshot().await)
    }

    /// First instance of `subsystem` matching `predicate` under the stable
    /// capability-filter ordering
    pub async fn instance_matching<F>(
        &self,
        subsystem: Subsystem,
        predicate: F,
    ) -> Result<ServiceInstance, LookupError>
    where
        F: Fn(&ServiceInstance) -> bool,
    {
        let snapshot = self.instances_of(subsystem).await?;
        filter::first(&snapshot, predicate).ok_or(LookupError::NoInstance(subsystem))
    }

    /// First instance of `subsystem`
    pub async fn instance_of(&self, subsystem: Subsystem) -> Result<ServiceInstance, LookupError> {
        self.instance_matching(subsystem, |_| true).await
    }

    /// Current recording worker (plain variant)
    pub async fn recorder(&self) -> Result<ServiceInstance, LookupError> {
        self.instance_matching(Subsystem::Recorder, filter::non_sip)
            .await
    }

    /// Current SIP-capable recording worker
    pub async fn sip_recorder(&self) -> Result<ServiceInstance, LookupError> {
        self.instance_matching(Subsystem::SipRecorder, filter::sip_capable)
            .await
    }

    /// Current gateway worker
    pub async fn gateway(&self) -> Result<ServiceInstance, LookupError> {
        self.instance_of(Subsystem::Gateway).await
    }

    /// Pick the bridge for the next conference
    pub async fn select_bridge(&self) -> Result<ServiceInstance, SelectionError> {
        let registry = self
            .registry_of(Subsystem::Bridge)
            .await
            .ok_or(SelectionError::NotConfigured)?;
        let snapshot = registry.snapshot().await;
        self.bridge_selector.select(&snapshot)
    }

    /// Aggregated stats snapshot across all active subsystems
    pub async fn stats(&self) -> DiscoveryStats {
        let mut stats = DiscoveryStats::default();

        if let Some(registry) = self.registry_of(Subsystem::Bridge).await {
            let snapshot = registry.snapshot().await;
            stats.bridge_selector = Some(self.bridge_selector.stats_for(&snapshot));
        }
        if let Some(registry) = self.registry_of(Subsystem::Recorder).await {
            stats.recorder_detector = Some(registry.stats().await);
        }
        if let Some(registry) = self.registry_of(Subsystem::SipRecorder).await {
            stats.sip_recorder_detector = Some(registry.stats().await);
        }
        if let Some(registry) = self.registry_of(Subsystem::Gateway).await {
            stats.gateway_detector = Some(registry.stats().await);
        }

        stats
    }
}

/// Apply the group's event stream to its registry until the stream ends
async fn pump_events(registry: Arc<InstanceRegistry>, mut subscription: PresenceSubscription) {
    while let Some(event) = subscription.events.recv().await {
        registry.apply_event(event).await;
    }
    tracing::debug!(
        "Presence stream ended for {} pool ({})",
        registry.subsystem(),
        subscription.group
    );
}

// ============================================================================
// Tests
// ============================================================================
