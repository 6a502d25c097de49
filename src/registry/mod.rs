//! Instance registry built from coordination-group presence
//!
//! One registry tracks the instances of exactly one subsystem (a service kind
//! plus its variant flag). It is mutated only by presence events for that
//! subsystem's group and never by selection; readers take point-in-time
//! snapshots and are never blocked for longer than a single instance update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::RwLock;

use crate::metrics;
use crate::presence::{InstanceState, PresenceEvent};

// ============================================================================
// Service Kind
// ============================================================================

/// Kind of backend worker a coordination group announces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    /// Media bridge worker
    Bridge,
    /// Recording worker
    Recorder,
    /// SIP gateway worker
    Gateway,
}

impl ServiceKind {
    /// Get all kinds
    pub fn all() -> Vec<Self> {
        vec![Self::Bridge, Self::Recorder, Self::Gateway]
    }

    /// Get kind id as string
    pub fn id(&self) -> &'static str {
        match self {
            Self::Bridge => "bridge",
            Self::Recorder => "recorder",
            Self::Gateway => "gateway",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

// ============================================================================
// Subsystem
// ============================================================================

/// A discoverable kind/variant combination
///
/// Each subsystem maps to one configured coordination group and owns one
/// registry. The SIP-capable recorder pool lives in its own group, so it is
/// a subsystem of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subsystem {
    Bridge,
    Recorder,
    SipRecorder,
    Gateway,
}

impl Subsystem {
    /// Get all subsystems
    pub fn all() -> Vec<Self> {
        vec![Self::Bridge, Self::Recorder, Self::SipRecorder, Self::Gateway]
    }

    /// Service kind this subsystem discovers
    pub fn kind(&self) -> ServiceKind {
        match self {
            Self::Bridge => ServiceKind::Bridge,
            Self::Recorder | Self::SipRecorder => ServiceKind::Recorder,
            Self::Gateway => ServiceKind::Gateway,
        }
    }

    /// Variant flag of this subsystem
    pub fn sip(&self) -> bool {
        matches!(self, Self::SipRecorder)
    }

    /// Resolve a kind/variant pair to its subsystem
    ///
    /// Returns `None` for combinations no configuration exposes (there is no
    /// SIP variant of the bridge or gateway pools).
    pub fn from_parts(kind: ServiceKind, sip: bool) -> Option<Self> {
        match (kind, sip) {
            (ServiceKind::Bridge, false) => Some(Self::Bridge),
            (ServiceKind::Recorder, false) => Some(Self::Recorder),
            (ServiceKind::Recorder, true) => Some(Self::SipRecorder),
            (ServiceKind::Gateway, false) => Some(Self::Gateway),
            _ => None,
        }
    }

    /// Get subsystem id as string
    pub fn id(&self) -> &'static str {
        match self {
            Self::Bridge => "bridge",
            Self::Recorder => "recorder",
            Self::SipRecorder => "sip_recorder",
            Self::Gateway => "gateway",
        }
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

// ============================================================================
// Service Instance
// ============================================================================

/// One live backend worker known through presence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInstance {
    /// Stable identity within the coordination group
    pub id: String,

    /// Worker kind, fixed at join
    pub kind: ServiceKind,

    /// SIP-capable variant flag, fixed at join
    pub sip: bool,

    /// Whether the instance reports itself able to take work
    pub healthy: bool,

    /// Current load signal (conference count)
    pub load: u32,

    /// Software version reported by the instance
    pub version: Option<String>,

    /// Deployment region reported by the instance
    pub region: Option<String>,

    /// When the instance first joined
    pub joined_at: DateTime<Utc>,

    /// Most recent presence event referencing this instance
    pub last_seen: DateTime<Utc>,
}

impl ServiceInstance {
    /// Create an instance from its join announcement
    pub fn new(id: impl Into<String>, kind: ServiceKind, sip: bool, state: InstanceState) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            kind,
            sip,
            healthy: state.healthy,
            load: state.load,
            version: state.version,
            region: state.region,
            joined_at: now,
            last_seen: now,
        }
    }

    /// Apply a refreshed presence payload
    ///
    /// Identity fields (`id`, `kind`, `sip`, `joined_at`) are never touched;
    /// a variant change arrives as leave + join.
    pub fn apply_state(&mut self, state: InstanceState) {
        self.healthy = state.healthy;
        self.load = state.load;
        self.version = state.version;
        self.region = state.region;
        self.last_seen = Utc::now();
    }

    /// Seconds since the last presence event for this instance
    pub fn seconds_since_seen(&self) -> i64 {
        (Utc::now() - self.last_seen).num_seconds()
    }

    /// Check whether the instance stopped reporting, as of `now`
    pub fn is_stale_at(&self, now: DateTime<Utc>, max_age_secs: i64) -> bool {
        (now - self.last_seen).num_seconds() > max_age_secs
    }
}

// ============================================================================
// Instance Registry
// ============================================================================

/// Registry statistics snapshot
///
/// Field names are part of the operator-facing stats contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub instance_count: usize,
    pub healthy_count: usize,
}

/// Per-subsystem table of live instances
///
/// The sole writer is the presence event pump for the subsystem's group;
/// selection and stats calls only read.
pub struct InstanceRegistry {
    subsystem: Subsystem,
    instances: RwLock<HashMap<String, ServiceInstance>>,
}

impl InstanceRegistry {
    /// Create an empty registry for one subsystem
    pub fn new(subsystem: Subsystem) -> Self {
        Self {
            subsystem,
            instances: RwLock::new(HashMap::new()),
        }
    }

    /// Subsystem this registry tracks
    pub fn subsystem(&self) -> Subsystem {
        self.subsystem
    }

    /// Apply one membership event
    ///
    /// Stale or duplicate events are absorbed here: an `Updated` or `Left`
    /// for an unknown id is logged and ignored, a duplicate `Joined` is
    /// treated as `Updated`. Nothing propagates to callers.
    pub async fn apply_event(&self, event: PresenceEvent) {
        metrics::inc_presence_event(self.subsystem.id(), event.name());

        let mut instances = self.instances.write().await;
        match event {
            PresenceEvent::Joined { id, sip, state } => {
                if let Some(existing) = instances.get_mut(&id) {
                    tracing::debug!(
                        "Duplicate join for {} in {} pool, treating as update",
                        id,
                        self.subsystem
                    );
                    existing.apply_state(state);
                } else {
                    tracing::info!("Instance {} joined {} pool", id, self.subsystem);
                    let instance = ServiceInstance::new(id.clone(), self.subsystem.kind(), sip, state);
                    instances.insert(id, instance);
                }
            }
            PresenceEvent::Updated { id, state } => match instances.get_mut(&id) {
                Some(instance) => instance.apply_state(state),
                None => {
                    tracing::debug!(
                        "Update for unknown instance {} in {} pool, ignoring",
                        id,
                        self.subsystem
                    );
                    metrics::inc_absorbed_event(self.subsystem.id());
                }
            },
            PresenceEvent::Left { id } => {
                if instances.remove(&id).is_some() {
                    tracing::info!("Instance {} left {} pool", id, self.subsystem);
                } else {
                    tracing::debug!(
                        "Leave for unknown instance {} in {} pool, ignoring",
                        id,
                        self.subsystem
                    );
                    metrics::inc_absorbed_event(self.subsystem.id());
                }
            }
        }

        let healthy = instances.values().filter(|i| i.healthy).count();
        metrics::set_instance_gauges(self.subsystem.id(), instances.len(), healthy);
    }

    /// Point-in-time copy of all instances, ordered by id
    pub async fn snapshot(&self) -> Vec<ServiceInstance> {
        let instances = self.instances.read().await;
        let mut all: Vec<ServiceInstance> = instances.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// True when no instances are registered
    pub async fn is_empty(&self) -> bool {
        self.instances.read().await.is_empty()
    }

    /// Number of registered instances
    pub async fn len(&self) -> usize {
        self.instances.read().await.len()
    }

    /// Registry statistics snapshot
    pub async fn stats(&self) -> RegistryStats {
        let instances = self.instances.read().await;
        RegistryStats {
            instance_count: instances.len(),
            healthy_count: instances.values().filter(|i| i.healthy).count(),
        }
    }

    /// Drop all entries (facade teardown only)
    pub async fn clear(&self) {
        self.instances.write().await.clear();
        metrics::set_instance_gauges(self.subsystem.id(), 0, 0);
    }
}

// ============================================================================
// Tests
// ============================================================================
