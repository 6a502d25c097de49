//! Presence feed from coordination groups
//!
//! Backend worker instances announce liveness and capability in shared
//! coordination groups. This module defines the membership events consumed by
//! the registries, the [`PresenceSource`] seam behind which the transport
//! lives, and an in-process source used by tests and by embedders that bridge
//! their own transport.
//!
//! The wire encoding of presence is out of scope; events arrive already
//! decoded. Per-instance ordering is assumed causal, cross-instance ordering
//! is not.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

// ============================================================================
// Instance State Payload
// ============================================================================

/// State payload an instance carries in its presence announcement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceState {
    /// Whether the instance reports itself able to take work
    pub healthy: bool,

    /// Current load signal (conference count)
    pub load: u32,

    /// Software version reported by the instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Deployment region reported by the instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl Default for InstanceState {
    fn default() -> Self {
        Self {
            healthy: true,
            load: 0,
            version: None,
            region: None,
        }
    }
}

impl InstanceState {
    /// Create a healthy state with the given load
    pub fn with_load(load: u32) -> Self {
        Self {
            load,
            ..Self::default()
        }
    }

    /// Create an unhealthy state
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::default()
        }
    }
}

// ============================================================================
// Membership Events
// ============================================================================

/// Membership change in a coordination group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PresenceEvent {
    /// An instance appeared in the group
    Joined {
        id: String,
        /// SIP-capable variant flag, fixed for the lifetime of the instance
        #[serde(default)]
        sip: bool,
        state: InstanceState,
    },

    /// An instance refreshed its presence payload
    Updated { id: String, state: InstanceState },

    /// An instance left the group
    Left { id: String },
}

impl PresenceEvent {
    /// Instance id the event refers to
    pub fn id(&self) -> &str {
        match self {
            Self::Joined { id, .. } | Self::Updated { id, .. } | Self::Left { id } => id,
        }
    }

    /// Short event name for logs and metrics labels
    pub fn name(&self) -> &'static str {
        match self {
            Self::Joined { .. } => "joined",
            Self::Updated { .. } => "updated",
            Self::Left { .. } => "left",
        }
    }
}

// ============================================================================
// Presence Source
// ============================================================================

/// Errors raised while subscribing to a coordination group
#[derive(Error, Debug)]
pub enum PresenceError {
    /// The requested group cannot be joined
    #[error("Coordination group unavailable: {0}")]
    GroupUnavailable(String),

    /// The underlying connection is gone
    #[error("Presence connection closed")]
    ConnectionClosed,
}

/// A live subscription to one coordination group
///
/// Dropping the subscription ends delivery; the source prunes the dead
/// channel on its next publish.
#[derive(Debug)]
pub struct PresenceSubscription {
    /// Group address this subscription watches
    pub group: String,

    /// Ordered event stream for the group
    pub events: mpsc::UnboundedReceiver<PresenceEvent>,
}

/// Source of membership events for named coordination groups
///
/// Implemented over the real signaling connection by the embedding
/// orchestrator; [`LocalPresenceSource`] covers tests and in-process wiring.
#[async_trait]
pub trait PresenceSource: Send + Sync {
    /// Subscribe to membership events for `group`
    async fn subscribe(&self, group: &str) -> Result<PresenceSubscription, PresenceError>;
}

// ============================================================================
// Local Presence Source
// ============================================================================

/// In-process presence source backed by unbounded channels
///
/// Publishing never blocks the delivery path. A group may be published to
/// before anyone subscribes; such events are dropped.
#[derive(Debug, Default)]
pub struct LocalPresenceSource {
    groups: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<PresenceEvent>>>>,
}

impl LocalPresenceSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to all current subscribers of `group`
    ///
    /// Closed subscriptions are pruned as a side effect.
    pub async fn publish(&self, group: &str, event: PresenceEvent) {
        let mut groups = self.groups.lock().await;
        if let Some(senders) = groups.get_mut(group) {
            senders.retain(|tx| tx.send(event.clone()).is_ok());
            if senders.is_empty() {
                groups.remove(group);
            }
        } else {
            tracing::debug!("Dropping presence event for unwatched group {}", group);
        }
    }

    /// Number of live subscriptions for `group`
    pub async fn subscriber_count(&self, group: &str) -> usize {
        self.groups
            .lock()
            .await
            .get(group)
            .map(|s| s.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl PresenceSource for LocalPresenceSource {
    async fn subscribe(&self, group: &str) -> Result<PresenceSubscription, PresenceError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.groups
            .lock()
            .await
            .entry(group.to_string())
            .or_default()
            .push(tx);

        Ok(PresenceSubscription {
            group: group.to_string(),
            events: rx,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_id_accessor() {
        let joined = PresenceEvent::Joined {
            id: "jvb-1".to_string(),
            sip: false,
            state: InstanceState::default(),
        };
        let left = PresenceEvent::Left {
            id: "jvb-1".to_string(),
        };

        assert_eq!(joined.id(), "jvb-1");
        assert_eq!(left.id(), "jvb-1");
        assert_eq!(joined.name(), "joined");
        assert_eq!(left.name(), "left");
    }

    #[test]
    fn test_event_serialization() {
        let event = PresenceEvent::Joined {
            id: "rec-2".to_string(),
            sip: true,
            state: InstanceState::with_load(3),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"joined\""));
        assert!(json.contains("\"sip\":true"));

        let back: PresenceEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_event_deserialization_defaults_sip() {
        let json = r#"{"type":"joined","id":"rec-1","state":{"healthy":true,"load":0}}"#;
        let event: PresenceEvent = serde_json::from_str(json).unwrap();

        match event {
            PresenceEvent::Joined { sip, .. } => assert!(!sip),
            _ => panic!("expected joined event"),
        }
    }

    #[tokio::test]
    async fn test_local_source_delivery() {
        let source = LocalPresenceSource::new();
        let mut sub = source.subscribe("bridges@conference.example").await.unwrap();

        source
            .publish(
                "bridges@conference.example",
                PresenceEvent::Joined {
                    id: "jvb-1".to_string(),
                    sip: false,
                    state: InstanceState::default(),
                },
            )
            .await;

        let event = sub.events.recv().await.unwrap();
        assert_eq!(event.id(), "jvb-1");
    }

    #[tokio::test]
    async fn test_local_source_unwatched_group() {
        let source = LocalPresenceSource::new();

        // No subscriber; must not panic or block
        source
            .publish(
                "nowhere@conference.example",
                PresenceEvent::Left {
                    id: "gone".to_string(),
                },
            )
            .await;

        assert_eq!(source.subscriber_count("nowhere@conference.example").await, 0);
    }

    #[tokio::test]
    async fn test_local_source_prunes_dropped_subscriptions() {
        let source = LocalPresenceSource::new();
        let sub = source.subscribe("recorders@conference.example").await.unwrap();
        assert_eq!(source.subscriber_count("recorders@conference.example").await, 1);

        drop(sub);
        source
            .publish(
                "recorders@conference.example",
                PresenceEvent::Left {
                    id: "rec-1".to_string(),
                },
            )
            .await;

        assert_eq!(source.subscriber_count("recorders@conference.example").await, 0);
    }
}
