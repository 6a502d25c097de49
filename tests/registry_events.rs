//! Property tests for registry membership
//!
//! A registry fed any sequence of join/update/leave events must converge to
//! exactly the set of instances that joined and did not subsequently leave,
//! with the last delivered payload, regardless of duplicate joins, duplicate
//! leaves or updates for unknown ids.

use podium::presence::{InstanceState, PresenceEvent};
use podium::registry::{InstanceRegistry, Subsystem};
use proptest::prelude::*;
use std::collections::HashMap;

/// Small id space so sequences collide often
fn instance_id() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("jvb-a".to_string()),
        Just("jvb-b".to_string()),
        Just("jvb-c".to_string()),
        Just("jvb-d".to_string()),
    ]
}

fn event() -> impl Strategy<Value = PresenceEvent> {
    prop_oneof![
        (instance_id(), any::<bool>(), 0u32..16, any::<bool>()).prop_map(
            |(id, sip, load, healthy)| PresenceEvent::Joined {
                id,
                sip,
                state: InstanceState {
                    healthy,
                    load,
                    version: None,
                    region: None,
                },
            }
        ),
        (instance_id(), 0u32..16, any::<bool>()).prop_map(|(id, load, healthy)| {
            PresenceEvent::Updated {
                id,
                state: InstanceState {
                    healthy,
                    load,
                    version: None,
                    region: None,
                },
            }
        }),
        instance_id().prop_map(|id| PresenceEvent::Left { id }),
    ]
}

/// Reference model: id -> (load, healthy) of the last applied payload
fn run_model(events: &[PresenceEvent]) -> HashMap<String, (u32, bool)> {
    let mut model = HashMap::new();
    for event in events {
        match event {
            PresenceEvent::Joined { id, state, .. } => {
                // Duplicate join is an update on membership
                model.insert(id.clone(), (state.load, state.healthy));
            }
            PresenceEvent::Updated { id, state } => {
                if let Some(entry) = model.get_mut(id) {
                    *entry = (state.load, state.healthy);
                }
            }
            PresenceEvent::Left { id } => {
                model.remove(id);
            }
        }
    }
    model
}

proptest! {
    #[test]
    fn registry_converges_to_model(events in proptest::collection::vec(event(), 0..48)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();

        rt.block_on(async {
            let registry = InstanceRegistry::new(Subsystem::Bridge);
            for ev in events.clone() {
                registry.apply_event(ev).await;
            }

            let expected = run_model(&events);
            let snapshot = registry.snapshot().await;

            assert_eq!(snapshot.len(), expected.len());
            for instance in &snapshot {
                let (load, healthy) = expected
                    .get(&instance.id)
                    .expect("instance missing from model");
                assert_eq!(instance.load, *load);
                assert_eq!(instance.healthy, *healthy);
            }
        });
    }

    #[test]
    fn snapshot_is_always_id_ordered(events in proptest::collection::vec(event(), 0..48)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();

        rt.block_on(async {
            let registry = InstanceRegistry::new(Subsystem::Bridge);
            for ev in events {
                registry.apply_event(ev).await;
            }

            let snapshot = registry.snapshot().await;
            for pair in snapshot.windows(2) {
                assert!(pair[0].id < pair[1].id);
            }
        });
    }
}

/// The worked example behind the property: leaves only remove their own
/// join, strays are no-ops.
#[tokio::test]
async fn test_unmatched_events_do_not_disturb_membership() {
    let registry = InstanceRegistry::new(Subsystem::Bridge);

    let events = vec![
        PresenceEvent::Left { id: "jvb-a".to_string() }, // stray leave
        PresenceEvent::Joined {
            id: "jvb-a".to_string(),
            sip: false,
            state: InstanceState::with_load(1),
        },
        PresenceEvent::Updated {
            id: "jvb-b".to_string(), // update before join
            state: InstanceState::with_load(7),
        },
        PresenceEvent::Joined {
            id: "jvb-b".to_string(),
            sip: false,
            state: InstanceState::with_load(2),
        },
        PresenceEvent::Joined {
            id: "jvb-b".to_string(), // duplicate join
            sip: false,
            state: InstanceState::with_load(3),
        },
        PresenceEvent::Left { id: "jvb-a".to_string() },
        PresenceEvent::Left { id: "jvb-a".to_string() }, // duplicate leave
    ];

    for event in events {
        registry.apply_event(event).await;
    }

    let snapshot = registry.snapshot().await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, "jvb-b");
    assert_eq!(snapshot[0].load, 3);
}
