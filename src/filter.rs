//! Capability filtering over registry snapshots
//!
//! Pure sub-selection used to carve a snapshot into sub-populations, e.g.
//! SIP-capable recorders vs plain ones. Output ordering is id-ascending so
//! selection and tests stay reproducible for equal input; an empty result is
//! a normal outcome, never an error.

use crate::registry::ServiceInstance;

/// Select the instances matching `predicate`, ordered by id ascending
pub fn select<F>(snapshot: &[ServiceInstance], predicate: F) -> Vec<ServiceInstance>
where
    F: Fn(&ServiceInstance) -> bool,
{
    let mut matched: Vec<ServiceInstance> = snapshot
        .iter()
        .filter(|instance| predicate(instance))
        .cloned()
        .collect();
    matched.sort_by(|a, b| a.id.cmp(&b.id));
    matched
}

/// First instance matching `predicate` under the stable ordering
pub fn first<F>(snapshot: &[ServiceInstance], predicate: F) -> Option<ServiceInstance>
where
    F: Fn(&ServiceInstance) -> bool,
{
    select(snapshot, predicate).into_iter().next()
}

/// Predicate for SIP-capable instances
pub fn sip_capable(instance: &ServiceInstance) -> bool {
    instance.sip
}

/// Predicate for plain (non-SIP) instances
pub fn non_sip(instance: &ServiceInstance) -> bool {
    !instance.sip
}

// ============================================================================
// Tests
// ============================================================================
