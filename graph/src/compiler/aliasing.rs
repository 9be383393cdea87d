//! Physical slot assignment for logical resources.
//!
//! Two logical resources may share a physical slot when they have the same
//! kind and their lifetimes do not overlap. A lifetime ending at step `n`
//! still conflicts with one starting at step `n`: the pass at `n` reads the
//! first while writing the second.

use crate::resource::ResourceKind;

use super::LogicalResource;

#[derive(Debug)]
struct Slot {
    kind: ResourceKind,
    /// Last step using the slot, `None` once a persistent resource holds it.
    busy_until: Option<usize>,
}

/// Assign a slot to every resource and return the kind of each slot.
///
/// `resources` must be sorted by first use, which is how the compiler
/// creates them. Each resource takes the lowest-numbered free slot of its kind
/// and opens a new slot when none is free.
pub(crate) fn assign_slots(resources: &mut [LogicalResource]) -> Vec<ResourceKind> {
    let mut slots: Vec<Slot> = Vec::new();

    for resource in resources.iter_mut() {
        let first_use = resource.lifetime.first_use;
        let free = slots.iter().position(|slot| {
            slot.kind == resource.kind && slot.busy_until.is_some_and(|end| end < first_use)
        });

        let index = free.unwrap_or_else(|| {
            slots.push(Slot {
                kind: resource.kind,
                busy_until: None,
            });
            slots.len() - 1
        });

        slots[index].busy_until = if resource.persistent {
            None
        } else {
            Some(resource.lifetime.last_use)
        };
        resource.slot = index;
    }

    slots.into_iter().map(|slot| slot.kind).collect()
}
