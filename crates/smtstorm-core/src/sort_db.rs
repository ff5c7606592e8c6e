//! The sort database.
//!
//! Sorts are never evicted by pop (they live until `reset` or run end).
//! The kind and BV-width indexes exist for constrained sampling; insertion
//! order is kept so uniform picks are stable. Ids are monotonic and never
//! reused, even across `clear`.

use smtstorm_solver::{Solver, SortHandle, SortKind, SortParams};
use std::collections::HashMap;

/// A solver sort as the tester sees it.
#[derive(Debug, Clone)]
pub struct Sort {
    /// Monotonic id, unique within a run, assigned at creation.
    pub id: u64,
    pub kind: SortKind,
    /// The adapter's handle.
    pub handle: SortHandle,
    pub params: SortParams,
}

impl Sort {
    pub fn bv_width(&self) -> Option<u32> {
        self.params.bv_width()
    }
}

/// All created sorts with their sampling indexes.
#[derive(Debug, Default)]
pub struct SortDb {
    sorts: HashMap<u64, Sort>,
    /// Insertion order of live ids.
    order: Vec<u64>,
    next_id: u64,
    by_kind: HashMap<SortKind, Vec<u64>>,
    bv_by_width: HashMap<u32, Vec<u64>>,
}

impl SortDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        let next_id = self.next_id;
        *self = Self::default();
        self.next_id = next_id;
    }

    /// Insert a sort, assigning the next id.  Returns the id.
    pub fn add(&mut self, kind: SortKind, handle: SortHandle, params: SortParams) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.by_kind.entry(kind).or_default().push(id);
        if let SortParams::Bv { width } = params {
            self.bv_by_width.entry(width).or_default().push(id);
        }
        self.order.push(id);
        self.sorts.insert(
            id,
            Sort {
                id,
                kind,
                handle,
                params,
            },
        );
        id
    }

    pub fn len(&self) -> usize {
        self.sorts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorts.is_empty()
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn get(&self, id: u64) -> Option<&Sort> {
        self.sorts.get(&id)
    }

    /// Live ids in insertion order.
    pub fn ids(&self) -> &[u64] {
        &self.order
    }

    /// Ids of sorts of `kind`.
    pub fn ids_of_kind(&self, kind: SortKind) -> &[u64] {
        self.by_kind.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ids of BV sorts with exactly `width` bits.
    pub fn bv_ids_of_width(&self, width: u32) -> &[u64] {
        self.bv_by_width
            .get(&width)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Ids of BV sorts with at most `max` bits.
    pub fn bv_ids_up_to(&self, max: u32) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .bv_by_width
            .iter()
            .filter(|(w, _)| **w <= max)
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn has_kind(&self, kind: SortKind) -> bool {
        !self.ids_of_kind(kind).is_empty()
    }

    /// The sort wrapping `handle`, consulting the adapter's equality.
    pub fn find_by_handle(&self, handle: SortHandle, solver: &dyn Solver) -> Option<&Sort> {
        self.order
            .iter()
            .filter_map(|id| self.sorts.get(id))
            .find(|s| solver.sorts_equal(s.handle, handle))
    }
}
