//! The term database.
//!
//! Terms are indexed by `(sort kind, scope level)`, by sort, and by kind
//! count, with variables, values and length-1 string values tracked
//! separately.  The scope level of a term is the push/pop depth at which it
//! was created; `pop` evicts everything above the new level while ids keep
//! counting up and are never reused.
//!
//! Quantifier binders open a level too: `open_var_level` makes a fresh
//! level holding the bound variable, and `close_var_levels` (called when
//! the quantifier term is built) drops those levels again so the variables
//! survive only inside their binder.

use log::trace;
use smtstorm_solver::{Solver, SortKind, TermHandle};
use std::collections::HashMap;

/// A solver term as the tester sees it.
#[derive(Debug, Clone)]
pub struct Term {
    /// Monotonic id, unique within a run, assigned at creation.
    pub id: u64,
    /// The adapter's handle.
    pub handle: TermHandle,
    /// Id of the term's sort in the sort database.
    pub sort_id: u64,
    pub sort_kind: SortKind,
    /// Push/pop depth at creation time.
    pub level: u32,
    pub is_value: bool,
    pub is_var: bool,
}

/// All live terms with their sampling indexes.
#[derive(Debug, Default)]
pub struct TermDb {
    terms: HashMap<u64, Term>,
    next_id: u64,
    /// `(sort kind, level)` → term ids, insertion-ordered.
    by_kind_level: HashMap<(SortKind, u32), Vec<u64>>,
    /// sort id → term ids.
    by_sort: HashMap<u64, Vec<u64>>,
    /// sort id → value term ids.
    values_by_sort: HashMap<u64, Vec<u64>>,
    /// Length-1 string values (STR_FROM_CODE, re.range endpoints).
    string_char_values: Vec<u64>,
    /// level → variable ids.
    vars_by_level: HashMap<u32, Vec<u64>>,
    /// Count of terms ever created per sort kind (not decremented on pop).
    created_by_kind: HashMap<SortKind, u64>,
    /// Current scope level: solver push depth plus open binder levels.
    level: u32,
    /// How many of the innermost levels are quantifier binder levels.
    open_var_levels: u32,
}

impl TermDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        let next_id = self.next_id;
        *self = Self::default();
        self.next_id = next_id;
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn open_var_levels(&self) -> u32 {
        self.open_var_levels
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn get(&self, id: u64) -> Option<&Term> {
        self.terms.get(&id)
    }

    /// Terms ever created of `kind`, including popped ones.
    pub fn created_of_kind(&self, kind: SortKind) -> u64 {
        self.created_by_kind.get(&kind).copied().unwrap_or(0)
    }

    fn insert(
        &mut self,
        handle: TermHandle,
        sort_id: u64,
        sort_kind: SortKind,
        is_value: bool,
        is_var: bool,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        let term = Term {
            id,
            handle,
            sort_id,
            sort_kind,
            level: self.level,
            is_value,
            is_var,
        };
        self.by_kind_level
            .entry((sort_kind, self.level))
            .or_default()
            .push(id);
        self.by_sort.entry(sort_id).or_default().push(id);
        if is_value {
            self.values_by_sort.entry(sort_id).or_default().push(id);
        }
        if is_var {
            self.vars_by_level.entry(self.level).or_default().push(id);
        }
        *self.created_by_kind.entry(sort_kind).or_default() += 1;
        self.terms.insert(id, term);
        id
    }

    /// Insert a non-variable term (input, value or operator application).
    pub fn add_term(
        &mut self,
        handle: TermHandle,
        sort_id: u64,
        sort_kind: SortKind,
        is_value: bool,
    ) -> u64 {
        self.insert(handle, sort_id, sort_kind, is_value, false)
    }

    /// Insert a bound variable inside a fresh binder level.
    pub fn add_var(&mut self, handle: TermHandle, sort_id: u64, sort_kind: SortKind) -> u64 {
        self.level += 1;
        self.open_var_levels += 1;
        self.insert(handle, sort_id, sort_kind, false, true)
    }

    /// Record a length-1 string value (must already be inserted).
    pub fn add_string_char_value(&mut self, id: u64) {
        debug_assert!(self.terms.contains_key(&id));
        self.string_char_values.push(id);
    }

    /// Term ids of `kind` at exactly `level`.
    pub fn ids_of_kind_at(&self, kind: SortKind, level: u32) -> &[u64] {
        self.by_kind_level
            .get(&(kind, level))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of terms of `kind` visible at the current level.
    pub fn visible_of_kind(&self, kind: SortKind) -> usize {
        (0..=self.level)
            .map(|l| self.ids_of_kind_at(kind, l).len())
            .sum()
    }

    /// The `n`-th (0-based) visible term of `kind`, counting level 0 first.
    pub fn nth_visible_of_kind(&self, kind: SortKind, mut n: usize) -> Option<&Term> {
        for level in 0..=self.level {
            let ids = self.ids_of_kind_at(kind, level);
            if n < ids.len() {
                return self.terms.get(&ids[n]);
            }
            n -= ids.len();
        }
        None
    }

    /// Term ids of the given sort.
    pub fn ids_of_sort(&self, sort_id: u64) -> &[u64] {
        self.by_sort.get(&sort_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Value term ids of the given sort.
    pub fn value_ids_of_sort(&self, sort_id: u64) -> &[u64] {
        self.values_by_sort
            .get(&sort_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Length-1 string value ids.
    pub fn string_char_value_ids(&self) -> &[u64] {
        &self.string_char_values
    }

    /// Variable ids at the current level.
    pub fn var_ids_at_current(&self) -> &[u64] {
        self.vars_by_level
            .get(&self.level)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Sort kinds that currently have at least one visible term.
    pub fn kinds_with_terms(&self) -> Vec<SortKind> {
        SortKind::ALL
            .iter()
            .copied()
            .filter(|k| self.visible_of_kind(*k) > 0)
            .collect()
    }

    /// The live term wrapping `handle` with the given sort, consulting the
    /// adapter's equality.  Adapters may hand back bare handles; this maps
    /// them onto the registered term.
    pub fn find_by_handle(
        &self,
        handle: TermHandle,
        sort_id: u64,
        solver: &dyn Solver,
    ) -> Option<&Term> {
        self.ids_of_sort(sort_id)
            .iter()
            .filter_map(|id| self.terms.get(id))
            .find(|t| solver.terms_equal(t.handle, handle))
    }

    /// Open `n` solver scope levels.
    pub fn push(&mut self, n: u32) {
        debug_assert_eq!(self.open_var_levels, 0, "push inside a binder");
        self.level += n;
    }

    /// Close `n` solver scope levels, evicting everything above.
    pub fn pop(&mut self, n: u32) {
        debug_assert_eq!(self.open_var_levels, 0, "pop inside a binder");
        debug_assert!(n <= self.level);
        let new_level = self.level - n;
        self.evict_above(new_level);
        self.level = new_level;
    }

    /// Close all open binder levels, evicting the bound variables and any
    /// term built on top of them.
    pub fn close_var_levels(&mut self) {
        let new_level = self.level - self.open_var_levels;
        self.evict_above(new_level);
        self.level = new_level;
        self.open_var_levels = 0;
    }

    fn evict_above(&mut self, level: u32) {
        let doomed: Vec<u64> = self
            .terms
            .values()
            .filter(|t| t.level > level)
            .map(|t| t.id)
            .collect();
        if doomed.is_empty() {
            return;
        }
        trace!("evicting {} terms above level {}", doomed.len(), level);
        for id in &doomed {
            self.terms.remove(id);
        }
        let gone = |id: &u64| doomed.contains(id);
        self.by_kind_level.retain(|(_, l), ids| {
            if *l > level {
                return false;
            }
            ids.retain(|id| !gone(id));
            !ids.is_empty()
        });
        for ids in self.by_sort.values_mut() {
            ids.retain(|id| !gone(id));
        }
        self.by_sort.retain(|_, ids| !ids.is_empty());
        for ids in self.values_by_sort.values_mut() {
            ids.retain(|id| !gone(id));
        }
        self.values_by_sort.retain(|_, ids| !ids.is_empty());
        self.string_char_values.retain(|id| !gone(id));
        self.vars_by_level.retain(|l, _| *l <= level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_terms() -> TermDb {
        let mut db = TermDb::new();
        db.add_term(TermHandle(0), 0, SortKind::Bool, false);
        db.add_term(TermHandle(1), 1, SortKind::Bv, false);
        db.add_term(TermHandle(2), 1, SortKind::Bv, true);
        db
    }

    #[test]
    fn ids_are_monotonic() {
        let mut db = db_with_terms();
        assert_eq!(db.next_id(), 3);
        let id = db.add_term(TermHandle(3), 0, SortKind::Bool, false);
        assert_eq!(id, 3);
    }

    #[test]
    fn pop_evicts_scoped_terms_only() {
        let mut db = db_with_terms();
        db.push(2);
        let scoped = db.add_term(TermHandle(4), 1, SortKind::Bv, false);
        assert_eq!(db.visible_of_kind(SortKind::Bv), 3);
        db.pop(2);
        assert!(db.get(scoped).is_none());
        assert_eq!(db.visible_of_kind(SortKind::Bv), 2);
        // Base-level terms survive.
        assert!(db.get(0).is_some());
    }

    #[test]
    fn ids_not_reused_after_pop() {
        let mut db = db_with_terms();
        db.push(1);
        db.add_term(TermHandle(4), 0, SortKind::Bool, false);
        db.pop(1);
        let id = db.add_term(TermHandle(5), 0, SortKind::Bool, false);
        assert_eq!(id, 4);
    }

    #[test]
    fn values_indexed_separately() {
        let db = db_with_terms();
        assert_eq!(db.value_ids_of_sort(1), &[2]);
        assert!(db.value_ids_of_sort(0).is_empty());
    }

    #[test]
    fn binder_levels_scope_variables() {
        let mut db = db_with_terms();
        let var = db.add_var(TermHandle(4), 0, SortKind::Int);
        assert_eq!(db.level(), 1);
        assert_eq!(db.var_ids_at_current(), &[var]);
        // A body term built inside the binder.
        let body = db.add_term(TermHandle(5), 0, SortKind::Bool, false);
        db.close_var_levels();
        assert_eq!(db.level(), 0);
        assert!(db.get(var).is_none());
        assert!(db.get(body).is_none());
        assert!(db.var_ids_at_current().is_empty());
    }

    #[test]
    fn nth_visible_walks_levels_in_order() {
        let mut db = TermDb::new();
        let a = db.add_term(TermHandle(0), 0, SortKind::Int, false);
        db.push(1);
        let b = db.add_term(TermHandle(1), 0, SortKind::Int, false);
        assert_eq!(db.nth_visible_of_kind(SortKind::Int, 0).unwrap().id, a);
        assert_eq!(db.nth_visible_of_kind(SortKind::Int, 1).unwrap().id, b);
        assert!(db.nth_visible_of_kind(SortKind::Int, 2).is_none());
    }

    #[test]
    fn string_char_values_tracked() {
        let mut db = TermDb::new();
        let id = db.add_term(TermHandle(0), 0, SortKind::String, true);
        db.add_string_char_value(id);
        assert_eq!(db.string_char_value_ids(), &[id]);
        db.push(1);
        db.pop(1);
        assert_eq!(db.string_char_value_ids(), &[id]);
    }

    #[test]
    fn clear_keeps_id_monotonicity() {
        let mut db = db_with_terms();
        db.clear();
        assert!(db.is_empty());
        let id = db.add_term(TermHandle(9), 0, SortKind::Bool, false);
        assert_eq!(id, 3);
    }
}
