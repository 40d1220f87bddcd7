//! Namespace Store and Invalidation Registry
//!
//! Two flat tables keyed by name:
//!
//! - `live`: units visible to ordinary resolution.
//! - `pending`: units marked stale and quarantined until they are next
//!   resolved. The unit object is kept, not destroyed, so its identity can
//!   be restored when it comes back.
//!
//! A name is in at most one of the two tables at any time.

use indexmap::IndexMap;

use super::name::UnitName;
use super::unit::Unit;

/// Visibility state of a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    /// Never constructed (or construction failed).
    Unregistered,
    /// Up to date; resolves without side effects.
    Live,
    /// Invalidated; the next resolution reloads it.
    Pending,
}

/// Live and pending unit tables.
#[derive(Debug, Default)]
pub struct Registry {
    live: IndexMap<UnitName, Unit>,
    pending: IndexMap<UnitName, Unit>,
}

impl Registry {
    /// Create empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Which table, if any, holds `name`.
    pub fn state_of(&self, name: &str) -> UnitState {
        if self.live.contains_key(name) {
            UnitState::Live
        } else if self.pending.contains_key(name) {
            UnitState::Pending
        } else {
            UnitState::Unregistered
        }
    }

    /// The Live unit at `name`.
    pub fn live(&self, name: &str) -> Option<&Unit> {
        self.live.get(name)
    }

    /// True if `name` is quarantined.
    pub fn is_pending(&self, name: &str) -> bool {
        self.pending.contains_key(name)
    }

    /// Register a freshly constructed unit as Live.
    ///
    /// Only for Unregistered names; a Pending unit comes back through
    /// [`take_pending`](Self::take_pending) so its object is kept.
    pub fn insert_live(&mut self, unit: Unit) {
        debug_assert!(
            !self.pending.contains_key(unit.name()),
            "constructing over pending unit `{}`",
            unit.name()
        );
        self.live.insert(unit.name().clone(), unit);
    }

    /// Drop a Live registration (used when first construction fails).
    pub fn remove_live(&mut self, name: &str) -> Option<Unit> {
        self.live.shift_remove(name)
    }

    /// Move `root` and every Live descendant of it into Pending.
    ///
    /// Unit contents are left untouched. Names that are already Pending or
    /// not registered are ignored. Returns the names that moved.
    pub fn invalidate(&mut self, root: &str) -> Vec<UnitName> {
        let stale: Vec<UnitName> = self
            .live
            .keys()
            .filter(|name| name.is_descendant_of(root))
            .cloned()
            .collect();

        for name in &stale {
            if let Some(unit) = self.live.shift_remove(name) {
                self.pending.insert(name.clone(), unit);
            }
        }
        stale
    }

    /// Move a Pending unit back to Live and hand it out.
    ///
    /// Both steps happen together, so no caller can observe the name in
    /// neither table.
    pub fn take_pending(&mut self, name: &str) -> Option<Unit> {
        let (name, unit) = self.pending.shift_remove_entry(name)?;
        self.live.insert(name, unit.clone());
        Some(unit)
    }

    /// Live names in registration order.
    pub fn live_names(&self) -> Vec<UnitName> {
        self.live.keys().cloned().collect()
    }

    /// Pending names in invalidation order.
    pub fn pending_names(&self) -> Vec<UnitName> {
        self.pending.keys().cloned().collect()
    }

    /// Number of Live names.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Number of Pending names.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
