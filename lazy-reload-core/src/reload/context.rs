//! Load Context
//!
//! Tracks which units are in the middle of their setup on the current thread.
//!
//! # Implementation
//!
//! A thread-local stack. Running a unit's setup (first construction or a
//! reload) pushes the unit; the guard pops it when the setup returns. Setup
//! code resolves its own dependencies, so the stack mirrors the depth-first
//! walk through the unit graph. A unit appearing on the stack is exactly the
//! "still initializing" object that a reentrant resolution hands back.

use std::cell::RefCell;

use crate::namespace::{UnitId, UnitName};

thread_local! {
    static LOAD_STACK: RefCell<Vec<LoadEntry>> = const { RefCell::new(Vec::new()) };
}

/// Why a unit's setup is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadKind {
    Initialize,
    Reinitialize,
}

#[derive(Debug, Clone)]
struct LoadEntry {
    id: UnitId,
    name: UnitName,
    kind: LoadKind,
}

/// Guard that pops the entry when dropped, panics included.
pub struct LoadContext {
    id: UnitId,
}

impl LoadContext {
    /// Mark `id` as loading on this thread until the guard drops.
    pub fn enter(id: UnitId, name: UnitName, kind: LoadKind) -> Self {
        LOAD_STACK.with(|stack| stack.borrow_mut().push(LoadEntry { id, name, kind }));
        Self { id }
    }

    /// Number of setups in flight on this thread.
    pub fn depth() -> usize {
        LOAD_STACK.with(|stack| stack.borrow().len())
    }

    /// True if any setup is in flight on this thread.
    pub fn is_active() -> bool {
        Self::depth() > 0
    }

    /// Name of the innermost unit being set up, if any.
    pub fn current() -> Option<UnitName> {
        LOAD_STACK.with(|stack| stack.borrow().last().map(|entry| entry.name.clone()))
    }

    /// Whether the innermost setup is a first load or a reload.
    pub fn current_kind() -> Option<LoadKind> {
        LOAD_STACK.with(|stack| stack.borrow().last().map(|entry| entry.kind))
    }

    /// True if the unit's setup is somewhere on this thread's stack.
    pub fn is_loading(id: UnitId) -> bool {
        LOAD_STACK.with(|stack| stack.borrow().iter().any(|entry| entry.id == id))
    }
}

impl Drop for LoadContext {
    fn drop(&mut self) {
        LOAD_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.id, self.id,
                    "LoadContext mismatch: expected {:?}, got {:?}",
                    self.id, entry.id
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> UnitName {
        UnitName::new(s).unwrap()
    }

    #[test]
    fn context_tracks_current_unit() {
        let id = UnitId::new();

        assert!(!LoadContext::is_active());
        assert!(LoadContext::current().is_none());

        {
            let _ctx = LoadContext::enter(id, name("test"), LoadKind::Reinitialize);
            assert!(LoadContext::is_active());
            assert_eq!(LoadContext::current(), Some(name("test")));
            assert_eq!(LoadContext::current_kind(), Some(LoadKind::Reinitialize));
            assert!(LoadContext::is_loading(id));
        }

        assert!(!LoadContext::is_active());
        assert!(!LoadContext::is_loading(id));
    }

    #[test]
    fn nested_contexts() {
        let outer = UnitId::new();
        let inner = UnitId::new();

        let _outer = LoadContext::enter(outer, name("test.c"), LoadKind::Reinitialize);
        {
            let _inner = LoadContext::enter(inner, name("test.c.d"), LoadKind::Initialize);
            assert_eq!(LoadContext::depth(), 2);
            assert_eq!(LoadContext::current(), Some(name("test.c.d")));
            assert!(LoadContext::is_loading(outer));
        }

        assert_eq!(LoadContext::depth(), 1);
        assert_eq!(LoadContext::current(), Some(name("test.c")));
    }

    #[test]
    fn guard_pops_on_panic() {
        let id = UnitId::new();
        let result = std::panic::catch_unwind(|| {
            let _ctx = LoadContext::enter(id, name("boom"), LoadKind::Initialize);
            panic!("setup exploded");
        });

        assert!(result.is_err());
        assert!(!LoadContext::is_loading(id));
    }
}
