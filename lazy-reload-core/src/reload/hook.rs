//! Interception Layer
//!
//! Every resolution goes through a chain of [`Interceptor`]s before the
//! manager's own lookup. There are two hook points:
//!
//! - `on_resolve`: whole-unit resolution by name.
//! - `on_fetch`: extraction of a named member from an already resolved
//!   parent. The member may already be cached as an attribute, so without
//!   this hook a fetch could hand out a reference from before a reload.
//!
//! The chain deduplicates by [`Interceptor::kind`]: installing a hook whose
//! kind is already present replaces the old one. Re-installing the lazy
//! reload interceptor (which happens whenever the manager's own unit is
//! reloaded) therefore never leaves two copies firing for one resolution.

use std::sync::Arc;

use crate::error::Result;
use crate::namespace::{Unit, UnitName};

use super::manager::ReloadManager;

/// A hook on the manager's resolution paths.
pub trait Interceptor: Send + Sync {
    /// Deduplication key. At most one hook per kind is installed.
    fn kind(&self) -> &'static str;

    /// Called before `name` is looked up. Return `Some` to supply the unit
    /// and skip the rest of the chain and the native lookup.
    fn on_resolve(&self, manager: &ReloadManager, name: &UnitName) -> Result<Option<Unit>> {
        let _ = (manager, name);
        Ok(None)
    }

    /// Called when member `qualified` is fetched from the resolved `parent`,
    /// before the member's value is read.
    fn on_fetch(
        &self,
        manager: &ReloadManager,
        parent: &Unit,
        qualified: &UnitName,
    ) -> Result<Option<Unit>> {
        let _ = (manager, parent, qualified);
        Ok(None)
    }
}

/// The lazy reload hook: sends Pending names through the reload executor.
#[derive(Debug, Default, Clone, Copy)]
pub struct PendingInterceptor;

impl PendingInterceptor {
    /// Kind under which the lazy reload hook is installed.
    pub const KIND: &'static str = "lazy-reload";

    fn reload_if_pending(manager: &ReloadManager, name: &UnitName) -> Result<Option<Unit>> {
        if manager.is_pending(name.as_str()) {
            manager.reload(name).map(Some)
        } else {
            Ok(None)
        }
    }
}

impl Interceptor for PendingInterceptor {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn on_resolve(&self, manager: &ReloadManager, name: &UnitName) -> Result<Option<Unit>> {
        Self::reload_if_pending(manager, name)
    }

    fn on_fetch(
        &self,
        manager: &ReloadManager,
        _parent: &Unit,
        qualified: &UnitName,
    ) -> Result<Option<Unit>> {
        Self::reload_if_pending(manager, qualified)
    }
}

/// Ordered, deduplicated list of interceptors.
#[derive(Clone, Default)]
pub struct HookChain {
    hooks: Vec<Arc<dyn Interceptor>>,
}

impl HookChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `hook`, first discarding any installed hook of the same kind.
    ///
    /// Returns true if a duplicate was discarded.
    pub fn install(&mut self, hook: Arc<dyn Interceptor>) -> bool {
        let kind = hook.kind();
        let before = self.hooks.len();
        self.hooks.retain(|existing| existing.kind() != kind);
        let replaced = self.hooks.len() != before;
        self.hooks.push(hook);
        replaced
    }

    /// Remove the hook of `kind`. Returns true if one was installed.
    pub fn remove(&mut self, kind: &str) -> bool {
        let before = self.hooks.len();
        self.hooks.retain(|existing| existing.kind() != kind);
        self.hooks.len() != before
    }

    /// Number of installed hooks.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// True if no hook is installed.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Copy of the current hooks, so they can run without borrowing the chain.
    pub fn snapshot(&self) -> Vec<Arc<dyn Interceptor>> {
        self.hooks.clone()
    }

    /// Kinds of the installed hooks, in run order.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.hooks.iter().map(|hook| hook.kind()).collect()
    }
}

impl std::fmt::Debug for HookChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.kinds()).finish()
    }
}
