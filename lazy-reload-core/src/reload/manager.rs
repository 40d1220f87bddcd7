//! Reload Manager
//!
//! The manager is the central coordinator. It owns the namespace tables, the
//! reload history and the interception chain, and it is the only way host
//! code is allowed to look units up.
//!
//! # How It Works
//!
//! 1. `invalidate(root)` moves `root` and every Live descendant into Pending.
//!    Nothing is reloaded yet.
//!
//! 2. `resolve(name)` runs the interception chain first. The lazy reload
//!    interceptor spots a Pending name and hands it to the reload executor.
//!
//! 3. The executor moves the name back to Live *before* running the host's
//!    reinitialize. Setup code that resolves the same unit again (directly
//!    or around a cycle) finds it Live and gets the in-progress object back
//!    instead of starting a second reload. This ordering is what makes
//!    cyclic unit graphs terminate.
//!
//! 4. Names that are neither Live nor Pending are constructed by the host,
//!    again registering them Live before their setup runs.
//!
//! # Thread Safety
//!
//! All state sits behind one reentrant mutex, held for a whole resolution
//! event: the hook check, any reload, and the history append. Nested
//! resolutions from setup code on the same thread re-enter the lock; other
//! threads wait, so two threads can never both see a name as Pending and
//! reload it twice. Setup code must therefore not block on another thread
//! that resolves through the same manager.

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use tracing::{debug, info_span, trace, warn};

use crate::config::ReloadConfig;
use crate::error::{ReloadError, Result};
use crate::namespace::{Attr, Registry, Unit, UnitName, UnitState};

use super::context::{LoadContext, LoadKind};
use super::history::{ReloadHistory, ReloadRecord};
use super::hook::{HookChain, Interceptor, PendingInterceptor};
use super::loader::Loader;

/// Something that names a unit: a name string or the unit itself.
pub trait ReloadTarget {
    /// The canonical name, or the reason this does not name a unit.
    fn unit_name(&self) -> Result<UnitName>;
}

impl ReloadTarget for str {
    fn unit_name(&self) -> Result<UnitName> {
        UnitName::new(self)
    }
}

impl ReloadTarget for String {
    fn unit_name(&self) -> Result<UnitName> {
        self.as_str().unit_name()
    }
}

impl ReloadTarget for UnitName {
    fn unit_name(&self) -> Result<UnitName> {
        Ok(self.clone())
    }
}

impl ReloadTarget for Unit {
    fn unit_name(&self) -> Result<UnitName> {
        Ok(self.name().clone())
    }
}

impl<T: ReloadTarget + ?Sized> ReloadTarget for &T {
    fn unit_name(&self) -> Result<UnitName> {
        (**self).unit_name()
    }
}

#[derive(Default)]
struct State {
    registry: Registry,
    history: ReloadHistory,
    hooks: HookChain,
}

/// Lazy invalidation and reload of a namespace of units.
pub struct ReloadManager {
    loader: Arc<dyn Loader>,
    config: ReloadConfig,
    self_name: Option<UnitName>,
    state: ReentrantMutex<RefCell<State>>,
}

impl ReloadManager {
    /// Create a manager with the default configuration.
    pub fn new(loader: impl Loader + 'static) -> Self {
        Self::build(Arc::new(loader), ReloadConfig::default(), None)
    }

    /// Create a manager with an explicit configuration.
    pub fn with_config(loader: impl Loader + 'static, config: ReloadConfig) -> Result<Self> {
        let self_name = config.self_unit_name()?;
        Ok(Self::build(Arc::new(loader), config, self_name))
    }

    fn build(loader: Arc<dyn Loader>, config: ReloadConfig, self_name: Option<UnitName>) -> Self {
        let manager = Self {
            loader,
            config,
            self_name,
            state: ReentrantMutex::new(RefCell::new(State::default())),
        };

        manager.install_interceptor(Arc::new(PendingInterceptor));

        if let Some(name) = manager.self_name.clone() {
            let unit = Unit::new(name);
            manager.describe_self(&unit);
            unit.bump_generation();
            manager.with_state(|state| state.registry.insert_live(unit));
        }

        manager
    }

    /// The configuration this manager was built with.
    pub fn config(&self) -> &ReloadConfig {
        &self.config
    }

    /// Name the manager is registered under, if any.
    pub fn self_name(&self) -> Option<&UnitName> {
        self.self_name.as_ref()
    }

    /// Run `f` against the state. `f` must not call back into the manager
    /// or the host.
    fn with_state<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        f(&mut state)
    }

    // ------------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------------

    /// Look up a unit by name, reloading or constructing it as needed.
    pub fn resolve(&self, name: &str) -> Result<Unit> {
        let name = UnitName::new(name)?;
        let _event = self.state.lock();

        if !self.config.resolve_ancestors {
            return self.resolve_one(&name);
        }

        let mut resolved = None;
        for step in name.ancestors() {
            resolved = Some(self.resolve_one(&step)?);
        }
        resolved.ok_or(ReloadError::NotFound(name))
    }

    fn resolve_one(&self, name: &UnitName) -> Result<Unit> {
        trace!(unit = %name, "resolve");

        for hook in self.with_state(|state| state.hooks.snapshot()) {
            if let Some(unit) = hook.on_resolve(self, name)? {
                return Ok(unit);
            }
        }

        let (visibility, live) = self.with_state(|state| {
            let registry = &state.registry;
            (registry.state_of(name.as_str()), registry.live(name.as_str()).cloned())
        });

        match (visibility, live) {
            (UnitState::Live, Some(unit)) => {
                if LoadContext::is_loading(unit.id()) {
                    debug!(
                        unit = %name,
                        requested_by = ?LoadContext::current(),
                        kind = ?LoadContext::current_kind(),
                        "returning unit whose setup is still running"
                    );
                }
                Ok(unit)
            }
            (UnitState::Pending, _) => Err(ReloadError::Quarantined(name.clone())),
            _ => self.construct(name),
        }
    }

    fn construct(&self, name: &UnitName) -> Result<Unit> {
        if !self.loader.provides(name) {
            return Err(ReloadError::NotFound(name.clone()));
        }

        let unit = Unit::new(name.clone());
        self.with_state(|state| state.registry.insert_live(unit.clone()));
        debug!(unit = %name, "constructing");

        let outcome = {
            let _ctx = LoadContext::enter(unit.id(), name.clone(), LoadKind::Initialize);
            self.loader.initialize(self, &unit)
        };

        match outcome {
            Ok(()) => {
                unit.bump_generation();
                self.bind_to_parent(&unit);
                Ok(unit)
            }
            Err(source) => {
                self.with_state(|state| {
                    let ours = state
                        .registry
                        .live(name.as_str())
                        .is_some_and(|live| live.ptr_eq(&unit));
                    if ours {
                        state.registry.remove_live(name.as_str());
                    }
                });
                warn!(unit = %name, error = %source, "initialize failed; unit discarded");
                Err(ReloadError::Initialize {
                    name: name.clone(),
                    source,
                })
            }
        }
    }

    /// Expose `unit` as an attribute of its Live parent.
    fn bind_to_parent(&self, unit: &Unit) {
        let Some(parent_name) = unit.name().parent() else {
            return;
        };
        let parent = self.with_state(|state| state.registry.live(parent_name.as_str()).cloned());
        if let Some(parent) = parent {
            parent.set_attr(unit.name().last_segment(), unit);
        }
    }

    // ------------------------------------------------------------------------
    // Member fetch
    // ------------------------------------------------------------------------

    /// Fetch one member of the unit named `parent`.
    pub fn fetch_member(&self, parent: &str, member: &str) -> Result<Attr> {
        let _event = self.state.lock();
        let parent = self.resolve(parent)?;
        self.fetch_one(&parent, member)
    }

    /// Fetch several members of the unit named `parent`, in order.
    ///
    /// Each member whose qualified name is Pending is reloaded before its
    /// value is read. Members that are not Pending are left alone.
    pub fn fetch_members(&self, parent: &str, members: &[&str]) -> Result<Vec<Attr>> {
        let _event = self.state.lock();
        let parent = self.resolve(parent)?;
        members
            .iter()
            .map(|member| self.fetch_one(&parent, member))
            .collect()
    }

    fn fetch_one(&self, parent: &Unit, member: &str) -> Result<Attr> {
        let qualified = parent.name().child(member)?;

        for hook in self.with_state(|state| state.hooks.snapshot()) {
            if let Some(unit) = hook.on_fetch(self, parent, &qualified)? {
                return Ok(Attr::Unit(unit));
            }
        }

        if let Some(attr) = parent.attr(member) {
            return Ok(attr);
        }

        let known = self.state_of(qualified.as_str()) != UnitState::Unregistered;
        if known || self.loader.provides(&qualified) {
            return self.resolve(qualified.as_str()).map(Attr::Unit);
        }

        Err(ReloadError::MissingMember {
            parent: parent.name().clone(),
            member: member.to_string(),
        })
    }

    // ------------------------------------------------------------------------
    // Invalidation
    // ------------------------------------------------------------------------

    /// Mark `target` and every unit nested under it as stale.
    ///
    /// Nothing is reloaded here; each unit reloads the next time it is
    /// resolved. Unknown or already Pending names are ignored.
    pub fn invalidate(&self, target: impl ReloadTarget) {
        let root = match target.unit_name() {
            Ok(root) => root,
            Err(err) => {
                debug!(error = %err, "invalidate: not a unit name, ignoring");
                return;
            }
        };

        let moved = self.with_state(|state| state.registry.invalidate(root.as_str()));
        debug!(root = %root, count = moved.len(), "invalidated");
    }

    /// Invalidate `target` and resolve it immediately.
    pub fn reload_now(&self, target: impl ReloadTarget) -> Result<Unit> {
        let name = target.unit_name()?;
        let _event = self.state.lock();
        self.invalidate(&name);
        self.resolve(name.as_str())
    }

    // ------------------------------------------------------------------------
    // Reload executor
    // ------------------------------------------------------------------------

    /// Bring a Pending unit back: Live first, then reinitialize.
    pub(crate) fn reload(&self, name: &UnitName) -> Result<Unit> {
        let _event = self.state.lock();

        let unit = self
            .with_state(|state| state.registry.take_pending(name.as_str()))
            .ok_or_else(|| ReloadError::NotPending(name.clone()))?;

        if self.config.purge_on_reload {
            let purged = unit.purge_descendant_attrs();
            if !purged.is_empty() {
                debug!(unit = %name, ?purged, "purged nested unit attributes");
            }
        }

        let depth = LoadContext::depth();
        self.with_state(|state| state.history.record(name.clone(), depth));

        let span = info_span!("reload", unit = %name, depth);
        let _entered = span.enter();

        let outcome = {
            let _ctx = LoadContext::enter(unit.id(), name.clone(), LoadKind::Reinitialize);
            if self.is_self(name) {
                self.reinitialize_self(&unit);
                Ok(())
            } else {
                self.loader.reinitialize(self, &unit)
            }
        };

        match outcome {
            Ok(()) => {
                let generation = unit.bump_generation();
                self.bind_to_parent(&unit);
                debug!(generation, "reloaded");
                Ok(unit)
            }
            Err(source) => {
                warn!(error = %source, "reinitialize failed; unit left live");
                Err(ReloadError::Reinitialize {
                    name: name.clone(),
                    source,
                })
            }
        }
    }

    fn is_self(&self, name: &UnitName) -> bool {
        self.self_name.as_ref() == Some(name)
    }

    /// Reload of the manager's own unit. Bookkeeping stays as it is; only the
    /// interception layer is installed again, replacing the old copy.
    fn reinitialize_self(&self, unit: &Unit) {
        if self.install_interceptor(Arc::new(PendingInterceptor)) {
            debug!("replaced previously installed lazy reload interceptor");
        }
        self.describe_self(unit);
    }

    fn describe_self(&self, unit: &Unit) {
        unit.set_attr("version", serde_json::json!(env!("CARGO_PKG_VERSION")));
        unit.set_attr("interceptors", serde_json::json!(self.interceptor_kinds()));
    }

    // ------------------------------------------------------------------------
    // Interception chain
    // ------------------------------------------------------------------------

    /// Install `hook`, replacing any hook of the same kind.
    ///
    /// Returns true if a previous hook of that kind was replaced.
    pub fn install_interceptor(&self, hook: Arc<dyn Interceptor>) -> bool {
        self.with_state(|state| state.hooks.install(hook))
    }

    /// Remove the hook of `kind`. Removing [`PendingInterceptor::KIND`]
    /// turns lazy reloading off: Pending names then fail to resolve with
    /// [`ReloadError::Quarantined`] until the interceptor is installed again.
    pub fn remove_interceptor(&self, kind: &str) -> bool {
        self.with_state(|state| state.hooks.remove(kind))
    }

    /// Number of installed interceptors.
    pub fn interceptor_count(&self) -> usize {
        self.with_state(|state| state.hooks.len())
    }

    /// Kinds of the installed interceptors, in the order they run.
    pub fn interceptor_kinds(&self) -> Vec<&'static str> {
        self.with_state(|state| state.hooks.kinds())
    }

    // ------------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------------

    /// Current visibility state of `name`.
    pub fn state_of(&self, name: &str) -> UnitState {
        self.with_state(|state| state.registry.state_of(name))
    }

    /// True if `name` has been invalidated and not reloaded since.
    pub fn is_pending(&self, name: &str) -> bool {
        self.with_state(|state| state.registry.is_pending(name))
    }

    /// The Live unit at `name`, without running hooks or constructing.
    pub fn peek(&self, name: &str) -> Option<Unit> {
        self.with_state(|state| state.registry.live(name).cloned())
    }

    /// Names currently Live, in registration order.
    pub fn live_names(&self) -> Vec<UnitName> {
        self.with_state(|state| state.registry.live_names())
    }

    /// Names currently Pending, in invalidation order.
    pub fn pending_names(&self) -> Vec<UnitName> {
        self.with_state(|state| state.registry.pending_names())
    }

    /// Snapshot of the reload history.
    pub fn history(&self) -> ReloadHistory {
        self.with_state(|state| state.history.clone())
    }

    /// Reloaded names so far, in invocation order.
    pub fn history_names(&self) -> Vec<UnitName> {
        self.with_state(|state| state.history.names())
    }

    /// Drain the history.
    pub fn take_history(&self) -> Vec<ReloadRecord> {
        self.with_state(|state| state.history.take())
    }
}

impl fmt::Debug for ReloadManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with_state(|state| {
            f.debug_struct("ReloadManager")
                .field("self_name", &self.self_name)
                .field("live", &state.registry.live_count())
                .field("pending", &state.registry.pending_count())
                .field("history", &state.history.len())
                .field("hooks", &state.hooks)
                .finish()
        })
    }
}
