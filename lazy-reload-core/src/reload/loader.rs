//! Host Loader
//!
//! The manager does not know how to build units. The host supplies a
//! [`Loader`] that knows which names exist and how to run a unit's setup.
//!
//! Setup code receives the manager and must look up every dependency through
//! [`ReloadManager::resolve`] or [`ReloadManager::fetch_member`], never
//! through references it kept from an earlier run. That indirection is what
//! lets the manager interpose and reload stale units on the way.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::BoxError;
use crate::namespace::{Unit, UnitName};

use super::manager::ReloadManager;

/// Host-side construction and setup of units.
pub trait Loader: Send + Sync {
    /// Whether the host can construct a unit under `name`.
    fn provides(&self, name: &UnitName) -> bool;

    /// Run a freshly constructed unit's setup.
    fn initialize(&self, manager: &ReloadManager, unit: &Unit) -> Result<(), BoxError>;

    /// Re-run an existing unit's setup in place.
    ///
    /// The unit keeps its identity and its previous attributes; setup
    /// overwrites what it sets. Defaults to [`initialize`](Self::initialize).
    fn reinitialize(&self, manager: &ReloadManager, unit: &Unit) -> Result<(), BoxError> {
        self.initialize(manager, unit)
    }
}

type SetupFn = dyn Fn(&ReloadManager, &Unit) -> Result<(), BoxError> + Send + Sync;

/// A [`Loader`] backed by a table of setup closures, one per name.
///
/// # Example
///
/// ```rust
/// use lazy_reload_core::reload::{LoaderTable, ReloadManager};
///
/// let loader = LoaderTable::new()
///     .unit("app", |_, _| Ok(()))
///     .unit("app.db", |manager, unit| {
///         let app = manager.resolve("app")?;
///         unit.set_attr("app", app);
///         Ok(())
///     });
///
/// let manager = ReloadManager::new(loader);
/// let db = manager.resolve("app.db").unwrap();
/// assert!(db.attr_unit("app").is_some());
/// ```
#[derive(Clone, Default)]
pub struct LoaderTable {
    setups: HashMap<String, Arc<SetupFn>>,
}

impl LoaderTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the setup closure for `name`.
    ///
    /// The same closure runs for first construction and every reload.
    pub fn unit<F>(mut self, name: impl Into<String>, setup: F) -> Self
    where
        F: Fn(&ReloadManager, &Unit) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.setups.insert(name.into(), Arc::new(setup));
        self
    }

    /// Number of registered names.
    pub fn len(&self) -> usize {
        self.setups.len()
    }

    /// True if no name is registered.
    pub fn is_empty(&self) -> bool {
        self.setups.is_empty()
    }
}

impl Loader for LoaderTable {
    fn provides(&self, name: &UnitName) -> bool {
        self.setups.contains_key(name.as_str())
    }

    fn initialize(&self, manager: &ReloadManager, unit: &Unit) -> Result<(), BoxError> {
        match self.setups.get(unit.name().as_str()) {
            Some(setup) => setup(manager, unit),
            None => Err(format!("no setup registered for `{}`", unit.name()).into()),
        }
    }
}

impl std::fmt::Debug for LoaderTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.setups.keys().collect();
        names.sort();
        f.debug_struct("LoaderTable").field("units", &names).finish()
    }
}
