//! Units
//!
//! A Unit is a stateful, identity-bearing component living at a name. Other
//! units hold direct references to it through their attributes, possibly in
//! a cycle, so its identity must survive every reload: reloading replaces
//! the *contents* of the unit in place and never swaps the object.
//!
//! # Memory
//!
//! `Unit` is a handle around an `Arc`. Cloning the handle clones the
//! reference, not the unit. Cyclic attribute graphs keep their units alive;
//! the manager never destroys a unit, it only quarantines and refreshes it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::name::UnitName;

/// Unique identifier for a unit object.
///
/// Two handles with the same id are the same unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(u64);

impl UnitId {
    /// Generate a new unique unit ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for UnitId {
    fn default() -> Self {
        Self::new()
    }
}

/// An attribute value stored on a unit.
#[derive(Clone)]
pub enum Attr {
    /// A direct reference to another unit.
    Unit(Unit),
    /// Plain data.
    Value(serde_json::Value),
}

impl Attr {
    /// The referenced unit, if this attribute holds one.
    pub fn as_unit(&self) -> Option<&Unit> {
        match self {
            Attr::Unit(unit) => Some(unit),
            Attr::Value(_) => None,
        }
    }

    /// The plain data, if this attribute holds some.
    pub fn as_value(&self) -> Option<&serde_json::Value> {
        match self {
            Attr::Value(value) => Some(value),
            Attr::Unit(_) => None,
        }
    }
}

impl From<Unit> for Attr {
    fn from(unit: Unit) -> Self {
        Attr::Unit(unit)
    }
}

impl From<&Unit> for Attr {
    fn from(unit: &Unit) -> Self {
        Attr::Unit(unit.clone())
    }
}

impl From<serde_json::Value> for Attr {
    fn from(value: serde_json::Value) -> Self {
        Attr::Value(value)
    }
}

// Units print as their name only; following attributes could loop forever.
impl fmt::Debug for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attr::Unit(unit) => write!(f, "Unit({})", unit.name()),
            Attr::Value(value) => write!(f, "Value({value})"),
        }
    }
}

struct UnitInner {
    id: UnitId,
    name: UnitName,
    attrs: RwLock<IndexMap<String, Attr>>,
    /// Completed (re)initializations.
    generation: AtomicU64,
}

/// Handle to a unit. Clones share the same underlying unit.
#[derive(Clone)]
pub struct Unit {
    inner: Arc<UnitInner>,
}

impl Unit {
    /// Create an empty, not yet initialized unit.
    pub fn new(name: UnitName) -> Self {
        Self {
            inner: Arc::new(UnitInner {
                id: UnitId::new(),
                name,
                attrs: RwLock::new(IndexMap::new()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Identity of the unit object.
    pub fn id(&self) -> UnitId {
        self.inner.id
    }

    /// Canonical name of this unit.
    pub fn name(&self) -> &UnitName {
        &self.inner.name
    }

    /// True if both handles refer to the same unit object.
    pub fn ptr_eq(&self, other: &Unit) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Read an attribute.
    pub fn attr(&self, key: &str) -> Option<Attr> {
        self.inner.attrs.read().get(key).cloned()
    }

    /// Shorthand for an attribute that holds a unit.
    pub fn attr_unit(&self, key: &str) -> Option<Unit> {
        self.inner
            .attrs
            .read()
            .get(key)
            .and_then(Attr::as_unit)
            .cloned()
    }

    /// Shorthand for an attribute that holds plain data.
    pub fn attr_value(&self, key: &str) -> Option<serde_json::Value> {
        self.inner
            .attrs
            .read()
            .get(key)
            .and_then(Attr::as_value)
            .cloned()
    }

    /// Set or overwrite an attribute.
    pub fn set_attr(&self, key: impl Into<String>, value: impl Into<Attr>) {
        self.inner.attrs.write().insert(key.into(), value.into());
    }

    /// Remove an attribute, returning its old value.
    pub fn remove_attr(&self, key: &str) -> Option<Attr> {
        self.inner.attrs.write().shift_remove(key)
    }

    /// True if the attribute is set.
    pub fn has_attr(&self, key: &str) -> bool {
        self.inner.attrs.read().contains_key(key)
    }

    /// Attribute keys in insertion order.
    pub fn attr_names(&self) -> Vec<String> {
        self.inner.attrs.read().keys().cloned().collect()
    }

    /// Remove every attribute that references a unit nested under this one.
    ///
    /// Later reads of those attributes then have to go back through
    /// resolution instead of seeing a reference from before the reload.
    /// Returns the removed attribute keys.
    pub fn purge_descendant_attrs(&self) -> Vec<String> {
        let own = self.inner.name.as_str();
        let mut attrs = self.inner.attrs.write();

        let doomed: Vec<String> = attrs
            .iter()
            .filter_map(|(key, value)| {
                let unit = value.as_unit()?;
                let name = unit.name();
                (name.as_str() != own && name.is_descendant_of(own)).then(|| key.clone())
            })
            .collect();

        for key in &doomed {
            attrs.shift_remove(key);
        }
        doomed
    }

    /// Number of completed initializations (first load included).
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    pub(crate) fn bump_generation(&self) -> u64 {
        self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("generation", &self.generation())
            .field("attrs", &self.attr_names())
            .finish()
    }
}
