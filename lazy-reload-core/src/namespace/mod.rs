//! Namespace
//!
//! This module holds the data side of the manager: names, units, and the
//! tables that say which names are up to date.
//!
//! # Overview
//!
//! Units live in a flat table addressed by name rather than being reached by
//! walking the object graph. Units may reference each other in cycles, so
//! the table is the only place the manager ever looks them up.
//!
//! Each name is in exactly one state:
//!
//! - Unregistered: never constructed.
//! - Live: up to date.
//! - Pending: invalidated, waiting to be reloaded on next resolution.

mod name;
mod store;
mod unit;

pub use name::{is_descendant, Ancestors, UnitName, SEPARATOR};
pub use store::{Registry, UnitState};
pub use unit::{Attr, Unit, UnitId};
