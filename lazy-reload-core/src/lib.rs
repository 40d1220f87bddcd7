//! Lazy Reload Core
//!
//! This crate manages a hierarchical namespace of stateful units that can be
//! invalidated and reloaded lazily. It implements:
//!
//! - Cascading invalidation by dotted name
//! - Interception of every lookup path (by name and by member)
//! - Exactly-once, in-place reload on next use, safe on cyclic unit graphs
//! - An ordered reload history for verification
//!
//! # Architecture
//!
//! - `namespace`: unit names, units, and the Live/Pending tables
//! - `reload`: the manager, its interceptors, the host loader contract and
//!   the reload history
//!
//! # Example
//!
//! ```rust
//! use lazy_reload_core::reload::{LoaderTable, ReloadManager};
//! use serde_json::json;
//!
//! let loader = LoaderTable::new()
//!     .unit("app", |_, unit| {
//!         unit.set_attr("greeting", json!("hello"));
//!         Ok(())
//!     });
//! let manager = ReloadManager::new(loader);
//!
//! let app = manager.resolve("app").unwrap();
//! manager.invalidate("app");
//!
//! // Nothing has reloaded yet.
//! assert!(manager.history().is_empty());
//!
//! // The next lookup reloads `app` in place.
//! let again = manager.resolve("app").unwrap();
//! assert!(again.ptr_eq(&app));
//! assert_eq!(manager.history().len(), 1);
//! ```

pub mod config;
pub mod error;
pub mod namespace;
pub mod reload;

pub use config::ReloadConfig;
pub use error::{BoxError, ReloadError, Result};
pub use namespace::{Attr, Unit, UnitName, UnitState};
pub use reload::{Loader, LoaderTable, ReloadManager};
