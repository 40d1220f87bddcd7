//! Lazy Reload
//!
//! This module implements the reload protocol: invalidation, the
//! interception hooks on every resolution path, and the executor that brings
//! a stale unit back.
//!
//! # Concepts
//!
//! ## Invalidation
//!
//! Invalidating a unit marks it and everything nested under it as Pending.
//! Nothing runs at that point.
//!
//! ## Interception
//!
//! Host code looks units up only through the manager, either by name
//! ([`ReloadManager::resolve`]) or by member of a parent unit
//! ([`ReloadManager::fetch_member`]). Both paths run the interceptor chain,
//! which notices Pending names before any cached reference is handed out.
//!
//! ## Reload
//!
//! A Pending unit is moved back to Live and then its setup is re-run in
//! place. The unit object keeps its identity, so references other units
//! hold into it stay valid.
//!
//! # Implementation Notes
//!
//! The Live-before-setup ordering doubles as the "visited" mark of a
//! depth-first walk: setup code that comes back to a unit already being
//! reloaded gets the object as it is, instead of recursing.

mod context;
mod history;
mod hook;
mod loader;
mod manager;

pub use context::{LoadContext, LoadKind};
pub use history::{ReloadHistory, ReloadRecord};
pub use hook::{HookChain, Interceptor, PendingInterceptor};
pub use loader::{Loader, LoaderTable};
pub use manager::{ReloadManager, ReloadTarget};
