//! Manager configuration.
//!
//! ```rust
//! use lazy_reload_core::ReloadConfig;
//!
//! let config = ReloadConfig::from_json(r#"{ "self_name": "lazy_reload" }"#).unwrap();
//! assert_eq!(config.self_name.as_deref(), Some("lazy_reload"));
//! assert!(config.resolve_ancestors);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ReloadError, Result};
use crate::namespace::UnitName;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReloadConfig {
    /// Register the manager itself as a unit under this name, so it can be
    /// invalidated and reloaded like any other unit.
    pub self_name: Option<String>,

    /// Before reinitializing a unit, drop its attributes that reference
    /// units nested under it. Off by default: the member-fetch hook already
    /// keeps fetches fresh, and purging also forgets references the host may
    /// still want.
    pub purge_on_reload: bool,

    /// Resolve every ancestor of a name (root first) before the name itself,
    /// the way hierarchical imports load parents before children.
    pub resolve_ancestors: bool,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            self_name: None,
            purge_on_reload: false,
            resolve_ancestors: true,
        }
    }
}

impl ReloadConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.self_unit_name()?;
        Ok(config)
    }

    /// Register the manager under `name`. Must be a top-level name.
    pub fn with_self_name(mut self, name: impl Into<String>) -> Self {
        self.self_name = Some(name.into());
        self
    }

    /// Turn purge-on-reload on or off.
    pub fn with_purge_on_reload(mut self, purge: bool) -> Self {
        self.purge_on_reload = purge;
        self
    }

    /// Turn root-first ancestor resolution on or off.
    pub fn with_resolve_ancestors(mut self, resolve: bool) -> Self {
        self.resolve_ancestors = resolve;
        self
    }

    /// The validated `self_name`, if set.
    ///
    /// The manager's own unit has no host-provided parents, so a nested name
    /// could never be resolved through its ancestors and is rejected.
    pub fn self_unit_name(&self) -> Result<Option<UnitName>> {
        let Some(raw) = self.self_name.as_deref() else {
            return Ok(None);
        };

        let name = UnitName::new(raw)?;
        if name.parent().is_some() {
            return Err(ReloadError::InvalidName {
                name: raw.to_string(),
                reason: "manager name must be a top-level name",
            });
        }
        Ok(Some(name))
    }
}
