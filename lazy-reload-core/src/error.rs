//! Error types for the reload manager.
//!
//! Every fallible operation returns [`ReloadError`]. Host failures raised by a
//! [`Loader`](crate::reload::Loader) are carried unchanged as the error
//! `source`, so callers can downcast to their own error type.

use crate::namespace::UnitName;

/// Boxed error produced by host code (unit setup procedures).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the reload manager.
#[derive(Debug, thiserror::Error)]
pub enum ReloadError {
    /// The name is not registered and the host cannot construct it.
    #[error("no unit named `{0}`")]
    NotFound(UnitName),

    /// The string is not a well-formed dotted unit name.
    #[error("invalid unit name `{name}`: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// First-time setup of a unit failed. The unit is not left registered.
    #[error("failed to initialize `{name}`")]
    Initialize {
        name: UnitName,
        #[source]
        source: BoxError,
    },

    /// Re-running a unit's setup failed. The unit stays Live in whatever
    /// state the setup left it; invalidate it again to retry.
    #[error("failed to reinitialize `{name}`")]
    Reinitialize {
        name: UnitName,
        #[source]
        source: BoxError,
    },

    /// The reload executor was asked to reload a name that is not Pending.
    ///
    /// Unreachable through the public API; seeing it means the interception
    /// layer is broken.
    #[error("internal consistency failure: `{0}` is not pending reload")]
    NotPending(UnitName),

    /// A Pending name was resolved but no interceptor reloaded it, which
    /// happens once the lazy reload interceptor has been removed. The
    /// quarantined unit is kept; it is never replaced by a new one.
    #[error("`{0}` is pending reload and no interceptor handled it")]
    Quarantined(UnitName),

    /// A member fetch named something the parent does not have.
    #[error("`{parent}` has no member `{member}`")]
    MissingMember { parent: UnitName, member: String },

    /// Configuration could not be parsed.
    #[error("invalid reload configuration")]
    Config(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T, E = ReloadError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn reinitialize_error_keeps_host_source() {
        let host: BoxError = "disk on fire".into();
        let err = ReloadError::Reinitialize {
            name: UnitName::new("app.db").unwrap(),
            source: host,
        };

        assert_eq!(err.to_string(), "failed to reinitialize `app.db`");
        assert_eq!(err.source().unwrap().to_string(), "disk on fire");
    }

    #[test]
    fn missing_member_message() {
        let err = ReloadError::MissingMember {
            parent: UnitName::new("test").unwrap(),
            member: "zz".into(),
        };
        assert_eq!(err.to_string(), "`test` has no member `zz`");
    }
}
