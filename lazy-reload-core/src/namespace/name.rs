//! Unit Names
//!
//! Units are addressed by hierarchical dotted names such as `app.db.pool`.
//! The only structure the manager needs from a name is the descendant
//! relation, which drives cascading invalidation, and the parent chain, which
//! drives hierarchical resolution.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use smallvec::SmallVec;

use crate::error::{ReloadError, Result};

/// Separator between name segments.
pub const SEPARATOR: char = '.';

/// Returns true iff `name` is `root` or lives underneath it.
///
/// `app.db` is a descendant of `app`, but `application` is not.
pub fn is_descendant(name: &str, root: &str) -> bool {
    match name.strip_prefix(root) {
        Some(rest) => rest.is_empty() || rest.starts_with(SEPARATOR),
        None => false,
    }
}

/// A validated hierarchical unit name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UnitName(String);

/// Root-first chain of names, as returned by [`UnitName::ancestors`].
pub type Ancestors = SmallVec<[UnitName; 4]>;

impl UnitName {
    /// Parse and validate a dotted name.
    pub fn new(name: &str) -> Result<Self> {
        let invalid = |reason| ReloadError::InvalidName {
            name: name.to_string(),
            reason,
        };

        if name.is_empty() {
            return Err(invalid("name is empty"));
        }
        if name.split(SEPARATOR).any(str::is_empty) {
            return Err(invalid("name has an empty segment"));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(invalid("name contains whitespace"));
        }

        Ok(Self(name.to_string()))
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The enclosing name, or `None` for a top-level name.
    pub fn parent(&self) -> Option<UnitName> {
        self.0
            .rsplit_once(SEPARATOR)
            .map(|(parent, _)| Self(parent.to_string()))
    }

    /// The final segment (`pool` for `app.db.pool`).
    pub fn last_segment(&self) -> &str {
        self.0
            .rsplit_once(SEPARATOR)
            .map_or(self.0.as_str(), |(_, last)| last)
    }

    /// Qualify `member` under this name.
    pub fn child(&self, member: &str) -> Result<UnitName> {
        Self::new(&format!("{}{}{}", self.0, SEPARATOR, member))
    }

    /// Every prefix of this name, root first, ending with the name itself.
    pub fn ancestors(&self) -> Ancestors {
        let mut chain = Ancestors::new();
        for (idx, ch) in self.0.char_indices() {
            if ch == SEPARATOR {
                chain.push(Self(self.0[..idx].to_string()));
            }
        }
        chain.push(self.clone());
        chain
    }

    /// See [`is_descendant`].
    pub fn is_descendant_of(&self, root: &str) -> bool {
        is_descendant(&self.0, root)
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.0.matches(SEPARATOR).count() + 1
    }
}

impl fmt::Display for UnitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UnitName {
    type Err = ReloadError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl Borrow<str> for UnitName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for UnitName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
