//! Version tokens stamped onto versioned tree nodes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque, totally ordered version identifier.
///
/// Versions are only ever compared; a node inserted at version `a` and removed
/// at version `b` exists for every version `v` with `a <= v < b`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// Creates a version from its raw value.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the version immediately after this one.
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
