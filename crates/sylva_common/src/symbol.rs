//! Interned symbols for node types and labels.
//!
//! Node types ("method_declaration", "identifier", ...) and labels (identifier
//! names, literals, whitespace runs) repeat massively across a code base. Both
//! are interned so that every occurrence is a `u32` key with O(1) equality.

use lasso::{Key, Rodeo};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_symbol {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Creates a symbol from a raw `u32` index.
            ///
            /// Intended for deserialization and tests. Symbols are normally
            /// obtained from [`Interner::get_or_intern`].
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw `u32` index of this symbol.
            pub fn as_raw(self) -> u32 {
                self.0
            }
        }

        // SAFETY: the symbol wraps a `u32`, which always fits in a `usize` on
        // supported platforms; `try_from_usize` rejects values above `u32::MAX`.
        unsafe impl Key for $name {
            fn into_usize(self) -> usize {
                self.0 as usize
            }

            fn try_from_usize(int: usize) -> Option<Self> {
                u32::try_from(int).ok().map($name)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

define_symbol!(
    /// The syntactic category of a node, e.g. `class_declaration`.
    Type
);

define_symbol!(
    /// The textual payload of identifier, literal, comment or whitespace nodes.
    ///
    /// The empty label is never interned: "no label" is `Option::<Label>::None`.
    Label
);

/// A string interner backed by [`lasso::Rodeo`].
///
/// Owned by the tree store that uses it; there is no process-wide table.
/// Interning requires `&mut self`, resolution only `&self`, so a store that
/// is no longer being built can be shared between readers.
pub struct Interner<K: Key> {
    rodeo: Rodeo<K>,
}

impl<K: Key> Interner<K> {
    /// Creates a new empty interner.
    pub fn new() -> Self {
        Self {
            rodeo: Rodeo::new(),
        }
    }

    /// Interns a string, returning its key. Already interned strings return
    /// the existing key without allocating.
    pub fn get_or_intern(&mut self, s: &str) -> K {
        self.rodeo.get_or_intern(s)
    }

    /// Returns the key of an already interned string, without interning it.
    pub fn get(&self, s: &str) -> Option<K> {
        self.rodeo.get(s)
    }

    /// Resolves a key back to its string value.
    ///
    /// # Panics
    ///
    /// Panics if the key was not created by this interner.
    pub fn resolve(&self, key: K) -> &str {
        self.rodeo.resolve(&key)
    }

    /// Resolves a key, returning `None` if it was not created by this interner.
    pub fn try_resolve(&self, key: K) -> Option<&str> {
        self.rodeo.try_resolve(&key)
    }

    /// Returns the number of distinct interned strings.
    pub fn len(&self) -> usize {
        self.rodeo.len()
    }

    /// Returns `true` if nothing has been interned yet.
    pub fn is_empty(&self) -> bool {
        self.rodeo.is_empty()
    }
}

impl<K: Key> Default for Interner<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Key> fmt::Debug for Interner<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interner").field("len", &self.len()).finish()
    }
}
