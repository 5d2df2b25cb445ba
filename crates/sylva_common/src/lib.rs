//! Shared foundational types used across the Sylva tree-differencing workspace.
//!
//! This crate provides the interned vocabulary of syntax trees ([`Type`] and
//! [`Label`] symbols with their [`Interner`]), the totally ordered [`Version`]
//! token used by versioned trees, and the [`ContentHash`] checksum used for
//! snapshot integrity.

#![warn(missing_docs)]

pub mod hash;
pub mod symbol;
pub mod version;

pub use hash::ContentHash;
pub use symbol::{Interner, Label, Type};
pub use version::Version;
