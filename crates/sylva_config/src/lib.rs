//! Parsing and validation of `sylva.toml` configuration files.
//!
//! This crate reads the configuration file and produces a strongly-typed
//! [`SylvaConfig`] holding the store, merge and debug-printing settings used
//! by the other Sylva crates. Every section is optional.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE_NAME};
pub use types::*;
