//! Core types for ormload.
//!
//! This crate provides the small vocabulary shared by the loading layer:
//!
//! - `Value` for owner identifiers and entity versions
//! - `RepresentationMode` and `CacheMode` for session-level behavior switches
//! - `Error` and `Result` for collaborator and configuration failures

pub mod error;
pub mod mode;
pub mod value;

pub use error::{CacheError, CacheErrorKind, ConfigError, Error, Result};
pub use mode::{CacheMode, RepresentationMode};
pub use value::Value;
