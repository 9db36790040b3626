//! docmeta Common - Shared types and utilities
//!
//! This crate provides the error type, configuration, typed identifiers and
//! directory resolution used by the metadata store and its front ends.

pub mod config;
pub mod dirs;
pub mod error;
pub mod types;

pub use config::{Config, LoggingConfig, StoreConfig};
pub use error::{Error, Result};
pub use types::*;
