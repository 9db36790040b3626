//! docmeta Store - per-document metadata persistence
//!
//! This crate implements the editor's metadata store: a bounded map from
//! document URI to a small set of string attributes, loaded lazily from an
//! XML file in the user cache directory and written back after a debounce
//! delay.
//!
//! - [`MetadataStore`]: the single-owner store engine
//! - [`MetadataService`]: runs a store on one tokio task behind a cloneable handle

pub mod clock;
pub mod entry;
pub mod service;
pub mod store;
pub mod timer;
pub mod xml;

// Re-exports
pub use clock::{Clock, SystemClock};
pub use entry::Entry;
pub use service::{MetadataHandle, MetadataService};
pub use store::{MetadataStore, StoreStats};
pub use timer::DebounceTimer;
