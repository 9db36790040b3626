//! Error types for docmeta
//!
//! The public `get`/`set` operations of the store never fail; these errors
//! surface from the load and flush paths, configuration parsing, identifier
//! construction and the service channel.

use crate::types::{AttributeKeyError, DocumentUriError};
use thiserror::Error;

/// Common result type for docmeta operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for docmeta
#[derive(Debug, Error)]
pub enum Error {
    // Storage errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // Backing file errors
    #[error("failed to parse metadata file: {0}")]
    XmlParse(String),

    #[error("failed to serialize metadata: {0}")]
    XmlWrite(String),

    #[error("metadata file is empty")]
    EmptyDocument,

    #[error("metadata file is of the wrong type: root element is <{found}>, expected <metadata>")]
    WrongRootElement { found: String },

    // Identifier errors
    #[error("invalid document URI: {0}")]
    InvalidDocumentUri(#[from] DocumentUriError),

    #[error("invalid attribute key: {0}")]
    InvalidAttributeKey(#[from] AttributeKeyError),

    // Runtime errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("metadata service is closed")]
    ServiceClosed,
}

impl Error {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an XML parse error
    pub fn xml_parse(msg: impl ToString) -> Self {
        Self::XmlParse(msg.to_string())
    }

    /// Create an XML serialization error
    pub fn xml_write(msg: impl ToString) -> Self {
        Self::XmlWrite(msg.to_string())
    }

    /// Check if this error means the backing file exists but its content is unusable
    #[must_use]
    pub const fn is_malformed_file(&self) -> bool {
        matches!(
            self,
            Self::XmlParse(_) | Self::EmptyDocument | Self::WrongRootElement { .. }
        )
    }

    /// Check if this error is a missing file
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}
