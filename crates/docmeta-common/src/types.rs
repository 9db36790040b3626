//! Core type definitions for docmeta
//!
//! Typed identifiers for the two string keys of the metadata store: the
//! document URI and the attribute name.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path};

/// Canonical URI identifying a document
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct DocumentUri(String);

impl DocumentUri {
    /// Create a document URI from a raw URI string
    pub fn new(uri: impl Into<String>) -> Result<Self, DocumentUriError> {
        let uri = uri.into();
        if uri.is_empty() {
            return Err(DocumentUriError::Empty);
        }
        Ok(Self(uri))
    }

    /// Build a `file://` URI from an absolute filesystem path
    ///
    /// `.` and `..` segments are resolved lexically, so two spellings of the
    /// same path map to the same document. Each segment is percent-encoded.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DocumentUriError> {
        let path = path.as_ref();
        if !path.is_absolute() {
            return Err(DocumentUriError::RelativePath(path.display().to_string()));
        }

        let mut prefix = None;
        let mut segments = Vec::new();
        for component in path.components() {
            match component {
                Component::Prefix(p) => prefix = Some(p.as_os_str().to_string_lossy().into_owned()),
                Component::Normal(segment) => {
                    segments.push(urlencoding::encode(&segment.to_string_lossy()).into_owned());
                }
                // `..` at the root stays at the root
                Component::ParentDir => {
                    segments.pop();
                }
                Component::RootDir | Component::CurDir => {}
            }
        }

        let mut uri = String::from("file://");
        for segment in prefix.iter().chain(&segments) {
            uri.push('/');
            uri.push_str(segment);
        }
        if uri.len() == "file://".len() {
            uri.push('/');
        }

        Ok(Self(uri))
    }

    /// Get the URI as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

}

impl fmt::Debug for DocumentUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentUri({:?})", self.0)
    }
}

impl AsRef<str> for DocumentUri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Errors that can occur when creating a document URI
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentUriError {
    #[error("document URI is empty")]
    Empty,
    #[error("path is not absolute: {0}")]
    RelativePath(String),
}

/// Name of a per-document attribute
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct AttributeKey(String);

impl AttributeKey {
    /// Create a new attribute key
    pub fn new(key: impl Into<String>) -> Result<Self, AttributeKeyError> {
        let key = key.into();
        Self::validate(&key)?;
        Ok(Self(key))
    }

    /// Get the key as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(key: &str) -> Result<(), AttributeKeyError> {
        if key.is_empty() {
            return Err(AttributeKeyError::Empty);
        }

        if key.trim() != key {
            return Err(AttributeKeyError::SurroundingWhitespace);
        }

        if let Some(c) = key.chars().find(|c| c.is_control()) {
            return Err(AttributeKeyError::ControlChar(c));
        }

        Ok(())
    }
}

impl fmt::Debug for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttributeKey({:?})", self.0)
    }
}

impl AsRef<str> for AttributeKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Errors that can occur when creating an attribute key
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttributeKeyError {
    #[error("attribute key cannot be empty")]
    Empty,
    #[error("attribute key cannot start or end with whitespace")]
    SurroundingWhitespace,
    #[error("attribute key contains control character {0:?}")]
    ControlChar(char),
}
