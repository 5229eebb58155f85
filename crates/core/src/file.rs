//! File records as seen from the client.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier assigned by the store when a manifest is committed.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    /// Wrap an identifier returned by the store.
    ///
    /// Surrounding whitespace is trimmed; an empty identifier is rejected.
    pub fn parse(s: &str) -> crate::Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(crate::Error::Serialization(
                "file identifier is empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileId({})", self.0)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FileId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Cached copy of the metadata the store holds for a file.
///
/// The store's body is kept verbatim; it is usually JSON.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileInfo {
    /// The identifier the metadata was fetched for.
    pub id: FileId,
    /// Raw response body.
    pub body: String,
}

impl FileInfo {
    /// Parse the body as JSON.
    pub fn json(&self) -> crate::Result<serde_json::Value> {
        serde_json::from_str(&self.body).map_err(|e| crate::Error::Serialization(e.to_string()))
    }
}
