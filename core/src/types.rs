//! Upload sources and resume tokens.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// What an upload task sends as its request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadSource {
    /// Stream the contents of a file on disk.
    File(PathBuf),
    /// Send an in-memory buffer.
    Data(Vec<u8>),
}

/// Opaque data that lets a transport continue an interrupted download.
///
/// The core never looks inside; only the transport that produced a token
/// knows how to interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResumeToken(Vec<u8>);

impl ResumeToken {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
