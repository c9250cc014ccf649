//! Resume tokens for interrupted downloads.
//!
//! A token is the JSON encoding of a [`ResumeState`]: the URL being
//! downloaded, the partial file on disk, and how many bytes of it are valid.
//! Resuming asks the server for the rest with a `Range` request.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use synctransfer_core::ResumeToken;

use crate::error::{TransferError, TransferErrorKind};

/// Where an interrupted download stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeState {
    pub url: String,
    pub partial_path: PathBuf,
    pub received: u64,
}

impl ResumeState {
    pub fn new(url: impl Into<String>, partial_path: impl Into<PathBuf>, received: u64) -> Self {
        Self {
            url: url.into(),
            partial_path: partial_path.into(),
            received,
        }
    }

    /// `Range` header value asking for everything after `received`.
    pub fn range_header(&self) -> String {
        format!("bytes={}-", self.received)
    }

    pub fn to_token(&self) -> Result<ResumeToken, serde_json::Error> {
        serde_json::to_vec(self).map(ResumeToken::from_bytes)
    }

    pub fn from_token(token: &ResumeToken) -> Result<Self, TransferError> {
        serde_json::from_slice(token.as_bytes()).map_err(|err| {
            TransferError::new(TransferErrorKind::InvalidResumeToken, err.to_string())
        })
    }
}
