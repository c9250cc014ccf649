//! Transport errors: failed transfers, delivered through their completion,
//! and failing to start the transport in the first place.

use std::fmt;

use synctransfer_core::ResumeToken;
use thiserror::Error;

/// Broad category of a failed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferErrorKind {
    /// Connecting, sending, or reading the response failed.
    Network,
    /// Reading an upload file or writing a download failed.
    Io,
    /// The resume token was not produced by this transport.
    InvalidResumeToken,
    /// The worker runtime could not be started. Only returned by
    /// [`ThreadedTransport::new`](crate::ThreadedTransport::new).
    Runtime,
}

impl fmt::Display for TransferErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferErrorKind::Network => write!(f, "network error"),
            TransferErrorKind::Io => write!(f, "i/o error"),
            TransferErrorKind::InvalidResumeToken => write!(f, "invalid resume token"),
            TransferErrorKind::Runtime => write!(f, "runtime error"),
        }
    }
}

/// A failed transfer, as reported by [`ThreadedTransport`](crate::ThreadedTransport).
///
/// Downloads that stop after some of the body was written carry a
/// `resume_token` that continues from where they stopped.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct TransferError {
    pub kind: TransferErrorKind,
    pub message: String,
    pub resume_token: Option<ResumeToken>,
}

impl TransferError {
    pub fn new(kind: TransferErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            resume_token: None,
        }
    }

    pub fn network(err: impl fmt::Display) -> Self {
        Self::new(TransferErrorKind::Network, err.to_string())
    }

    pub fn io(err: impl fmt::Display) -> Self {
        Self::new(TransferErrorKind::Io, err.to_string())
    }

    pub fn with_resume_token(mut self, token: ResumeToken) -> Self {
        self.resume_token = Some(token);
        self
    }
}
