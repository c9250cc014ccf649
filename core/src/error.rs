//! Errors raised by the core before any transfer starts.
//!
//! # Design
//! Only descriptor errors originate here. Transport errors are whatever
//! type the transport declares as `Transport::Error` and reach the caller
//! untouched through the outcome's error slot; the core never wraps or
//! classifies them.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::http::HttpMethod;

/// The input could not be turned into a valid request descriptor.
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// The string is not an absolute URL.
    #[error("invalid url {input:?}: {source}")]
    InvalidUrl {
        input: String,
        #[source]
        source: url::ParseError,
    },

    /// The URL parsed but its scheme is not `http` or `https`.
    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),

    /// Upload requested with a method that cannot carry a body.
    #[error("{0} requests cannot carry an upload body")]
    MethodWithoutBody(HttpMethod),

    /// The upload source file could not be inspected.
    #[error("upload file {path:?} is not accessible: {source}")]
    UploadFileMissing {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The upload source path exists but is not a regular file.
    #[error("upload source {0:?} is not a regular file")]
    UploadNotAFile(PathBuf),
}
