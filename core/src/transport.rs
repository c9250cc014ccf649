//! The seam between the blocking call shapes and an asynchronous transport.

use std::path::PathBuf;

use crate::bridge::Completion;
use crate::http::HttpRequest;
use crate::types::{ResumeToken, UploadSource};

/// Completion for fetch and upload tasks; the value is the response body.
pub type DataCompletion<E> = Completion<Vec<u8>, E>;

/// Completion for download tasks; the value is where the artifact was put.
pub type DownloadCompletion<E> = Completion<PathBuf, E>;

/// An asynchronous network stack that reports each task through a one-shot
/// completion.
///
/// Every `start_*` method must return without waiting for the transfer and
/// must eventually invoke `on_complete` exactly once, from any thread. The
/// error slot is filled if and only if the transfer failed; response
/// metadata may accompany either branch.
///
/// A transport that never invokes the completion leaves the blocking caller
/// parked forever. So does a transport that can only deliver completions on
/// the thread the caller is blocking.
pub trait Transport {
    type Error: Send + 'static;

    fn start_data_task(&self, request: HttpRequest, on_complete: DataCompletion<Self::Error>);

    fn start_upload_task(
        &self,
        request: HttpRequest,
        source: UploadSource,
        on_complete: DataCompletion<Self::Error>,
    );

    fn start_download_task(&self, request: HttpRequest, on_complete: DownloadCompletion<Self::Error>);

    fn start_resumed_download_task(
        &self,
        token: ResumeToken,
        on_complete: DownloadCompletion<Self::Error>,
    );
}
