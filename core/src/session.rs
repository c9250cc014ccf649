//! Blocking call shapes on top of any [`Transport`].
//!
//! # Design
//! `SynchronousTransfer` is an extension trait with a blanket impl, so every
//! transport gains the seven blocking entry points and the transport itself
//! is the collaborator each call goes through. Each method is a thin adapter:
//! validate the descriptor, pick the `start_*` operation, and hand it to
//! [`block_on_completion`]. Descriptor errors return before the transport is
//! touched.
//!
//! All methods block the calling thread until the transport calls back,
//! with no timeout. Do not call them from a thread the transport relies on
//! to deliver completions.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::bridge::{block_on_completion, Outcome};
use crate::error::DescriptorError;
use crate::http::{HttpMethod, HttpRequest};
use crate::transport::Transport;
use crate::types::{ResumeToken, UploadSource};

/// Outcome of a fetch or upload: the response body on success.
pub type DataOutcome<E> = Outcome<Vec<u8>, E>;

/// Outcome of a download: the artifact location on success.
pub type DownloadOutcome<E> = Outcome<PathBuf, E>;

/// Synchronous fetch, upload and download over an asynchronous transport.
pub trait SynchronousTransfer: Transport {
    /// Load `request` and return its body.
    fn fetch(&self, request: HttpRequest) -> DataOutcome<Self::Error> {
        debug!(call_shape = "fetch", method = %request.method, url = %request.url, "starting transfer");
        let outcome = block_on_completion(|done| self.start_data_task(request, done));
        log_completion("fetch", &outcome);
        outcome
    }

    /// Load `url` with a plain `GET`.
    fn fetch_url(&self, url: &str) -> Result<DataOutcome<Self::Error>, DescriptorError> {
        let request = HttpRequest::parse(HttpMethod::Get, url)?;
        Ok(self.fetch(request))
    }

    /// Send the contents of `path` as the body of `request`.
    fn upload_file(
        &self,
        request: HttpRequest,
        path: impl AsRef<Path>,
    ) -> Result<DataOutcome<Self::Error>, DescriptorError> {
        check_upload_method(&request)?;
        let path = check_upload_file(path.as_ref())?;
        Ok(upload(self, request, UploadSource::File(path), "upload_file"))
    }

    /// Send `data` as the body of `request`.
    fn upload_data(
        &self,
        request: HttpRequest,
        data: Vec<u8>,
    ) -> Result<DataOutcome<Self::Error>, DescriptorError> {
        check_upload_method(&request)?;
        Ok(upload(self, request, UploadSource::Data(data), "upload_data"))
    }

    /// Download `request` to a transport-chosen location.
    fn download(&self, request: HttpRequest) -> DownloadOutcome<Self::Error> {
        debug!(call_shape = "download", method = %request.method, url = %request.url, "starting transfer");
        let outcome = block_on_completion(|done| self.start_download_task(request, done));
        log_completion("download", &outcome);
        outcome
    }

    /// Download `url` with a plain `GET`.
    fn download_url(&self, url: &str) -> Result<DownloadOutcome<Self::Error>, DescriptorError> {
        let request = HttpRequest::parse(HttpMethod::Get, url)?;
        Ok(self.download(request))
    }

    /// Continue an interrupted download from `token`.
    fn resume_download(&self, token: ResumeToken) -> DownloadOutcome<Self::Error> {
        debug!(call_shape = "resume_download", token_len = token.as_bytes().len(), "starting transfer");
        let outcome = block_on_completion(|done| self.start_resumed_download_task(token, done));
        log_completion("resume_download", &outcome);
        outcome
    }
}

impl<T: Transport + ?Sized> SynchronousTransfer for T {}

fn upload<T: Transport + ?Sized>(
    transport: &T,
    request: HttpRequest,
    source: UploadSource,
    call_shape: &'static str,
) -> DataOutcome<T::Error> {
    debug!(call_shape, method = %request.method, url = %request.url, "starting transfer");
    let outcome = block_on_completion(|done| transport.start_upload_task(request, source, done));
    log_completion(call_shape, &outcome);
    outcome
}

fn log_completion<V, E>(call_shape: &'static str, outcome: &Outcome<V, E>) {
    debug!(
        call_shape,
        success = outcome.is_success(),
        status = outcome.response().map(|r| r.status),
        "transfer completed"
    );
}

fn check_upload_method(request: &HttpRequest) -> Result<(), DescriptorError> {
    if request.method.allows_body() {
        Ok(())
    } else {
        Err(DescriptorError::MethodWithoutBody(request.method))
    }
}

fn check_upload_file(path: &Path) -> Result<PathBuf, DescriptorError> {
    let metadata = std::fs::metadata(path).map_err(|source| DescriptorError::UploadFileMissing {
        path: path.to_path_buf(),
        source,
    })?;
    if !metadata.is_file() {
        return Err(DescriptorError::UploadNotAFile(path.to_path_buf()));
    }
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{DataCompletion, DownloadCompletion};
    use std::io::Write;
    use std::sync::Mutex;

    /// Records which task was started and answers inline.
    #[derive(Default)]
    struct Recorder {
        started: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn started(&self) -> Vec<String> {
            self.started.lock().unwrap().clone()
        }
    }

    impl Transport for Recorder {
        type Error = String;

        fn start_data_task(&self, request: HttpRequest, on_complete: DataCompletion<String>) {
            self.started.lock().unwrap().push(format!("data {} {}", request.method, request.url));
            on_complete(Some(b"body".to_vec()), None, None);
        }

        fn start_upload_task(
            &self,
            request: HttpRequest,
            source: UploadSource,
            on_complete: DataCompletion<String>,
        ) {
            let kind = match source {
                UploadSource::File(_) => "file",
                UploadSource::Data(_) => "data",
            };
            self.started.lock().unwrap().push(format!("upload-{kind} {}", request.method));
            on_complete(Some(Vec::new()), None, None);
        }

        fn start_download_task(&self, request: HttpRequest, on_complete: DownloadCompletion<String>) {
            self.started.lock().unwrap().push(format!("download {}", request.url));
            on_complete(Some(PathBuf::from("/tmp/a.download")), None, None);
        }

        fn start_resumed_download_task(
            &self,
            token: ResumeToken,
            on_complete: DownloadCompletion<String>,
        ) {
            self.started.lock().unwrap().push(format!("resume {}", token.as_bytes().len()));
            on_complete(Some(PathBuf::from("/tmp/b.download")), None, None);
        }
    }

    fn post(url: &str) -> HttpRequest {
        HttpRequest::parse(HttpMethod::Post, url).unwrap()
    }

    #[test]
    fn fetch_url_builds_get_request() {
        let transport = Recorder::default();
        let outcome = transport.fetch_url("http://localhost:3000/hello").unwrap();
        assert_eq!(outcome.value(), Some(&b"body".to_vec()));
        assert_eq!(transport.started(), vec!["data GET http://localhost:3000/hello"]);
    }

    #[test]
    fn download_url_builds_get_request() {
        let transport = Recorder::default();
        let outcome = transport.download_url("http://localhost:3000/files/a").unwrap();
        assert_eq!(outcome.value(), Some(&PathBuf::from("/tmp/a.download")));
        assert_eq!(transport.started(), vec!["download http://localhost:3000/files/a"]);
    }

    #[test]
    fn download_url_rejects_bad_url_without_starting() {
        let transport = Recorder::default();
        let err = transport.download_url("::nope::").unwrap_err();
        assert!(matches!(err, DescriptorError::InvalidUrl { .. }));
        assert!(transport.started().is_empty());
    }

    #[test]
    fn upload_data_routes_to_upload_task() {
        let transport = Recorder::default();
        let outcome = transport
            .upload_data(post("http://localhost/echo"), b"payload".to_vec())
            .unwrap();
        assert!(outcome.is_success());
        assert_eq!(transport.started(), vec!["upload-data POST"]);
    }

    #[test]
    fn upload_rejects_get_without_starting() {
        let transport = Recorder::default();
        let request = HttpRequest::parse(HttpMethod::Get, "http://localhost/echo").unwrap();
        let err = transport.upload_data(request, b"x".to_vec()).unwrap_err();
        assert!(matches!(err, DescriptorError::MethodWithoutBody(HttpMethod::Get)));
        assert!(transport.started().is_empty());
    }

    #[test]
    fn upload_file_routes_existing_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"file body").unwrap();

        let transport = Recorder::default();
        let outcome = transport
            .upload_file(post("http://localhost/echo"), file.path())
            .unwrap();
        assert!(outcome.is_success());
        assert_eq!(transport.started(), vec!["upload-file POST"]);
    }

    #[test]
    fn upload_file_rejects_missing_file_without_starting() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.bin");

        let transport = Recorder::default();
        let err = transport
            .upload_file(post("http://localhost/echo"), &missing)
            .unwrap_err();
        assert!(matches!(err, DescriptorError::UploadFileMissing { ref path, .. } if *path == missing));
        assert!(transport.started().is_empty());
    }

    #[test]
    fn upload_file_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Recorder::default();
        let err = transport
            .upload_file(post("http://localhost/echo"), dir.path())
            .unwrap_err();
        assert!(matches!(err, DescriptorError::UploadNotAFile(_)));
        assert!(transport.started().is_empty());
    }

    #[test]
    fn resume_download_passes_token_through() {
        let transport = Recorder::default();
        let outcome = transport.resume_download(ResumeToken::from_bytes(vec![1, 2, 3]));
        assert_eq!(outcome.value(), Some(&PathBuf::from("/tmp/b.download")));
        assert_eq!(transport.started(), vec!["resume 3"]);
    }
}
