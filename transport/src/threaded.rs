//! A transport that runs each transfer on a tokio blocking worker.
//!
//! # Design
//! `ThreadedTransport` owns a multi-thread tokio runtime and a shared ureq
//! [`Agent`]. Every `start_*` call assigns a task id, moves the request and
//! the completion into `spawn_blocking`, and returns at once. The worker
//! performs the blocking HTTP exchange and invokes the completion itself,
//! so completions always arrive on a `synctransfer-worker` thread, never on
//! the thread that started the task.
//!
//! HTTP status codes are not errors here (`http_status_as_error(false)`);
//! a 404 is delivered as a body plus response metadata. Errors are limited
//! to failing to talk to the server, failing to touch the filesystem, and
//! undecodable resume tokens.
//!
//! A resumed download only sends `Range` when the partial file on disk is
//! exactly as long as the token says; otherwise it starts over. The partial
//! file is truncated only for a full-body 2xx answer. A 416 whose
//! `Content-Range` total equals the bytes already held means the download
//! was complete. A download that fails without a resume token removes its
//! file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use synctransfer_core::{
    Completion, DataCompletion, DownloadCompletion, HttpMethod, HttpRequest, HttpResponse,
    ResumeToken, Transport, UploadSource,
};
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, warn};
use ureq::http::Response;
use ureq::typestate::{WithBody, WithoutBody};
use ureq::{Agent, Body, RequestBuilder, ResponseExt};
use uuid::Uuid;

use crate::config::TransportConfig;
use crate::error::{TransferError, TransferErrorKind};
use crate::resume::ResumeState;

const CHUNK_SIZE: usize = 16 * 1024;

/// What a worker hands to the completion: the value with its metadata, or
/// the error with whatever metadata arrived before it.
type Delivered<T> = Result<(T, HttpResponse), (TransferError, Option<HttpResponse>)>;

/// Asynchronous HTTP transport backed by a private tokio runtime.
pub struct ThreadedTransport {
    runtime: Runtime,
    worker: Worker,
    config: TransportConfig,
    next_task_id: AtomicU64,
}

impl ThreadedTransport {
    pub fn new(config: TransportConfig) -> Result<Self, TransferError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .thread_name("synctransfer-worker")
            .enable_all()
            .build()
            .map_err(|err| TransferError::new(TransferErrorKind::Runtime, err.to_string()))?;

        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .max_redirects(config.max_redirects)
            .build()
            .new_agent();

        debug!(
            worker_threads = config.worker_threads,
            download_dir = %config.download_dir.display(),
            "transport started"
        );

        Ok(Self {
            runtime,
            worker: Worker {
                agent,
                download_dir: config.download_dir.clone(),
                user_agent: config.user_agent.clone(),
            },
            config,
            next_task_id: AtomicU64::new(1),
        })
    }

    /// Transport configured from `SYNCTRANSFER_*` environment variables.
    pub fn from_env() -> Result<Self, TransferError> {
        Self::new(TransportConfig::from_env())
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn spawn<T, F>(&self, kind: &'static str, target: String, on_complete: Completion<T, TransferError>, work: F)
    where
        T: Send + 'static,
        F: FnOnce(&Worker) -> Delivered<T> + Send + 'static,
    {
        let task_id = self.next_task_id.fetch_add(1, Ordering::Relaxed);
        let worker = self.worker.clone();
        debug!(task_id, kind, %target, "task queued");

        self.runtime.spawn_blocking(move || {
            let (value, response, error) = match work(&worker) {
                Ok((value, response)) => {
                    debug!(task_id, kind, status = response.status, "task finished");
                    (Some(value), Some(response), None)
                }
                Err((err, response)) => {
                    warn!(task_id, kind, error = %err, "task failed");
                    (None, response, Some(err))
                }
            };
            on_complete(value, response, error);
        });
    }
}

impl Transport for ThreadedTransport {
    type Error = TransferError;

    fn start_data_task(&self, request: HttpRequest, on_complete: DataCompletion<TransferError>) {
        let target = request.url.to_string();
        self.spawn("data", target, on_complete, move |worker| {
            worker.fetch(&request, None)
        });
    }

    fn start_upload_task(
        &self,
        request: HttpRequest,
        source: UploadSource,
        on_complete: DataCompletion<TransferError>,
    ) {
        let target = request.url.to_string();
        self.spawn("upload", target, on_complete, move |worker| {
            worker.upload(&request, source)
        });
    }

    fn start_download_task(&self, request: HttpRequest, on_complete: DownloadCompletion<TransferError>) {
        let target = request.url.to_string();
        self.spawn("download", target, on_complete, move |worker| {
            worker.download(&request)
        });
    }

    fn start_resumed_download_task(
        &self,
        token: ResumeToken,
        on_complete: DownloadCompletion<TransferError>,
    ) {
        let target = format!("resume token ({} bytes)", token.as_bytes().len());
        self.spawn("resume", target, on_complete, move |worker| worker.resume(&token));
    }
}

/// The per-task half of the transport, cloned into each worker job.
#[derive(Clone)]
struct Worker {
    agent: Agent,
    download_dir: PathBuf,
    user_agent: String,
}

impl Worker {
    fn fetch(&self, request: &HttpRequest, body: Option<&[u8]>) -> Delivered<Vec<u8>> {
        let mut response = self.send(request, body, None).map_err(before_response)?;
        let meta = metadata(&response);
        match response.body_mut().read_to_vec() {
            Ok(bytes) => Ok((bytes, meta)),
            Err(err) => Err((TransferError::network(err), Some(meta))),
        }
    }

    fn upload(&self, request: &HttpRequest, source: UploadSource) -> Delivered<Vec<u8>> {
        let data = match source {
            UploadSource::Data(data) => data,
            UploadSource::File(path) => fs::read(&path).map_err(|err| {
                before_response(TransferError::io(format!("{}: {err}", path.display())))
            })?,
        };
        self.fetch(request, Some(&data))
    }

    fn download(&self, request: &HttpRequest) -> Delivered<PathBuf> {
        fs::create_dir_all(&self.download_dir)
            .map_err(|err| before_response(TransferError::io(err)))?;
        let response = self.send(request, None, None).map_err(before_response)?;

        let path = self.download_dir.join(format!("{}.download", Uuid::new_v4()));
        let file = File::create(&path)
            .map_err(|err| (TransferError::io(err), Some(metadata(&response))))?;
        self.stream_into(response, file, ResumeState::new(request.url.as_str(), path, 0))
    }

    fn resume(&self, token: &ResumeToken) -> Delivered<PathBuf> {
        let state = ResumeState::from_token(token).map_err(before_response)?;
        let request = HttpRequest::parse(HttpMethod::Get, &state.url).map_err(|err| {
            before_response(TransferError::new(
                TransferErrorKind::InvalidResumeToken,
                err.to_string(),
            ))
        })?;

        // The partial file must hold exactly the bytes the token claims.
        let on_disk = fs::metadata(&state.partial_path).map(|m| m.len()).ok();
        let state = if on_disk == Some(state.received) {
            state
        } else {
            warn!(
                url = %state.url,
                expected = state.received,
                on_disk = ?on_disk,
                "partial file does not match resume token, restarting"
            );
            ResumeState { received: 0, ..state }
        };

        let range = (state.received > 0).then(|| state.range_header());
        let response = self
            .send(&request, None, range.as_deref())
            .map_err(before_response)?;
        let status = response.status().as_u16();

        let keep = match status {
            206 if state.received > 0 => {
                let start = header_str(&response, "content-range").and_then(content_range_start);
                if start != Some(state.received) {
                    let error = TransferError::network(format!(
                        "server resumed at {start:?}, expected byte {}",
                        state.received
                    ));
                    return Err((attach_token(error, &state), Some(metadata(&response))));
                }
                state.received
            }
            416 if state.received > 0 => {
                let total = header_str(&response, "content-range").and_then(content_range_total);
                if total == Some(state.received) {
                    debug!(url = %state.url, total = state.received, "download was already complete");
                    return Ok((state.partial_path, metadata(&response)));
                }
                let error = TransferError::new(
                    TransferErrorKind::InvalidResumeToken,
                    format!(
                        "remote size {total:?} does not match {} bytes already received",
                        state.received
                    ),
                );
                return Err((error, Some(metadata(&response))));
            }
            200..=299 => 0,
            _ => {
                let error = TransferError::network(format!("server answered {status} to resume"));
                return Err((attach_token(error, &state), Some(metadata(&response))));
            }
        };

        let file = open_partial(&state.partial_path, keep)
            .map_err(|err| (TransferError::io(err), Some(metadata(&response))))?;
        debug!(url = %state.url, received = keep, "resuming download");
        self.stream_into(response, file, ResumeState { received: keep, ..state })
    }

    /// Copy the body into `file`. On failure the partial file is kept only if
    /// the error carries a token that can continue it.
    fn stream_into(
        &self,
        mut response: Response<Body>,
        mut file: File,
        mut state: ResumeState,
    ) -> Delivered<PathBuf> {
        let meta = metadata(&response);
        match copy_body(&mut response, &mut file, &mut state) {
            Ok(()) => Ok((state.partial_path, meta)),
            Err(error) => {
                drop(file);
                if error.resume_token.is_none() {
                    discard(&state.partial_path);
                }
                Err((error, Some(meta)))
            }
        }
    }

    fn send(
        &self,
        request: &HttpRequest,
        body: Option<&[u8]>,
        range: Option<&str>,
    ) -> Result<Response<Body>, TransferError> {
        let url = request.url.as_str();
        let result = match request.method {
            HttpMethod::Get => self.call(self.agent.get(url), request, range),
            HttpMethod::Head => self.call(self.agent.head(url), request, range),
            HttpMethod::Delete => self.call(self.agent.delete(url), request, range),
            HttpMethod::Post => self.send_body(self.agent.post(url), request, body),
            HttpMethod::Put => self.send_body(self.agent.put(url), request, body),
            HttpMethod::Patch => self.send_body(self.agent.patch(url), request, body),
        };
        result.map_err(TransferError::network)
    }

    fn call(
        &self,
        builder: RequestBuilder<WithoutBody>,
        request: &HttpRequest,
        range: Option<&str>,
    ) -> Result<Response<Body>, ureq::Error> {
        let mut builder = self.with_headers(builder, request);
        if let Some(range) = range {
            builder = builder.header("range", range);
        }
        builder.call()
    }

    fn send_body(
        &self,
        builder: RequestBuilder<WithBody>,
        request: &HttpRequest,
        body: Option<&[u8]>,
    ) -> Result<Response<Body>, ureq::Error> {
        let builder = self.with_headers(builder, request);
        match body.or(request.body.as_deref()) {
            Some(bytes) => builder.send(bytes),
            None => builder.send_empty(),
        }
    }

    fn with_headers<B>(&self, mut builder: RequestBuilder<B>, request: &HttpRequest) -> RequestBuilder<B> {
        let has_agent = request
            .headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("user-agent"));
        if !has_agent {
            builder = builder.header("user-agent", self.user_agent.as_str());
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
    }
}

fn copy_body(
    response: &mut Response<Body>,
    file: &mut File,
    state: &mut ResumeState,
) -> Result<(), TransferError> {
    let mut reader = response.body_mut().as_reader();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(attach_token(TransferError::network(err), state)),
        };
        file.write_all(&buf[..n]).map_err(TransferError::io)?;
        state.received += n as u64;
    }

    file.flush().map_err(TransferError::io)
}

/// Attach a token for `state` when there is something to continue from.
fn attach_token(error: TransferError, state: &ResumeState) -> TransferError {
    if state.received == 0 {
        return error;
    }
    match state.to_token() {
        Ok(token) => error.with_resume_token(token),
        Err(err) => {
            warn!(error = %err, "could not encode resume token");
            error
        }
    }
}

fn discard(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        if err.kind() != io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %err, "could not remove partial download");
        }
    }
}

fn header_str<'a>(response: &'a Response<Body>, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

/// First byte of a `Content-Range: bytes <start>-<end>/<total>` value.
fn content_range_start(value: &str) -> Option<u64> {
    let (span, _) = value.trim().strip_prefix("bytes ")?.split_once('/')?;
    let (start, _) = span.split_once('-')?;
    start.trim().parse().ok()
}

/// Total length from a `Content-Range` value, including `bytes */<total>`.
fn content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.trim().strip_prefix("bytes ")?.split_once('/')?;
    total.trim().parse().ok()
}

fn before_response(err: TransferError) -> (TransferError, Option<HttpResponse>) {
    (err, None)
}

fn metadata(response: &Response<Body>) -> HttpResponse {
    HttpResponse {
        status: response.status().as_u16(),
        headers: response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect(),
        url: response.get_uri().to_string(),
    }
}

/// Open `path` for writing with exactly its first `keep` bytes retained.
fn open_partial(path: &Path, keep: u64) -> io::Result<File> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)?;
    file.set_len(keep)?;
    file.seek(SeekFrom::End(0))?;
    Ok(file)
}
