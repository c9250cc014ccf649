//! End-to-end transfers through `ThreadedTransport` against the mock server.
//!
//! # Design
//! Each test starts the mock server on a random port in its own thread and
//! runtime, then drives the blocking call shapes from the test thread. The
//! transport's completions arrive on its worker threads, which is the whole
//! path a real caller takes.

use std::fs;
use std::io::Write;
use std::net::SocketAddr;

use mock_server::{SAMPLE_BODY, SAMPLE_NAME};
use synctransfer_core::{HttpMethod, HttpRequest, ResumeToken, SynchronousTransfer};
use synctransfer_transport::{
    ResumeState, ThreadedTransport, TransferErrorKind, TransportConfig,
};

fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

fn transport(download_dir: &std::path::Path) -> ThreadedTransport {
    ThreadedTransport::new(
        TransportConfig::default()
            .with_download_dir(download_dir)
            .with_worker_threads(1),
    )
    .unwrap()
}

#[test]
fn fetch_url_returns_body_and_metadata() {
    let addr = start_server();
    let dir = tempfile::tempdir().unwrap();
    let transport = transport(dir.path());

    let outcome = transport.fetch_url(&format!("http://{addr}/hello")).unwrap();

    assert!(outcome.error().is_none());
    assert_eq!(outcome.value().map(Vec::as_slice), Some(&b"ok"[..]));
    let response = outcome.response().unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.url, format!("http://{addr}/hello"));
}

#[test]
fn non_2xx_is_delivered_as_data() {
    let addr = start_server();
    let dir = tempfile::tempdir().unwrap();
    let transport = transport(dir.path());

    let outcome = transport.fetch_url(&format!("http://{addr}/status/404")).unwrap();

    assert!(outcome.error().is_none());
    assert_eq!(outcome.value().map(Vec::as_slice), Some(&b"status 404"[..]));
    assert_eq!(outcome.response().map(|r| r.status), Some(404));
}

#[test]
fn redirect_reports_effective_url() {
    let addr = start_server();
    let dir = tempfile::tempdir().unwrap();
    let transport = transport(dir.path());

    let outcome = transport
        .fetch_url(&format!("http://{addr}/redirect/{SAMPLE_NAME}"))
        .unwrap();

    assert_eq!(outcome.value().map(Vec::as_slice), Some(SAMPLE_BODY));
    let response = outcome.response().unwrap();
    assert_eq!(response.status, 200);
    assert!(response.url.ends_with(&format!("/files/{SAMPLE_NAME}")));
}

#[test]
fn custom_headers_are_sent() {
    let addr = start_server();
    let dir = tempfile::tempdir().unwrap();
    let transport = transport(dir.path());

    let request = HttpRequest::parse(HttpMethod::Get, &format!("http://{addr}/files/{SAMPLE_NAME}"))
        .unwrap()
        .with_header("range", "bytes=0-3");
    let outcome = transport.fetch(request);

    assert_eq!(outcome.response().map(|r| r.status), Some(206));
    assert_eq!(outcome.value().map(Vec::as_slice), Some(&SAMPLE_BODY[..4]));
}

#[test]
fn upload_data_is_echoed() {
    let addr = start_server();
    let dir = tempfile::tempdir().unwrap();
    let transport = transport(dir.path());

    let request = HttpRequest::parse(HttpMethod::Post, &format!("http://{addr}/echo")).unwrap();
    let outcome = transport.upload_data(request, b"payload".to_vec()).unwrap();

    assert_eq!(outcome.value().map(Vec::as_slice), Some(&b"payload"[..]));
    assert_eq!(
        outcome.response().and_then(|r| r.header("x-received-bytes")),
        Some("7")
    );
}

#[test]
fn upload_file_then_download_it() {
    let addr = start_server();
    let dir = tempfile::tempdir().unwrap();
    let transport = transport(dir.path());

    let mut source = tempfile::NamedTempFile::new().unwrap();
    source.write_all(b"file contents").unwrap();

    let url = format!("http://{addr}/files/upload.bin");
    let request = HttpRequest::parse(HttpMethod::Put, &url).unwrap();
    let outcome = transport.upload_file(request, source.path()).unwrap();
    assert_eq!(outcome.response().map(|r| r.status), Some(201));

    let outcome = transport.download_url(&url).unwrap();
    let location = outcome.value().unwrap();
    assert!(location.starts_with(dir.path()));
    assert_eq!(fs::read(location).unwrap(), b"file contents");
}

#[test]
fn download_writes_into_download_dir() {
    let addr = start_server();
    let dir = tempfile::tempdir().unwrap();
    let transport = transport(dir.path());

    let outcome = transport
        .download_url(&format!("http://{addr}/files/{SAMPLE_NAME}"))
        .unwrap();

    assert!(outcome.error().is_none());
    let location = outcome.value().unwrap();
    assert_eq!(location.parent(), Some(dir.path()));
    assert_eq!(fs::read(location).unwrap(), SAMPLE_BODY);
}

#[test]
fn resume_appends_remaining_bytes() {
    let addr = start_server();
    let dir = tempfile::tempdir().unwrap();
    let transport = transport(dir.path());

    let partial = dir.path().join("partial.download");
    fs::write(&partial, &SAMPLE_BODY[..10]).unwrap();
    let token = ResumeState::new(format!("http://{addr}/files/{SAMPLE_NAME}"), &partial, 10)
        .to_token()
        .unwrap();

    let outcome = transport.resume_download(token);

    assert!(outcome.error().is_none());
    assert_eq!(outcome.response().map(|r| r.status), Some(206));
    assert_eq!(outcome.value(), Some(&partial));
    assert_eq!(fs::read(&partial).unwrap(), SAMPLE_BODY);
}

#[test]
fn interrupted_download_resumes_from_its_error_token() {
    let addr = start_server();
    let dir = tempfile::tempdir().unwrap();
    let transport = transport(dir.path());

    let outcome = transport
        .download_url(&format!("http://{addr}/flaky/10/{SAMPLE_NAME}"))
        .unwrap();

    assert!(outcome.value().is_none());
    assert_eq!(outcome.response().map(|r| r.status), Some(200));
    let error = outcome.error().unwrap();
    assert_eq!(error.kind, TransferErrorKind::Network);
    let token = error.resume_token.clone().unwrap();
    let state = ResumeState::from_token(&token).unwrap();
    assert_eq!(state.received, 10);
    assert_eq!(fs::read(&state.partial_path).unwrap(), &SAMPLE_BODY[..10]);

    let outcome = transport.resume_download(token);

    assert!(outcome.error().is_none());
    assert_eq!(outcome.response().map(|r| r.status), Some(206));
    assert_eq!(outcome.value(), Some(&state.partial_path));
    assert_eq!(fs::read(&state.partial_path).unwrap(), SAMPLE_BODY);
}

#[test]
fn download_failing_before_any_byte_leaves_no_file() {
    let addr = start_server();
    let dir = tempfile::tempdir().unwrap();
    let transport = transport(dir.path());

    let outcome = transport
        .download_url(&format!("http://{addr}/flaky/0/{SAMPLE_NAME}"))
        .unwrap();

    let error = outcome.error().unwrap();
    assert_eq!(error.kind, TransferErrorKind::Network);
    assert!(error.resume_token.is_none());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn resume_with_missing_partial_file_starts_over() {
    let addr = start_server();
    let dir = tempfile::tempdir().unwrap();
    let transport = transport(dir.path());

    let partial = dir.path().join("missing.download");
    let token = ResumeState::new(format!("http://{addr}/files/{SAMPLE_NAME}"), &partial, 10)
        .to_token()
        .unwrap();

    let outcome = transport.resume_download(token);

    assert!(outcome.error().is_none());
    assert_eq!(outcome.response().map(|r| r.status), Some(200));
    assert_eq!(outcome.value(), Some(&partial));
    assert_eq!(fs::read(&partial).unwrap(), SAMPLE_BODY);
}

#[test]
fn resume_with_short_partial_file_starts_over() {
    let addr = start_server();
    let dir = tempfile::tempdir().unwrap();
    let transport = transport(dir.path());

    let partial = dir.path().join("short.download");
    fs::write(&partial, &SAMPLE_BODY[..4]).unwrap();
    let token = ResumeState::new(format!("http://{addr}/files/{SAMPLE_NAME}"), &partial, 10)
        .to_token()
        .unwrap();

    let outcome = transport.resume_download(token);

    assert!(outcome.error().is_none());
    assert_eq!(outcome.response().map(|r| r.status), Some(200));
    assert_eq!(fs::read(&partial).unwrap(), SAMPLE_BODY);
}

#[test]
fn resume_of_complete_file_keeps_it() {
    let addr = start_server();
    let dir = tempfile::tempdir().unwrap();
    let transport = transport(dir.path());

    let partial = dir.path().join("full.download");
    fs::write(&partial, SAMPLE_BODY).unwrap();
    let received = SAMPLE_BODY.len() as u64;
    let token = ResumeState::new(format!("http://{addr}/files/{SAMPLE_NAME}"), &partial, received)
        .to_token()
        .unwrap();

    let outcome = transport.resume_download(token);

    assert!(outcome.error().is_none());
    assert_eq!(outcome.response().map(|r| r.status), Some(416));
    assert_eq!(outcome.value(), Some(&partial));
    assert_eq!(fs::read(&partial).unwrap(), SAMPLE_BODY);
}

#[test]
fn resume_against_shrunk_remote_file_is_rejected() {
    let addr = start_server();
    let dir = tempfile::tempdir().unwrap();
    let transport = transport(dir.path());

    let url = format!("http://{addr}/files/small.bin");
    let request = HttpRequest::parse(HttpMethod::Put, &url).unwrap();
    transport.upload_data(request, b"tiny".to_vec()).unwrap();

    let partial = dir.path().join("stale.download");
    fs::write(&partial, &SAMPLE_BODY[..10]).unwrap();
    let token = ResumeState::new(url, &partial, 10).to_token().unwrap();

    let outcome = transport.resume_download(token);

    assert!(outcome.value().is_none());
    assert_eq!(outcome.response().map(|r| r.status), Some(416));
    assert_eq!(
        outcome.error().map(|e| e.kind),
        Some(TransferErrorKind::InvalidResumeToken)
    );
    assert_eq!(fs::read(&partial).unwrap(), &SAMPLE_BODY[..10]);
}

#[test]
fn resume_answered_with_404_keeps_partial_file() {
    let addr = start_server();
    let dir = tempfile::tempdir().unwrap();
    let transport = transport(dir.path());

    let partial = dir.path().join("gone.download");
    fs::write(&partial, &SAMPLE_BODY[..10]).unwrap();
    let token = ResumeState::new(format!("http://{addr}/files/nope.bin"), &partial, 10)
        .to_token()
        .unwrap();

    let outcome = transport.resume_download(token.clone());

    assert!(outcome.value().is_none());
    assert_eq!(outcome.response().map(|r| r.status), Some(404));
    let error = outcome.error().unwrap();
    assert_eq!(error.kind, TransferErrorKind::Network);
    assert_eq!(error.resume_token.as_ref(), Some(&token));
    assert_eq!(fs::read(&partial).unwrap(), &SAMPLE_BODY[..10]);
}

#[test]
fn foreign_resume_token_is_a_transport_error() {
    let dir = tempfile::tempdir().unwrap();
    let transport = transport(dir.path());

    let outcome = transport.resume_download(ResumeToken::from_bytes(b"not json".to_vec()));

    assert!(outcome.value().is_none());
    assert!(outcome.response().is_none());
    assert_eq!(
        outcome.error().map(|e| e.kind),
        Some(TransferErrorKind::InvalidResumeToken)
    );
}

#[test]
fn connection_refused_is_a_network_error() {
    // Bind and drop to get a port nobody listens on.
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let transport = transport(dir.path());

    let outcome = transport.fetch_url(&format!("http://{addr}/hello")).unwrap();

    assert!(outcome.value().is_none());
    assert!(outcome.response().is_none());
    assert_eq!(outcome.error().map(|e| e.kind), Some(TransferErrorKind::Network));
}

#[test]
fn concurrent_fetches_from_many_threads() {
    let addr = start_server();
    let dir = tempfile::tempdir().unwrap();
    let transport = std::sync::Arc::new(transport(dir.path()));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let transport = std::sync::Arc::clone(&transport);
            std::thread::spawn(move || {
                let request = HttpRequest::parse(HttpMethod::Post, &format!("http://{addr}/echo"))
                    .unwrap();
                let body = format!("request {i}").into_bytes();
                let outcome = transport.upload_data(request, body.clone()).unwrap();
                (body, outcome)
            })
        })
        .collect();

    for handle in handles {
        let (body, outcome) = handle.join().unwrap();
        assert_eq!(outcome.value(), Some(&body));
    }
}
