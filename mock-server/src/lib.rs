//! HTTP test server for exercising real transfers.
//!
//! Serves a small in-memory file store with `Range` support, echoes upload
//! bodies, answers with arbitrary status codes and redirects into the store.
//! `/flaky/{sent}/{name}` drops the connection after `sent` bytes of a
//! whole-file response, for exercising interrupted downloads.

use std::{collections::HashMap, io, sync::Arc, time::Duration};

use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use futures_util::{stream, StreamExt};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;

/// Name of the file every fresh store starts with.
pub const SAMPLE_NAME: &str = "sample.txt";

/// Contents of [`SAMPLE_NAME`].
pub const SAMPLE_BODY: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

pub type Store = Arc<RwLock<HashMap<String, Bytes>>>;

pub fn app() -> Router {
    let mut files = HashMap::new();
    files.insert(SAMPLE_NAME.to_string(), Bytes::from_static(SAMPLE_BODY));
    let store: Store = Arc::new(RwLock::new(files));

    Router::new()
        .route("/hello", get(hello))
        .route("/echo", post(echo).put(echo).patch(echo))
        .route("/files/{name}", get(get_file).put(put_file))
        .route("/flaky/{sent}/{name}", get(flaky_file))
        .route("/status/{code}", get(status))
        .route("/redirect/{name}", get(redirect))
        .with_state(store)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn hello() -> &'static str {
    "ok"
}

async fn echo(body: Bytes) -> impl IntoResponse {
    debug!(len = body.len(), "echo");
    ([("x-received-bytes", body.len().to_string())], body)
}

async fn get_file(
    State(store): State<Store>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Response {
    let files = store.read().await;
    let Some(contents) = files.get(&name).cloned() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    drop(files);

    let total = contents.len();
    let range = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
        .map(|value| parse_range(value, total));

    match range {
        None => contents.into_response(),
        Some(Some((start, end))) => {
            debug!(%name, start, end, "partial content");
            (
                StatusCode::PARTIAL_CONTENT,
                [(header::CONTENT_RANGE, format!("bytes {start}-{end}/{total}"))],
                contents.slice(start..=end),
            )
                .into_response()
        }
        Some(None) => (
            StatusCode::RANGE_NOT_SATISFIABLE,
            [(header::CONTENT_RANGE, format!("bytes */{total}"))],
        )
            .into_response(),
    }
}

/// Whole-file requests get the full `Content-Length` but only `sent` bytes
/// before the connection is aborted. Ranged requests are served normally so
/// an interrupted download can be resumed against the same URL.
async fn flaky_file(
    State(store): State<Store>,
    Path((sent, name)): Path<(usize, String)>,
    headers: HeaderMap,
) -> Response {
    if headers.contains_key(header::RANGE) {
        return get_file(State(store), Path(name), headers).await;
    }
    let Some(contents) = store.read().await.get(&name).cloned() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let total = contents.len();
    let head = contents.slice(..sent.min(total));
    debug!(%name, sent = head.len(), total, "dropping connection mid-body");

    let body = stream::iter([Ok::<_, io::Error>(head)]).chain(stream::once(async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Err(io::Error::new(io::ErrorKind::ConnectionAborted, "dropped mid-body"))
    }));
    (
        [(header::CONTENT_LENGTH, total.to_string())],
        Body::from_stream(body),
    )
        .into_response()
}

async fn put_file(
    State(store): State<Store>,
    Path(name): Path<String>,
    body: Bytes,
) -> (StatusCode, String) {
    let len = body.len();
    store.write().await.insert(name, body);
    (StatusCode::CREATED, format!("stored {len} bytes"))
}

async fn status(Path(code): Path<u16>) -> (StatusCode, String) {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
    (status, format!("status {}", status.as_u16()))
}

async fn redirect(Path(name): Path<String>) -> Redirect {
    Redirect::to(&format!("/files/{name}"))
}

/// Parse a single `bytes=start-[end]` range against a body of `total` bytes.
///
/// Returns the inclusive byte span, or `None` when the range cannot be
/// satisfied.
fn parse_range(value: &str, total: usize) -> Option<(usize, usize)> {
    let spec = value.strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    let start: usize = start.trim().parse().ok()?;
    let end = match end.trim() {
        "" => total.checked_sub(1)?,
        end => end.parse::<usize>().ok()?.min(total.checked_sub(1)?),
    };
    if start > end || start >= total {
        return None;
    }
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::parse_range;

    #[test]
    fn open_ended_range() {
        assert_eq!(parse_range("bytes=5-", 10), Some((5, 9)));
    }

    #[test]
    fn closed_range_is_clamped() {
        assert_eq!(parse_range("bytes=2-100", 10), Some((2, 9)));
    }

    #[test]
    fn range_past_end_is_unsatisfiable() {
        assert_eq!(parse_range("bytes=10-", 10), None);
        assert_eq!(parse_range("bytes=0-", 0), None);
    }

    #[test]
    fn malformed_range_is_unsatisfiable() {
        assert_eq!(parse_range("items=0-1", 10), None);
        assert_eq!(parse_range("bytes=x-", 10), None);
    }
}
