//! C-ABI wrapper around the blocking transfer calls.
//!
//! # Overview
//! Exposes fetch, upload and download through `extern "C"` functions that
//! block the calling thread until the transfer completes. Each returns its
//! primary value (a body buffer or a download location) and reports response
//! metadata and errors through out-pointers.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - `out_response` and `out_error` may be null when the caller does not care.
//!   `*out_response` is always written (null if there was no response);
//!   `*out_error` is only written on failure.
//! - A null return means failure. Descriptor errors are reported before any
//!   transfer starts.
//! - The C caller owns every returned pointer and must release it with the
//!   matching `st_free_*` function.
//! - Calls block without a timeout. Do not call them from a callback of the
//!   same session.

pub mod types;

use std::ffi::CString;
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;

use synctransfer_core::{HttpRequest, Outcome, ResumeToken, SynchronousTransfer};
use synctransfer_transport::{ThreadedTransport, TransferError, TransportConfig};
use tracing::warn;

use types::*;

// ---------------------------------------------------------------------------
// Session lifecycle
// ---------------------------------------------------------------------------

/// Create a session whose downloads land in `download_dir`.
///
/// Pass null to use the `SYNCTRANSFER_*` environment configuration as is.
/// Returns null on failure and writes the reason to `out_error` (which may
/// be null): `InvalidArg` for a non-UTF-8 `download_dir`, or a `Transport`
/// error of kind `Runtime` when the worker runtime cannot start.
/// The caller must free the returned pointer with `st_session_free`.
#[unsafe(no_mangle)]
pub extern "C" fn st_session_new(
    download_dir: *const c_char,
    out_error: *mut *mut FfiError,
) -> *mut FfiSession {
    let created = catch_unwind(|| -> Result<ThreadedTransport, FfiError> {
        let mut config = TransportConfig::from_env();
        if !download_dir.is_null() {
            config = config.with_download_dir(read_str(download_dir, "download_dir")?);
        }
        ThreadedTransport::new(config).map_err(|err| {
            warn!(error = %err, "could not start transport");
            FfiError::transport(err)
        })
    });

    match created {
        Ok(Ok(inner)) => Box::into_raw(Box::new(FfiSession { inner })),
        Ok(Err(err)) => {
            set_error(out_error, err);
            std::ptr::null_mut()
        }
        Err(_) => {
            set_error(out_error, FfiError::panic("st_session_new"));
            std::ptr::null_mut()
        }
    }
}

/// Free a session created by `st_session_new`. Safe to call with null.
///
/// Must not be called while another thread is inside a transfer on it.
#[unsafe(no_mangle)]
pub extern "C" fn st_session_free(session: *mut FfiSession) {
    if !session.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(session) });
        }));
    }
}

// ---------------------------------------------------------------------------
// Fetch and upload
// ---------------------------------------------------------------------------

/// Load `request` and return its body.
#[unsafe(no_mangle)]
pub extern "C" fn st_fetch(
    session: *const FfiSession,
    request: *const FfiHttpRequest,
    out_response: *mut *mut FfiResponse,
    out_error: *mut *mut FfiError,
) -> *mut FfiBuffer {
    bridge_call(
        "st_fetch",
        out_response,
        out_error,
        || {
            let session = session_ref(session)?;
            let request = request_ref(request)?;
            Ok(session.inner.fetch(request))
        },
        FfiBuffer::from_vec,
    )
}

/// Load `url` with a plain GET and return its body.
#[unsafe(no_mangle)]
pub extern "C" fn st_fetch_url(
    session: *const FfiSession,
    url: *const c_char,
    out_response: *mut *mut FfiResponse,
    out_error: *mut *mut FfiError,
) -> *mut FfiBuffer {
    bridge_call(
        "st_fetch_url",
        out_response,
        out_error,
        || {
            let session = session_ref(session)?;
            let url = read_str(url, "url")?;
            Ok(session.inner.fetch_url(url)?)
        },
        FfiBuffer::from_vec,
    )
}

/// Send the file at `path` as the body of `request` and return the response
/// body.
#[unsafe(no_mangle)]
pub extern "C" fn st_upload_file(
    session: *const FfiSession,
    request: *const FfiHttpRequest,
    path: *const c_char,
    out_response: *mut *mut FfiResponse,
    out_error: *mut *mut FfiError,
) -> *mut FfiBuffer {
    bridge_call(
        "st_upload_file",
        out_response,
        out_error,
        || {
            let session = session_ref(session)?;
            let request = request_ref(request)?;
            let path = PathBuf::from(read_str(path, "path")?);
            Ok(session.inner.upload_file(request, path)?)
        },
        FfiBuffer::from_vec,
    )
}

/// Send `data[0..len]` as the body of `request` and return the response body.
#[unsafe(no_mangle)]
pub extern "C" fn st_upload_data(
    session: *const FfiSession,
    request: *const FfiHttpRequest,
    data: *const u8,
    len: usize,
    out_response: *mut *mut FfiResponse,
    out_error: *mut *mut FfiError,
) -> *mut FfiBuffer {
    bridge_call(
        "st_upload_data",
        out_response,
        out_error,
        || {
            let session = session_ref(session)?;
            let request = request_ref(request)?;
            let data = read_bytes(data, len, "data")?.to_vec();
            Ok(session.inner.upload_data(request, data)?)
        },
        FfiBuffer::from_vec,
    )
}

// ---------------------------------------------------------------------------
// Download
// ---------------------------------------------------------------------------

/// Download `request` and return the path of the downloaded file.
#[unsafe(no_mangle)]
pub extern "C" fn st_download(
    session: *const FfiSession,
    request: *const FfiHttpRequest,
    out_response: *mut *mut FfiResponse,
    out_error: *mut *mut FfiError,
) -> *mut c_char {
    bridge_call(
        "st_download",
        out_response,
        out_error,
        || {
            let session = session_ref(session)?;
            let request = request_ref(request)?;
            Ok(session.inner.download(request))
        },
        location_to_c,
    )
}

/// Download `url` with a plain GET and return the path of the downloaded file.
#[unsafe(no_mangle)]
pub extern "C" fn st_download_url(
    session: *const FfiSession,
    url: *const c_char,
    out_response: *mut *mut FfiResponse,
    out_error: *mut *mut FfiError,
) -> *mut c_char {
    bridge_call(
        "st_download_url",
        out_response,
        out_error,
        || {
            let session = session_ref(session)?;
            let url = read_str(url, "url")?;
            Ok(session.inner.download_url(url)?)
        },
        location_to_c,
    )
}

/// Continue an interrupted download from the `resume_data` of an earlier
/// `FfiError`.
#[unsafe(no_mangle)]
pub extern "C" fn st_download_resume(
    session: *const FfiSession,
    resume_data: *const u8,
    len: usize,
    out_response: *mut *mut FfiResponse,
    out_error: *mut *mut FfiError,
) -> *mut c_char {
    bridge_call(
        "st_download_resume",
        out_response,
        out_error,
        || {
            let session = session_ref(session)?;
            let token = ResumeToken::from_bytes(read_bytes(resume_data, len, "resume_data")?);
            Ok(session.inner.resume_download(token))
        },
        location_to_c,
    )
}

// ---------------------------------------------------------------------------
// Shared plumbing
// ---------------------------------------------------------------------------

/// Run one blocking call and spread its outcome over the C return value and
/// out-pointers.
fn bridge_call<T, R>(
    name: &'static str,
    out_response: *mut *mut FfiResponse,
    out_error: *mut *mut FfiError,
    call: impl FnOnce() -> Result<Outcome<T, TransferError>, CallError>,
    convert: fn(T) -> *mut R,
) -> *mut R {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(outcome)) => {
            let (value, response, error) = outcome.into_parts();
            set_response(out_response, response.map(FfiResponse::from_core));
            if let Some(err) = error {
                set_error(out_error, FfiError::transport(err));
            }
            value.map(convert).unwrap_or(std::ptr::null_mut())
        }
        Ok(Err(err)) => {
            set_response(out_response, None);
            set_error(out_error, err.into());
            std::ptr::null_mut()
        }
        Err(_) => {
            set_response(out_response, None);
            set_error(out_error, FfiError::panic(name));
            std::ptr::null_mut()
        }
    }
}

fn session_ref<'a>(session: *const FfiSession) -> Result<&'a FfiSession, CallError> {
    if session.is_null() {
        return Err(CallError::NullArg("session"));
    }
    Ok(unsafe { &*session })
}

fn request_ref(request: *const FfiHttpRequest) -> Result<HttpRequest, CallError> {
    if request.is_null() {
        return Err(CallError::NullArg("request"));
    }
    unsafe { &*request }.to_core()
}

fn location_to_c(path: PathBuf) -> *mut c_char {
    to_c_string(path.to_string_lossy().into_owned())
}

fn set_response(out: *mut *mut FfiResponse, response: Option<*mut FfiResponse>) {
    if out.is_null() {
        if let Some(ptr) = response {
            st_free_response(ptr);
        }
        return;
    }
    unsafe { *out = response.unwrap_or(std::ptr::null_mut()) };
}

fn set_error(out: *mut *mut FfiError, error: FfiError) {
    let ptr = Box::into_raw(Box::new(error));
    if out.is_null() {
        st_free_error(ptr);
        return;
    }
    unsafe { *out = ptr };
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free a buffer returned by `st_fetch*` / `st_upload_*`. Safe to call with
/// null.
#[unsafe(no_mangle)]
pub extern "C" fn st_free_buffer(buffer: *mut FfiBuffer) {
    if buffer.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let buffer = unsafe { Box::from_raw(buffer) };
        free_bytes(buffer.data, buffer.len);
    });
}

/// Free response metadata written to an `out_response`. Safe to call with
/// null.
#[unsafe(no_mangle)]
pub extern "C" fn st_free_response(response: *mut FfiResponse) {
    if response.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let response = unsafe { Box::from_raw(response) };
        free_c_string(response.url);
        if !response.headers.is_null() {
            let headers = unsafe {
                Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                    response.headers,
                    response.headers_len,
                ))
            };
            for header in headers.iter() {
                free_c_string(header.key);
                free_c_string(header.value);
            }
        }
    });
}

/// Free an error written to an `out_error`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn st_free_error(error: *mut FfiError) {
    if error.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let error = unsafe { Box::from_raw(error) };
        free_c_string(error.message);
        free_bytes(error.resume_data, error.resume_data_len);
    });
}

/// Free a location string returned by `st_download*`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn st_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { CString::from_raw(s) });
        });
    }
}

fn free_c_string(s: *mut c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s) });
    }
}

fn free_bytes(data: *mut u8, len: usize) {
    if !data.is_null() {
        drop(unsafe { Box::from_raw(std::ptr::slice_from_raw_parts_mut(data, len)) });
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
