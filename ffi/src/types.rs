//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Inputs (`FfiHttpRequest`, `FfiHeader`) are owned by the C caller; this
//! library only reads them for the duration of a call. Outputs
//! (`FfiBuffer`, `FfiResponse`, `FfiError`, location strings) are allocated
//! here and must be released with the matching `st_free_*` function.
//! Byte buffers are boxed slices, so `data` + `len` is all that is needed to
//! free them.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use synctransfer_core::{DescriptorError, HttpMethod, HttpRequest, HttpResponse};
use synctransfer_transport::{ThreadedTransport, TransferError, TransferErrorKind};

/// Opaque handle to a transport. C callers receive a pointer to this and
/// pass it back into every transfer function.
pub struct FfiSession {
    pub(crate) inner: ThreadedTransport,
}

// ---------------------------------------------------------------------------
// Request input (caller-provided)
// ---------------------------------------------------------------------------

/// HTTP method as a C enum.
#[repr(C)]
#[derive(Clone, Copy)]
pub enum FfiHttpMethod {
    Get = 0,
    Head = 1,
    Post = 2,
    Put = 3,
    Patch = 4,
    Delete = 5,
}

impl From<FfiHttpMethod> for HttpMethod {
    fn from(m: FfiHttpMethod) -> Self {
        match m {
            FfiHttpMethod::Get => HttpMethod::Get,
            FfiHttpMethod::Head => HttpMethod::Head,
            FfiHttpMethod::Post => HttpMethod::Post,
            FfiHttpMethod::Put => HttpMethod::Put,
            FfiHttpMethod::Patch => HttpMethod::Patch,
            FfiHttpMethod::Delete => HttpMethod::Delete,
        }
    }
}

/// A request header as a pair of borrowed C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *const c_char,
    pub value: *const c_char,
}

/// A request descriptor built by the C caller.
///
/// `headers` may be null when `headers_len` is 0; `body` may be null when
/// `body_len` is 0.
#[repr(C)]
pub struct FfiHttpRequest {
    pub method: FfiHttpMethod,
    pub url: *const c_char,
    pub headers: *const FfiHeader,
    pub headers_len: usize,
    pub body: *const u8,
    pub body_len: usize,
}

impl FfiHttpRequest {
    /// Copy the caller's descriptor into a core `HttpRequest`.
    pub(crate) fn to_core(&self) -> Result<HttpRequest, CallError> {
        let url = read_str(self.url, "request.url")?;
        let mut request = HttpRequest::parse(self.method.into(), url)?;

        if self.headers_len > 0 {
            if self.headers.is_null() {
                return Err(CallError::NullArg("request.headers"));
            }
            let headers =
                unsafe { std::slice::from_raw_parts(self.headers, self.headers_len) };
            for header in headers {
                let key = read_str(header.key, "header.key")?;
                let value = read_str(header.value, "header.value")?;
                request = request.with_header(key, value);
            }
        }

        if self.body_len > 0 || !self.body.is_null() {
            request.body = Some(read_bytes(self.body, self.body_len, "request.body")?.to_vec());
        }
        Ok(request)
    }
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// An owned byte buffer (response body).
#[repr(C)]
pub struct FfiBuffer {
    pub data: *mut u8,
    pub len: usize,
}

impl FfiBuffer {
    pub(crate) fn from_vec(bytes: Vec<u8>) -> *mut Self {
        let len = bytes.len();
        let data = Box::into_raw(bytes.into_boxed_slice()) as *mut u8;
        Box::into_raw(Box::new(FfiBuffer { data, len }))
    }
}

/// A response header as a pair of owned C strings.
#[repr(C)]
pub struct FfiResponseHeader {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

/// Response metadata: status, effective URL and headers.
#[repr(C)]
pub struct FfiResponse {
    pub status: u16,
    pub url: *mut c_char,
    pub headers: *mut FfiResponseHeader,
    pub headers_len: usize,
}

impl FfiResponse {
    pub(crate) fn from_core(response: HttpResponse) -> *mut Self {
        let headers: Vec<FfiResponseHeader> = response
            .headers
            .into_iter()
            .map(|(k, v)| FfiResponseHeader {
                key: to_c_string(k),
                value: to_c_string(v),
            })
            .collect();
        let headers_len = headers.len();
        let headers = if headers.is_empty() {
            std::ptr::null_mut()
        } else {
            Box::into_raw(headers.into_boxed_slice()) as *mut FfiResponseHeader
        };

        Box::into_raw(Box::new(FfiResponse {
            status: response.status,
            url: to_c_string(response.url),
            headers,
            headers_len,
        }))
    }
}

/// Error categories reported in `FfiError::code`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    /// The request descriptor was malformed; no transfer was started.
    Descriptor = 1,
    /// The transfer failed; see `transport_kind`.
    Transport = 2,
    NullArg = 3,
    InvalidArg = 4,
    Panic = 5,
}

/// Transport failure category, `None` unless `code` is `Transport`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiTransportErrorKind {
    None = 0,
    Network = 1,
    Io = 2,
    InvalidResumeToken = 3,
    Runtime = 4,
}

impl From<TransferErrorKind> for FfiTransportErrorKind {
    fn from(kind: TransferErrorKind) -> Self {
        match kind {
            TransferErrorKind::Network => FfiTransportErrorKind::Network,
            TransferErrorKind::Io => FfiTransportErrorKind::Io,
            TransferErrorKind::InvalidResumeToken => FfiTransportErrorKind::InvalidResumeToken,
            TransferErrorKind::Runtime => FfiTransportErrorKind::Runtime,
        }
    }
}

/// Error written through a transfer function's `out_error`.
///
/// `resume_data` is non-null when an interrupted download can be continued
/// with `st_download_resume`.
#[repr(C)]
pub struct FfiError {
    pub code: FfiErrorCode,
    pub transport_kind: FfiTransportErrorKind,
    pub message: *mut c_char,
    pub resume_data: *mut u8,
    pub resume_data_len: usize,
}

impl FfiError {
    fn new(code: FfiErrorCode, message: String) -> Self {
        FfiError {
            code,
            transport_kind: FfiTransportErrorKind::None,
            message: to_c_string(message),
            resume_data: std::ptr::null_mut(),
            resume_data_len: 0,
        }
    }

    pub(crate) fn transport(err: TransferError) -> Self {
        let mut ffi = FfiError::new(FfiErrorCode::Transport, err.to_string());
        ffi.transport_kind = err.kind.into();
        if let Some(token) = err.resume_token {
            let bytes = token.into_bytes().into_boxed_slice();
            ffi.resume_data_len = bytes.len();
            ffi.resume_data = Box::into_raw(bytes) as *mut u8;
        }
        ffi
    }

    pub(crate) fn panic(name: &str) -> Self {
        FfiError::new(FfiErrorCode::Panic, format!("panic in {name}"))
    }
}

// ---------------------------------------------------------------------------
// Argument errors
// ---------------------------------------------------------------------------

/// Why a call failed before a transfer could be started.
#[derive(Debug)]
pub(crate) enum CallError {
    NullArg(&'static str),
    InvalidArg(String),
    Descriptor(DescriptorError),
}

impl From<DescriptorError> for CallError {
    fn from(err: DescriptorError) -> Self {
        CallError::Descriptor(err)
    }
}

impl From<CallError> for FfiError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::NullArg(name) => {
                FfiError::new(FfiErrorCode::NullArg, format!("null argument: {name}"))
            }
            CallError::InvalidArg(msg) => FfiError::new(FfiErrorCode::InvalidArg, msg),
            CallError::Descriptor(err) => FfiError::new(FfiErrorCode::Descriptor, err.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

/// Borrow a caller-provided UTF-8 C string.
pub(crate) fn read_str<'a>(ptr: *const c_char, name: &'static str) -> Result<&'a str, CallError> {
    if ptr.is_null() {
        return Err(CallError::NullArg(name));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| CallError::InvalidArg(format!("{name} is not valid UTF-8")))
}

/// Borrow a caller-provided byte range. Null is accepted only for length 0.
pub(crate) fn read_bytes<'a>(
    ptr: *const u8,
    len: usize,
    name: &'static str,
) -> Result<&'a [u8], CallError> {
    if ptr.is_null() {
        return if len == 0 {
            Ok(&[])
        } else {
            Err(CallError::NullArg(name))
        };
    }
    Ok(unsafe { std::slice::from_raw_parts(ptr, len) })
}

/// Allocate a C string. Interior NULs are dropped.
pub(crate) fn to_c_string(s: String) -> *mut c_char {
    let s = if s.contains('\0') { s.replace('\0', "") } else { s };
    CString::new(s).unwrap_or_default().into_raw()
}
