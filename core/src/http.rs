//! HTTP request descriptors and response metadata.
//!
//! # Design
//! These types describe a transfer as plain data. The core never executes
//! them; a [`Transport`](crate::transport::Transport) does. `HttpRequest`
//! holds an already-parsed [`Url`], so a request value is always well formed
//! and descriptor errors can only surface where a raw string enters the
//! system (`HttpRequest::parse` and the `*_url` call shapes).
//!
//! `HttpResponse` is metadata only. The body travels separately as the
//! payload or download location of an [`Outcome`](crate::bridge::Outcome).

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::DescriptorError;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Whether requests with this method may carry an upload body.
    pub fn allows_body(self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully formed request descriptor.
///
/// Owned by the caller for the duration of a call and moved into the
/// transport when the task starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    /// A bare `GET` for `url`, the minimal request a URL stands for.
    pub fn get(url: Url) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// Parse `input` into a request, rejecting anything that is not an
    /// absolute `http` or `https` URL.
    pub fn parse(method: HttpMethod, input: &str) -> Result<Self, DescriptorError> {
        let url = Url::parse(input).map_err(|source| DescriptorError::InvalidUrl {
            input: input.to_string(),
            source,
        })?;
        match url.scheme() {
            "http" | "https" => Ok(Self::new(method, url)),
            other => Err(DescriptorError::UnsupportedScheme(other.to_string())),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Transport-level response metadata.
///
/// Present whenever the transport got as far as receiving a response, even
/// if the transfer failed afterwards. A non-2xx status is not an error here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    /// Effective URL, after any redirects the transport followed.
    pub url: String,
}

impl HttpResponse {
    /// First header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
