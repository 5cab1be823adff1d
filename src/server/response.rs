//! HTTP response types and utilities.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::io;
use std::path::Path;

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::parser::{BoxFuture, Transport, CHUNK_SIZE};
use crate::server::error::Error;

/// Value of the `Server` header added to every response.
pub const SERVER_NAME: &str = "microserve-rs";

/// Response headers. Names keep the caller's case; lookups ignore it.
pub type Headers = HashMap<String, String>;

/// Callback that produces a raw response body.
pub type BodyWriterFn =
    Box<dyn for<'a> FnOnce(&'a mut BodyWriter<'_>) -> BoxFuture<'a, io::Result<()>> + Send>;

/// Continuation that takes over the socket after a protocol switch.
pub type SessionFn = Box<dyn FnOnce(Box<dyn Transport>) -> BoxFuture<'static, ()> + Send>;

/// HTTP status codes with their standard reason phrases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    SwitchingProtocols = 101,
    Ok = 200,
    Created = 201,
    Accepted = 202,
    NoContent = 204,
    MovedPermanently = 301,
    TemporaryRedirect = 307,
    BadRequest = 400,
    Unauthorized = 401,
    Forbidden = 403,
    NotFound = 404,
    MethodNotAllowed = 405,
    InternalServerError = 500,
    NotImplemented = 501,
    BadGateway = 502,
    ServiceUnavailable = 503,
}

impl StatusCode {
    /// Numeric status code.
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::SwitchingProtocols => "Switching Protocols",
            StatusCode::Ok => "OK",
            StatusCode::Created => "Created",
            StatusCode::Accepted => "Accepted",
            StatusCode::NoContent => "No Content",
            StatusCode::MovedPermanently => "Moved Permanently",
            StatusCode::TemporaryRedirect => "Temporary Redirect",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Unauthorized => "Unauthorized",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::InternalServerError => "Internal Server Error",
            StatusCode::NotImplemented => "Not Implemented",
            StatusCode::BadGateway => "Bad Gateway",
            StatusCode::ServiceUnavailable => "Service Unavailable",
        }
    }
}

/// Sink handed to a raw body callback. Each call writes straight to the socket.
pub struct BodyWriter<'a> {
    transport: &'a mut dyn Transport,
    written: u64,
}

impl<'a> BodyWriter<'a> {
    pub(crate) fn new(transport: &'a mut dyn Transport) -> Self {
        Self { transport, written: 0 }
    }

    /// Write a chunk of the body.
    pub async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.transport.write(data).await?;
        self.written += data.len() as u64;
        Ok(())
    }

    /// Copy `reader` to the socket until it is exhausted, [`CHUNK_SIZE`]
    /// bytes at a time. Returns the number of bytes copied.
    pub async fn copy_from<R>(&mut self, reader: &mut R) -> io::Result<u64>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let mut buffer = [0u8; CHUNK_SIZE];
        let mut copied = 0;
        loop {
            let n = reader.read(&mut buffer).await?;
            if n == 0 {
                return Ok(copied);
            }
            self.write(&buffer[..n]).await?;
            copied += n as u64;
        }
    }

    /// Stream the file at `path` without loading it into memory.
    pub async fn write_file(&mut self, path: impl AsRef<Path>) -> io::Result<u64> {
        let mut file = tokio::fs::File::open(path).await?;
        self.copy_from(&mut file).await
    }

    /// Bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }
}

/// Represents an HTTP response.
///
/// Exactly one variant is active; the response writer renders each of them.
pub enum HttpResponse {
    /// A complete body known up front.
    Fixed {
        status: StatusCode,
        headers: Headers,
        body: Vec<u8>,
    },
    /// A body produced by a callback writing directly to the connection.
    Raw {
        status: u16,
        reason: String,
        headers: Headers,
        writer: BodyWriterFn,
    },
    /// `301 Moved Permanently` to the given location.
    MovedPermanently(String),
    /// `404 Not Found` with an empty body.
    NotFound,
    /// `400 Bad Request` with the given content.
    BadRequest(Vec<u8>),
    /// `101 Switching Protocols`, after which `session` owns the socket.
    SwitchProtocols {
        headers: Headers,
        session: SessionFn,
    },
}

impl HttpResponse {
    /// Create a new HTTP response with the given status code.
    pub fn new(status: StatusCode) -> Self {
        HttpResponse::Fixed {
            status,
            headers: default_headers(),
            body: Vec::new(),
        }
    }

    /// `200 OK` with an HTML body.
    pub fn ok_html(body: impl Into<String>) -> Self {
        Self::new(StatusCode::Ok)
            .with_content_type("text/html")
            .with_body_string(body)
    }

    /// `200 OK` with a plain text body.
    pub fn ok_text(body: impl Into<String>) -> Self {
        Self::new(StatusCode::Ok)
            .with_content_type("text/plain")
            .with_body_string(body)
    }

    /// `201 Created` with no body.
    pub fn created() -> Self {
        Self::new(StatusCode::Created)
    }

    /// `202 Accepted` with no body.
    pub fn accepted() -> Self {
        Self::new(StatusCode::Accepted)
    }

    /// `204 No Content`.
    pub fn no_content() -> Self {
        Self::new(StatusCode::NoContent)
    }

    /// Permanent redirect.
    pub fn moved_permanently(location: impl Into<String>) -> Self {
        HttpResponse::MovedPermanently(location.into())
    }

    /// Temporary redirect (307).
    pub fn moved_temporarily(location: impl Into<String>) -> Self {
        Self::new(StatusCode::TemporaryRedirect).with_header("Location", location)
    }

    /// Bad request with a plain text explanation.
    pub fn bad_request(content: impl Into<Vec<u8>>) -> Self {
        HttpResponse::BadRequest(content.into())
    }

    /// `401 Unauthorized`.
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::Unauthorized)
    }

    /// `403 Forbidden`.
    pub fn forbidden() -> Self {
        Self::new(StatusCode::Forbidden)
    }

    /// `404 Not Found`.
    pub fn not_found() -> Self {
        HttpResponse::NotFound
    }

    /// `500 Internal Server Error` with a plain text explanation.
    pub fn internal_server_error(content: impl Into<String>) -> Self {
        Self::new(StatusCode::InternalServerError)
            .with_content_type("text/plain")
            .with_body_string(content)
    }

    /// A response whose body is written by `writer`.
    ///
    /// No `Content-Length` is computed. The connection is closed afterwards
    /// unless `headers` carry `Content-Length` or `Transfer-Encoding: chunked`.
    pub fn raw<F>(status: u16, reason: impl Into<String>, headers: Headers, writer: F) -> Self
    where
        F: for<'a> FnOnce(&'a mut BodyWriter<'_>) -> BoxFuture<'a, io::Result<()>> + Send + 'static,
    {
        HttpResponse::Raw {
            status,
            reason: reason.into(),
            headers,
            writer: Box::new(writer),
        }
    }

    /// A protocol switch; `session` receives the connection once the head is written.
    pub fn switch_protocols<F, Fut>(headers: Headers, session: F) -> Self
    where
        F: FnOnce(Box<dyn Transport>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        HttpResponse::SwitchProtocols {
            headers,
            session: Box::new(move |transport: Box<dyn Transport>| -> BoxFuture<'static, ()> {
                Box::pin(session(transport))
            }),
        }
    }

    /// Numeric status code of the response.
    pub fn status_code(&self) -> u16 {
        match self {
            HttpResponse::Fixed { status, .. } => status.code(),
            HttpResponse::Raw { status, .. } => *status,
            HttpResponse::MovedPermanently(_) => StatusCode::MovedPermanently.code(),
            HttpResponse::NotFound => StatusCode::NotFound.code(),
            HttpResponse::BadRequest(_) => StatusCode::BadRequest.code(),
            HttpResponse::SwitchProtocols { .. } => StatusCode::SwitchingProtocols.code(),
        }
    }

    /// Look up a header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        let headers = match self {
            HttpResponse::Fixed { headers, .. }
            | HttpResponse::Raw { headers, .. }
            | HttpResponse::SwitchProtocols { headers, .. } => headers,
            _ => return None,
        };
        find_header(headers, name)
    }

    /// The in-memory body, for variants that have one.
    pub fn body(&self) -> Option<&[u8]> {
        match self {
            HttpResponse::Fixed { body, .. } | HttpResponse::BadRequest(body) => Some(body.as_slice()),
            HttpResponse::MovedPermanently(_) | HttpResponse::NotFound => Some(&[][..]),
            HttpResponse::Raw { .. } | HttpResponse::SwitchProtocols { .. } => None,
        }
    }

    /// Set the response body with a string.
    pub fn with_body_string(self, body: impl Into<String>) -> Self {
        self.with_body_bytes(body.into().into_bytes())
    }

    /// Set the response body with bytes.
    ///
    /// Redirect, not-found and bad-request responses become fixed responses
    /// with the same status.
    pub fn with_body_bytes(self, body: impl Into<Vec<u8>>) -> Self {
        match self.into_fixed() {
            HttpResponse::Fixed { status, headers, .. } => HttpResponse::Fixed {
                status,
                headers,
                body: body.into(),
            },
            other => other,
        }
    }

    /// Add or replace a header. Any existing header with the same name in a
    /// different case is replaced.
    pub fn with_header(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut response = self.into_fixed();
        if let HttpResponse::Fixed { headers, .. }
        | HttpResponse::Raw { headers, .. }
        | HttpResponse::SwitchProtocols { headers, .. } = &mut response
        {
            set_header(headers, name, value);
        }
        response
    }

    /// Set the content type.
    pub fn with_content_type(self, content_type: impl Into<String>) -> Self {
        self.with_header("Content-Type", content_type)
    }

    /// Set the response body with a JSON value.
    ///
    /// This method serializes the provided value to JSON and sets it as the response body.
    pub fn with_json<T: Serialize>(self, value: &T) -> Result<Self, Error> {
        let json = serde_json::to_vec(value).map_err(Error::JsonError)?;
        Ok(self
            .with_header("Content-Type", "application/json")
            .with_body_bytes(json))
    }

    /// Rewrite the shorthand variants as `Fixed` responses; others pass through.
    fn into_fixed(self) -> Self {
        match self {
            HttpResponse::MovedPermanently(location) => {
                Self::new(StatusCode::MovedPermanently).insert_header("Location", location)
            }
            HttpResponse::NotFound => Self::new(StatusCode::NotFound),
            HttpResponse::BadRequest(content) => HttpResponse::Fixed {
                status: StatusCode::BadRequest,
                headers: default_headers(),
                body: content,
            },
            other => other,
        }
    }

    fn insert_header(mut self, name: &str, value: String) -> Self {
        if let HttpResponse::Fixed { headers, .. } = &mut self {
            headers.insert(name.to_string(), value);
        }
        self
    }
}

/// Headers every response starts with.
pub(crate) fn default_headers() -> Headers {
    let mut headers = HashMap::new();
    headers.insert("Server".to_string(), SERVER_NAME.to_string());
    headers
}

/// Insert a header, replacing any existing one whose name differs only in case.
pub(crate) fn set_header(headers: &mut Headers, name: impl Into<String>, value: impl Into<String>) {
    let name = name.into();
    headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
    headers.insert(name, value.into());
}

pub(crate) fn find_header<'h>(headers: &'h Headers, name: &str) -> Option<&'h str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpResponse::Fixed { status, headers, body } => f
                .debug_struct("Fixed")
                .field("status", status)
                .field("headers", headers)
                .field("body_len", &body.len())
                .finish(),
            HttpResponse::Raw { status, reason, headers, .. } => f
                .debug_struct("Raw")
                .field("status", status)
                .field("reason", reason)
                .field("headers", headers)
                .finish_non_exhaustive(),
            HttpResponse::MovedPermanently(location) => {
                f.debug_tuple("MovedPermanently").field(location).finish()
            }
            HttpResponse::NotFound => f.write_str("NotFound"),
            HttpResponse::BadRequest(content) => {
                f.debug_tuple("BadRequest").field(&content.len()).finish()
            }
            HttpResponse::SwitchProtocols { headers, .. } => f
                .debug_struct("SwitchProtocols")
                .field("headers", headers)
                .finish_non_exhaustive(),
        }
    }
}
