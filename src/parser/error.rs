//! Error types for the HTTP parser.

use thiserror::Error;

/// Errors that can occur during HTTP request parsing.
#[derive(Debug, Error)]
pub enum Error {
    /// The request line has fewer than three space-separated tokens.
    #[error("Invalid status line: {0}")]
    InvalidStatusLine(String),

    /// The peer closed the connection before sending a request line.
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// The request is empty.
    #[error("Empty request")]
    EmptyRequest,

    /// A required header is missing from the request.
    #[error("Required header is missing: {0}")]
    MissingHeader(String),

    /// The transport failed while reading the request.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error parsing JSON.
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}
