//! HTTP parser module.
//!
//! This module turns a byte stream into [`HttpRequest`]s: the [`Transport`]
//! abstraction over a socket, the request line and header parser, the body
//! strategies (in memory or spooled to disk) and the multipart decoder.

mod connection;
mod error;
mod method;
mod multipart;
mod reader;
mod request;
mod version;

// Re-export public items
pub use connection::{BoxFuture, Connection, Socket, Transport};
pub use error::Error;
pub use method::Method;
pub use multipart::{MultipartPart, MultipartParts};
pub use reader::{read_body, read_content, read_request, read_request_head, read_to_file, BodyStrategy, CHUNK_SIZE};
pub use request::{extract_query_params, parse_request, HttpRequest};
pub use version::HttpVersion;
