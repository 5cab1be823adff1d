//! HTTP server implementation for microserve.
//!
//! This module wires the parser to the router and the response writer:
//! one task per accepted connection, strictly sequential requests on each
//! connection, and a route table that is read-only once serving starts.

mod config;
mod error;
mod handler;
mod http_server;
mod response;
mod router;
mod writer;

// Re-export public items
pub use config::ServerConfig;
pub use error::Error;
pub use handler::{into_handler, HandlerFn, HandlerFuture, MiddlewareFn};
pub use http_server::HttpServer;
pub use response::{BodyWriter, BodyWriterFn, Headers, HttpResponse, SessionFn, StatusCode, SERVER_NAME};
pub use router::{Route, RoutePattern, Router, Segment};
pub use writer::{write_response, WriteOutcome};
