//! An embeddable HTTP server engine.
//!
//! This library owns the connection lifecycle: it parses requests from a byte
//! stream, matches them against a route table, runs the handler and writes the
//! response back, looping while the client keeps the connection alive.
//!
//! # Features
//!
//! - Streaming request parser over a [`Transport`] abstraction, plus
//!   [`parse_request`] for requests already in memory
//! - Routing with literal, named-parameter (`:name`) and wildcard (`*`) segments
//! - Request bodies buffered in memory or spooled to a temporary file
//! - Lazy `multipart/form-data` and urlencoded form decoding
//! - Fixed, streamed (raw) and redirect responses
//! - WebSocket upgrade and framing
//! - Middleware chain and a configurable not-found handler
//!
//! # Examples
//!
//! ## Parsing a request
//!
//! ```
//! use microserve::parse_request;
//!
//! let request_bytes = b"GET /index.html?lang=en HTTP/1.1\r\nHost: example.com\r\n\r\n";
//!
//! match parse_request(request_bytes) {
//!     Ok(request) => {
//!         println!("Method: {}", request.method);
//!         println!("Path: {}", request.path);
//!         println!("Query: {:?}", request.query_params);
//!         println!("Headers: {:?}", request.headers);
//!     },
//!     Err(err) => {
//!         println!("Error parsing request: {}", err);
//!     }
//! }
//! ```
//!
//! ## Error handling
//!
//! ```
//! use microserve::{parse_request, ParserError};
//!
//! match parse_request(b"GET\r\n\r\n") {
//!     Ok(_) => println!("Request parsed successfully"),
//!     Err(ParserError::InvalidStatusLine(line)) => println!("Invalid status line: {}", line),
//!     Err(err) => println!("Other error: {}", err),
//! }
//! ```
//!
//! ## Serving
//!
//! ```no_run
//! use microserve::{HttpResponse, HttpServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), microserve::ServerError> {
//!     let mut server = HttpServer::new(ServerConfig::default());
//!     server.get("/hello/:name", |req| async move {
//!         let name = req.param("name").unwrap_or("world").to_string();
//!         HttpResponse::ok_text(format!("Hello, {name}!"))
//!     });
//!     server.start().await
//! }
//! ```
//!
//! See `demos/demo_server.rs` for a server exercising every response kind.

// Export the parser module
pub mod parser;

// Export the server module
pub mod server;

// Export the websocket module
pub mod websocket;

// Re-export commonly used items for convenience
pub use parser::{
    parse_request, Connection, Error as ParserError, HttpRequest, HttpVersion, Method, MultipartPart, Transport,
};
pub use server::{Error as ServerError, HttpResponse, HttpServer, ServerConfig, StatusCode};
