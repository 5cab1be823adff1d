//! WebSocket support (RFC 6455).
//!
//! [`websocket`] builds a route handler that performs the upgrade handshake
//! and then hands the connection to a [`WebSocketSession`], which decodes
//! client frames and dispatches them to the registered callbacks.
//!
//! ```no_run
//! use microserve::{HttpServer, ServerConfig};
//! use microserve::websocket::{websocket, WebSocketHandlers};
//!
//! let mut server = HttpServer::new(ServerConfig::default());
//! server.get("/echo", websocket(WebSocketHandlers::new().on_text(|session, text| {
//!     Box::pin(async move {
//!         let _ = session.write_text(&text).await;
//!     })
//! })));
//! ```

mod frame;
mod session;
mod tests;

use std::collections::HashMap;
use std::future::{ready, Ready};

use base64::Engine;
use sha1::{Digest, Sha1};

use crate::parser::HttpRequest;
use crate::server::HttpResponse;

pub use frame::{apply_mask, read_frame, Frame, OpCode, WsError};
pub use session::{
    BinaryCallback, EventCallback, SessionState, TextCallback, WebSocketHandlers, WebSocketSession,
    DEFAULT_MAX_PAYLOAD,
};

/// GUID appended to the client key when computing `Sec-WebSocket-Accept`.
const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Compute the `Sec-WebSocket-Accept` value for a client key.
pub fn compute_accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

/// Build the handshake response for `request`, or a 400 if it is not a
/// valid upgrade request.
pub fn handshake(request: &HttpRequest, handlers: WebSocketHandlers) -> HttpResponse {
    if !request.has_token_for_header("upgrade", "websocket") {
        return HttpResponse::bad_request("Invalid value of 'Upgrade' header");
    }
    if !request.has_token_for_header("connection", "upgrade") {
        return HttpResponse::bad_request("Invalid value of 'Connection' header");
    }
    let Some(key) = request.header("sec-websocket-key") else {
        return HttpResponse::bad_request("Missing 'Sec-WebSocket-Key' header");
    };

    let mut headers = HashMap::new();
    headers.insert("Upgrade".to_string(), "websocket".to_string());
    headers.insert("Connection".to_string(), "Upgrade".to_string());
    headers.insert("Sec-WebSocket-Accept".to_string(), compute_accept_key(key));

    HttpResponse::switch_protocols(headers, move |transport| {
        WebSocketSession::new(transport).run(handlers)
    })
}

/// A route handler that upgrades matching requests to WebSocket sessions.
pub fn websocket(handlers: WebSocketHandlers) -> impl Fn(HttpRequest) -> Ready<HttpResponse> + Send + Sync + 'static {
    move |request: HttpRequest| ready(handshake(&request, handlers.clone()))
}
