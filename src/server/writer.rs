//! Serializes an [`HttpResponse`] onto a [`Transport`].

use std::io;

use crate::parser::{Method, Transport};
use crate::server::response::{
    default_headers, find_header, set_header, BodyWriter, Headers, HttpResponse, SessionFn, StatusCode,
};

/// What the connection should do after a response has been written.
pub enum WriteOutcome {
    /// Read the next request from the same connection.
    KeepAlive,
    /// Close the connection.
    Close,
    /// Hand the connection to the protocol session.
    Upgrade(SessionFn),
}

impl WriteOutcome {
    pub(crate) fn from_keep_alive(keep_alive: bool) -> Self {
        if keep_alive {
            WriteOutcome::KeepAlive
        } else {
            WriteOutcome::Close
        }
    }
}

/// Write `response` to `transport`.
///
/// `keep_alive` is whether the request negotiated a persistent connection.
/// Bodies are omitted for `HEAD` requests. Errors raised by a raw body
/// callback abandon the response and are returned as-is.
pub async fn write_response(
    transport: &mut dyn Transport,
    response: HttpResponse,
    keep_alive: bool,
    method: &Method,
) -> io::Result<WriteOutcome> {
    let send_body = *method != Method::HEAD;

    let (status, mut headers, body) = match response {
        HttpResponse::Fixed { status, headers, body } => (status, headers, body),
        HttpResponse::MovedPermanently(location) => {
            let mut headers = default_headers();
            headers.insert("Location".to_string(), location);
            (StatusCode::MovedPermanently, headers, Vec::new())
        }
        HttpResponse::NotFound => (StatusCode::NotFound, default_headers(), Vec::new()),
        HttpResponse::BadRequest(content) => (StatusCode::BadRequest, default_headers(), content),
        HttpResponse::Raw { status, reason, mut headers, writer } => {
            let framed = find_header(&headers, "content-length").is_some()
                || find_header(&headers, "transfer-encoding")
                    .is_some_and(|value| value.to_ascii_lowercase().contains("chunked"));
            let keep_alive = keep_alive && framed;
            if keep_alive {
                set_header(&mut headers, "Connection", "keep-alive");
            }

            transport.write(&head(status, &reason, &headers)).await?;
            if send_body {
                let mut sink = BodyWriter::new(transport);
                writer(&mut sink).await?;
            }
            return Ok(WriteOutcome::from_keep_alive(keep_alive));
        }
        HttpResponse::SwitchProtocols { headers, session } => {
            let status = StatusCode::SwitchingProtocols;
            transport.write(&head(status.code(), status.reason_phrase(), &headers)).await?;
            return Ok(WriteOutcome::Upgrade(session));
        }
    };

    set_header(&mut headers, "Content-Length", body.len().to_string());
    if keep_alive {
        set_header(&mut headers, "Connection", "keep-alive");
    }

    let mut bytes = head(status.code(), status.reason_phrase(), &headers);
    if send_body {
        bytes.extend_from_slice(&body);
    }
    transport.write(&bytes).await?;
    Ok(WriteOutcome::from_keep_alive(keep_alive))
}

/// Status line, header lines and the blank line that ends the head.
fn head(status: u16, reason: &str, headers: &Headers) -> Vec<u8> {
    let mut bytes = format!("HTTP/1.1 {status} {reason}\r\n").into_bytes();
    for (name, value) in headers {
        bytes.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
    }
    bytes.extend_from_slice(b"\r\n");
    bytes
}
