//! Streaming request reader: status line, headers and body over a [`Transport`].

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::parser::connection::Transport;
use crate::parser::error::Error;
use crate::parser::request::{parse_header_line, parse_status_line, HttpRequest};

/// Size of each read issued by the body copy loop.
pub const CHUNK_SIZE: usize = 1024;

/// Where a request body ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyStrategy {
    /// No usable `Content-Length`; nothing is read.
    Skip,
    /// Read `n` bytes into [`HttpRequest::body`].
    Memory(usize),
    /// Stream `n` bytes into a temporary file recorded in [`HttpRequest::temp_file`].
    Spool(usize),
}

impl BodyStrategy {
    /// Pick a strategy from the request headers and the server's spool policy.
    ///
    /// Only `application/octet-stream` bodies are spooled, and only when
    /// `spool_uploads` is set.
    pub fn select(headers: &HashMap<String, String>, spool_uploads: bool) -> Self {
        let Some(length) = headers
            .get("content-length")
            .and_then(|value| value.parse::<usize>().ok())
        else {
            return BodyStrategy::Skip;
        };

        let is_upload = headers
            .get("content-type")
            .is_some_and(|value| value == "application/octet-stream");

        if is_upload && spool_uploads {
            BodyStrategy::Spool(length)
        } else {
            BodyStrategy::Memory(length)
        }
    }
}

/// Read the request line and headers. The body is left on the transport.
pub async fn read_request_head(transport: &mut dyn Transport) -> Result<HttpRequest, Error> {
    let status_line = match transport.read_line().await {
        Ok(line) => line,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Err(Error::ConnectionClosed),
        Err(e) => return Err(Error::Io(e)),
    };
    let (method, path, version) = parse_status_line(&status_line)?;

    let headers = read_headers(transport).await?;
    Ok(HttpRequest::new(method, path, version, headers))
}

async fn read_headers(transport: &mut dyn Transport) -> Result<HashMap<String, String>, Error> {
    let mut headers = HashMap::new();
    loop {
        let line = transport.read_line().await?;
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = parse_header_line(&line) {
            headers.insert(name, value);
        }
    }
    Ok(headers)
}

/// Fill the body of `request` according to `strategy`.
///
/// A spooled file that cannot be fully written is removed before the error
/// is returned.
pub async fn read_content(
    transport: &mut dyn Transport,
    request: &mut HttpRequest,
    strategy: BodyStrategy,
    temp_dir: &Path,
) -> Result<(), Error> {
    match strategy {
        BodyStrategy::Skip => {}
        BodyStrategy::Memory(size) => {
            request.body = read_body(transport, size).await?;
        }
        BodyStrategy::Spool(size) => {
            let path = read_to_file(transport, size, temp_dir).await?;
            debug!("Spooled {size} byte upload to {path}", path = path.display());
            request.temp_file = Some(path);
        }
    }
    Ok(())
}

/// Read a complete request: head plus an in-memory body.
pub async fn read_request(transport: &mut dyn Transport) -> Result<HttpRequest, Error> {
    let mut request = read_request_head(transport).await?;
    let strategy = BodyStrategy::select(&request.headers, false);
    read_content(transport, &mut request, strategy, Path::new("")).await?;
    Ok(request)
}

/// Read exactly `size` bytes, [`CHUNK_SIZE`] at a time at most.
pub async fn read_body(transport: &mut dyn Transport, size: usize) -> Result<Vec<u8>, Error> {
    let mut body = Vec::with_capacity(size.min(64 * CHUNK_SIZE));
    while body.len() < size {
        let length = CHUNK_SIZE.min(size - body.len());
        let buffer = transport.read(length).await?;
        body.extend_from_slice(&buffer);
    }
    Ok(body)
}

/// Stream exactly `size` bytes into a new uniquely named file under `dir`.
pub async fn read_to_file(transport: &mut dyn Transport, size: usize, dir: &Path) -> Result<PathBuf, Error> {
    let path = dir.join(Uuid::new_v4().to_string());
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .await?;

    let copied = async {
        let mut offset = 0;
        while offset < size {
            let length = CHUNK_SIZE.min(size - offset);
            let buffer = transport.read(length).await?;
            file.write_all(&buffer).await?;
            offset += buffer.len();
        }
        file.flush().await
    }
    .await;
    drop(file);

    match copied {
        Ok(()) => Ok(path),
        Err(e) => {
            let _ = tokio::fs::remove_file(&path).await;
            Err(Error::Io(e))
        }
    }
}
