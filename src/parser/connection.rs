//! Byte-stream transport over one accepted socket.
//!
//! No HTTP knowledge lives here: the transport hands out CRLF-terminated lines,
//! bounded reads and raw writes. Everything above it (request parsing, response
//! writing, WebSocket framing) talks to a `&mut dyn Transport`.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Type alias for a boxed, sendable future borrowed for `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Longest line accepted from the peer, excluding the terminator.
const MAX_LINE_LEN: usize = 64 * 1024;

/// A blocking-style byte stream: every call completes before the next begins.
///
/// Implementations fail with an I/O error on disconnect; end of stream is
/// reported as [`io::ErrorKind::UnexpectedEof`].
pub trait Transport: Send {
    /// Read one line terminated by `\n`. Carriage returns are dropped.
    fn read_line(&mut self) -> BoxFuture<'_, io::Result<String>>;

    /// Read at most `length` bytes. May return fewer; never returns an empty
    /// buffer for a non-zero `length`.
    fn read(&mut self, length: usize) -> BoxFuture<'_, io::Result<Vec<u8>>>;

    /// Write all of `data`.
    fn write<'a>(&'a mut self, data: &'a [u8]) -> BoxFuture<'a, io::Result<()>>;

    /// Flush and shut down the write half.
    fn close(&mut self) -> BoxFuture<'_, io::Result<()>>;
}

/// Stream types a [`Connection`] can wrap.
pub trait Socket: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Socket for T {}

/// A [`Transport`] over any async socket.
pub struct Connection<S> {
    stream: BufReader<S>,
    peer: Option<SocketAddr>,
}

impl<S: Socket> Connection<S> {
    /// Wrap a socket with the given read buffer capacity.
    pub fn new(socket: S, read_buffer_size: usize) -> Self {
        Self {
            stream: BufReader::with_capacity(read_buffer_size, socket),
            peer: None,
        }
    }

    /// Record the remote address of the socket.
    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    /// The remote address, if known.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    async fn read_line_inner(&mut self) -> io::Result<String> {
        let mut line = Vec::new();
        loop {
            let available = self.stream.fill_buf().await?;
            if available.is_empty() {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed while reading a line",
                ));
            }
            let (consumed, done) = match available.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    line.extend_from_slice(&available[..pos]);
                    (pos + 1, true)
                }
                None => {
                    line.extend_from_slice(available);
                    (available.len(), false)
                }
            };
            self.stream.consume(consumed);
            if line.len() > MAX_LINE_LEN {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "line too long"));
            }
            if done {
                break;
            }
        }
        line.retain(|&b| b != b'\r');
        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    async fn read_inner(&mut self, length: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0; length];
        if length == 0 {
            return Ok(buf);
        }
        let n = self.stream.read(&mut buf).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed while reading the body",
            ));
        }
        buf.truncate(n);
        Ok(buf)
    }
}

impl<S: Socket> Transport for Connection<S> {
    fn read_line(&mut self) -> BoxFuture<'_, io::Result<String>> {
        Box::pin(self.read_line_inner())
    }

    fn read(&mut self, length: usize) -> BoxFuture<'_, io::Result<Vec<u8>>> {
        Box::pin(self.read_inner(length))
    }

    fn write<'a>(&'a mut self, data: &'a [u8]) -> BoxFuture<'a, io::Result<()>> {
        Box::pin(async move {
            let socket = self.stream.get_mut();
            socket.write_all(data).await?;
            socket.flush().await
        })
    }

    fn close(&mut self) -> BoxFuture<'_, io::Result<()>> {
        Box::pin(async move { self.stream.get_mut().shutdown().await })
    }
}
