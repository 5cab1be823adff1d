//! WebSocket session over an upgraded connection.

use std::sync::Arc;

use log::debug;

use crate::parser::{BoxFuture, Transport};
use crate::websocket::frame::{read_frame, Frame, OpCode, WsError};

/// Default cap on a single frame or reassembled message.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Callback receiving a text message.
pub type TextCallback = Arc<dyn for<'a> Fn(&'a mut WebSocketSession, String) -> BoxFuture<'a, ()> + Send + Sync>;
/// Callback receiving a binary message or a pong payload.
pub type BinaryCallback = Arc<dyn for<'a> Fn(&'a mut WebSocketSession, Vec<u8>) -> BoxFuture<'a, ()> + Send + Sync>;
/// Callback for connect and disconnect events.
pub type EventCallback = Arc<dyn for<'a> Fn(&'a mut WebSocketSession) -> BoxFuture<'a, ()> + Send + Sync>;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Handshake,
    Open,
    Closing,
    Closed,
}

/// Callbacks invoked by a running session. Unset callbacks are skipped.
#[derive(Clone)]
pub struct WebSocketHandlers {
    text: Option<TextCallback>,
    binary: Option<BinaryCallback>,
    pong: Option<BinaryCallback>,
    connected: Option<EventCallback>,
    disconnected: Option<EventCallback>,
    max_payload: usize,
}

impl Default for WebSocketHandlers {
    fn default() -> Self {
        Self {
            text: None,
            binary: None,
            pong: None,
            connected: None,
            disconnected: None,
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl WebSocketHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_text<F>(mut self, callback: F) -> Self
    where
        F: for<'a> Fn(&'a mut WebSocketSession, String) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.text = Some(Arc::new(callback));
        self
    }

    pub fn on_binary<F>(mut self, callback: F) -> Self
    where
        F: for<'a> Fn(&'a mut WebSocketSession, Vec<u8>) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.binary = Some(Arc::new(callback));
        self
    }

    pub fn on_pong<F>(mut self, callback: F) -> Self
    where
        F: for<'a> Fn(&'a mut WebSocketSession, Vec<u8>) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.pong = Some(Arc::new(callback));
        self
    }

    pub fn on_connected<F>(mut self, callback: F) -> Self
    where
        F: for<'a> Fn(&'a mut WebSocketSession) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.connected = Some(Arc::new(callback));
        self
    }

    pub fn on_disconnected<F>(mut self, callback: F) -> Self
    where
        F: for<'a> Fn(&'a mut WebSocketSession) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.disconnected = Some(Arc::new(callback));
        self
    }

    /// Cap on the size of a frame or reassembled message.
    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload;
        self
    }
}

/// One live WebSocket connection.
///
/// Writes go straight to the socket on the calling task; a session must not
/// be written to from several tasks at once.
pub struct WebSocketSession {
    transport: Box<dyn Transport>,
    state: SessionState,
}

impl WebSocketSession {
    /// Wrap a connection whose handshake response has already been written.
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            state: SessionState::Handshake,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub async fn write_text(&mut self, text: &str) -> Result<(), WsError> {
        self.write_frame(Frame::new(OpCode::Text, text.as_bytes())).await
    }

    pub async fn write_binary(&mut self, data: &[u8]) -> Result<(), WsError> {
        self.write_frame(Frame::new(OpCode::Binary, data)).await
    }

    pub async fn write_ping(&mut self, data: &[u8]) -> Result<(), WsError> {
        self.write_frame(Frame::new(OpCode::Ping, data)).await
    }

    pub async fn write_pong(&mut self, data: &[u8]) -> Result<(), WsError> {
        self.write_frame(Frame::new(OpCode::Pong, data)).await
    }

    /// Send a close frame carrying `code`.
    pub async fn write_close(&mut self, code: u16) -> Result<(), WsError> {
        self.write_frame(Frame::new(OpCode::Close, code.to_be_bytes())).await
    }

    pub async fn write_frame(&mut self, frame: Frame) -> Result<(), WsError> {
        if self.state == SessionState::Closed {
            return Err(WsError::ProtocolViolation("session is closed"));
        }
        self.transport.write(&frame.encode()).await?;
        Ok(())
    }

    /// Serve the session until the peer closes it or an error occurs.
    ///
    /// `connected` runs first and `disconnected` runs last, whatever the
    /// reason for ending.
    pub async fn run(mut self, handlers: WebSocketHandlers) {
        self.state = SessionState::Open;
        if let Some(connected) = &handlers.connected {
            connected(&mut self).await;
        }

        if let Err(e) = self.read_loop(&handlers).await {
            debug!("WebSocket session ended: {e}");
        }

        self.state = SessionState::Closed;
        let _ = self.transport.close().await;
        if let Some(disconnected) = &handlers.disconnected {
            disconnected(&mut self).await;
        }
    }

    async fn read_loop(&mut self, handlers: &WebSocketHandlers) -> Result<(), WsError> {
        // Opcode and payload of a message still waiting for its final fragment.
        let mut partial: Option<(OpCode, Vec<u8>)> = None;

        loop {
            let frame = read_frame(self.transport.as_mut(), handlers.max_payload).await?;
            match frame.opcode {
                OpCode::Text | OpCode::Binary => {
                    if partial.is_some() {
                        return Err(WsError::ProtocolViolation("new message before previous one finished"));
                    }
                    if frame.fin {
                        self.deliver(handlers, frame.opcode, frame.payload).await?;
                    } else {
                        partial = Some((frame.opcode, frame.payload));
                    }
                }
                OpCode::Continuation => {
                    let Some((opcode, mut payload)) = partial.take() else {
                        return Err(WsError::ProtocolViolation("continuation without a message"));
                    };
                    payload.extend_from_slice(&frame.payload);
                    if payload.len() > handlers.max_payload {
                        return Err(WsError::PayloadTooLarge {
                            size: payload.len() as u64,
                            max: handlers.max_payload,
                        });
                    }
                    if frame.fin {
                        self.deliver(handlers, opcode, payload).await?;
                    } else {
                        partial = Some((opcode, payload));
                    }
                }
                OpCode::Ping => self.write_pong(&frame.payload).await?,
                OpCode::Pong => {
                    if let Some(pong) = &handlers.pong {
                        pong(self, frame.payload).await;
                    }
                }
                OpCode::Close => {
                    self.state = SessionState::Closing;
                    let code = frame.payload.get(..2).unwrap_or_default().to_vec();
                    self.write_frame(Frame::new(OpCode::Close, code)).await?;
                    return Ok(());
                }
            }
        }
    }

    async fn deliver(&mut self, handlers: &WebSocketHandlers, opcode: OpCode, payload: Vec<u8>) -> Result<(), WsError> {
        if opcode == OpCode::Text {
            let text = String::from_utf8(payload).map_err(|_| WsError::InvalidUtf8)?;
            if let Some(on_text) = &handlers.text {
                on_text(self, text).await;
            }
        } else if let Some(on_binary) = &handlers.binary {
            on_binary(self, payload).await;
        }
        Ok(())
    }
}
