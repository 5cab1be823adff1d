//! WebSocket frame codec (RFC 6455 Section 5).

use std::io;

use thiserror::Error;

use crate::parser::Transport;

/// Errors raised while reading or writing frames.
#[derive(Debug, Error)]
pub enum WsError {
    /// The transport failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Unknown opcode.
    #[error("invalid opcode: 0x{0:X}")]
    InvalidOpcode(u8),

    /// Client frames must be masked.
    #[error("client frame must be masked")]
    UnmaskedFrame,

    /// A text message was not valid UTF-8.
    #[error("invalid UTF-8 in text frame")]
    InvalidUtf8,

    /// A frame or reassembled message exceeded the payload cap.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: u64, max: usize },

    /// Any other violation of the framing rules.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),
}

/// Frame opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Continuation = 0x0,
    Text = 0x1,
    Binary = 0x2,
    Close = 0x8,
    Ping = 0x9,
    Pong = 0xA,
}

impl OpCode {
    /// Control frames: close, ping and pong.
    pub const fn is_control(self) -> bool {
        matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }

    pub fn from_u8(value: u8) -> Result<Self, WsError> {
        match value {
            0x0 => Ok(OpCode::Continuation),
            0x1 => Ok(OpCode::Text),
            0x2 => Ok(OpCode::Binary),
            0x8 => Ok(OpCode::Close),
            0x9 => Ok(OpCode::Ping),
            0xA => Ok(OpCode::Pong),
            _ => Err(WsError::InvalidOpcode(value)),
        }
    }
}

/// A single frame with its payload already unmasked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub fin: bool,
    pub opcode: OpCode,
    pub payload: Vec<u8>,
}

impl Frame {
    /// A final frame.
    pub fn new(opcode: OpCode, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            fin: true,
            opcode,
            payload: payload.into(),
        }
    }

    /// Serialize as a server frame (never masked).
    pub fn encode(&self) -> Vec<u8> {
        let len = self.payload.len();
        let mut out = Vec::with_capacity(len + 10);
        let fin_bit: u8 = if self.fin { 0x80 } else { 0x00 };
        out.push(fin_bit | self.opcode as u8);
        if len < 126 {
            out.push(len as u8);
        } else if len <= u16::MAX as usize {
            out.push(126);
            out.extend_from_slice(&(len as u16).to_be_bytes());
        } else {
            out.push(127);
            out.extend_from_slice(&(len as u64).to_be_bytes());
        }
        out.extend_from_slice(&self.payload);
        out
    }
}

/// XOR `payload` with the 4-byte masking key.
pub fn apply_mask(payload: &mut [u8], mask_key: [u8; 4]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= mask_key[i % 4];
    }
}

async fn read_exact(transport: &mut dyn Transport, size: usize) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(size);
    while buf.len() < size {
        let chunk = transport.read(size - buf.len()).await?;
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

/// Read one client frame. Payloads longer than `max_payload` are rejected
/// before any of the payload is read.
pub async fn read_frame(transport: &mut dyn Transport, max_payload: usize) -> Result<Frame, WsError> {
    let header = read_exact(transport, 2).await?;
    let fin = header[0] & 0x80 != 0;
    if header[0] & 0x70 != 0 {
        return Err(WsError::ProtocolViolation("reserved bits set"));
    }
    let opcode = OpCode::from_u8(header[0] & 0x0F)?;
    let masked = header[1] & 0x80 != 0;
    if !masked {
        return Err(WsError::UnmaskedFrame);
    }

    let len = match header[1] & 0x7F {
        126 => {
            let ext = read_exact(transport, 2).await?;
            u64::from(u16::from_be_bytes([ext[0], ext[1]]))
        }
        127 => {
            let ext = read_exact(transport, 8).await?;
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&ext);
            u64::from_be_bytes(bytes)
        }
        short => u64::from(short),
    };

    if opcode.is_control() && (!fin || len > 125) {
        return Err(WsError::ProtocolViolation("control frames must be final and at most 125 bytes"));
    }
    if len > max_payload as u64 {
        return Err(WsError::PayloadTooLarge { size: len, max: max_payload });
    }

    let key = read_exact(transport, 4).await?;
    let mut payload = read_exact(transport, len as usize).await?;
    apply_mask(&mut payload, [key[0], key[1], key[2], key[3]]);

    Ok(Frame { fin, opcode, payload })
}
