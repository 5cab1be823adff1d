//! Server configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The address to bind to.
    pub addr: SocketAddr,
    /// The maximum number of concurrent connections.
    pub max_connections: usize,
    /// Capacity of the per-connection read buffer.
    pub read_buffer_size: usize,
    /// Stream `application/octet-stream` bodies to a temporary file instead of memory.
    pub spool_uploads: bool,
    /// Directory that receives spooled uploads.
    pub temp_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            max_connections: 1024,
            read_buffer_size: 8192,
            spool_uploads: false,
            temp_dir: std::env::temp_dir(),
        }
    }
}

impl ServerConfig {
    /// Set the bind address.
    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    /// Set the connection limit.
    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Set the read buffer capacity.
    pub fn with_read_buffer_size(mut self, read_buffer_size: usize) -> Self {
        self.read_buffer_size = read_buffer_size;
        self
    }

    /// Enable or disable spooling of binary uploads to disk.
    pub fn with_spool_uploads(mut self, spool_uploads: bool) -> Self {
        self.spool_uploads = spool_uploads;
        self
    }

    /// Set the directory used for spooled uploads.
    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }
}
