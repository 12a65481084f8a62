//! Connection pool - one TCP socket per server address.
//!
//! The pool bridges raw byte I/O to the frame layer: each connection gets a
//! background read loop that feeds socket chunks into its own
//! [`FrameBuffer`] and hands every decoded frame to the pool's dispatch
//! callback. Write access goes through [`ConnectionPool::send`] with bytes
//! that are already framed.
//!
//! Read loops are tracked by their `JoinHandle` and aborted on
//! [`ConnectionPool::close`]; a loop that sees end-of-stream exits silently
//! on its own, with no implicit reconnect.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use crate::address::ServerAddress;
use crate::error::{Result, TopperError};
use crate::protocol::FrameBuffer;

/// Callback invoked synchronously for every decoded frame.
///
/// An empty payload is a ping/pong control frame.
pub(crate) type FrameHandler = Arc<dyn Fn(&ServerAddress, Bytes) + Send + Sync>;

/// One open socket, exclusively owned by the pool.
struct Connection {
    /// Write half, serialized behind an async lock.
    writer: Arc<tokio::sync::Mutex<OwnedWriteHalf>>,
    /// Background read loop for this socket.
    reader_task: JoinHandle<()>,
}

/// Pool of at most one connection per server address.
pub(crate) struct ConnectionPool {
    connections: Mutex<HashMap<ServerAddress, Connection>>,
    on_frame: FrameHandler,
    read_buffer_size: usize,
}

impl ConnectionPool {
    /// Create an empty pool dispatching decoded frames to `on_frame`.
    pub(crate) fn new(on_frame: FrameHandler, read_buffer_size: usize) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            on_frame,
            read_buffer_size,
        }
    }

    /// Open a connection for `address` if none exists yet.
    ///
    /// Idempotent: a no-op when a connection is already present, including
    /// one opened concurrently while this call was connecting.
    pub(crate) async fn ensure_connection(&self, address: &ServerAddress) -> Result<()> {
        if self.has_connection(address) {
            return Ok(());
        }

        let stream = TcpStream::connect((address.host(), address.port())).await?;
        let (read_half, write_half) = stream.into_split();

        let mut connections = self.connections.lock().expect("pool lock poisoned");
        if connections.contains_key(address) {
            // Lost the race to a concurrent ensure_connection; keep the
            // existing socket and let this one drop.
            return Ok(());
        }

        let reader_task = tokio::spawn(read_loop(
            read_half,
            address.clone(),
            self.on_frame.clone(),
            self.read_buffer_size,
        ));

        connections.insert(
            address.clone(),
            Connection {
                writer: Arc::new(tokio::sync::Mutex::new(write_half)),
                reader_task,
            },
        );

        Ok(())
    }

    /// Write already-framed bytes to the connection for `address`.
    ///
    /// Fails with [`TopperError::NoConnection`] if none exists; callers must
    /// `ensure_connection` first.
    pub(crate) async fn send(&self, address: &ServerAddress, bytes: &[u8]) -> Result<()> {
        let writer = {
            let connections = self.connections.lock().expect("pool lock poisoned");
            connections
                .get(address)
                .map(|conn| conn.writer.clone())
                .ok_or_else(|| TopperError::NoConnection(address.clone()))?
        };

        let mut writer = writer.lock().await;
        writer.write_all(bytes).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Close the connection for `address`, if any.
    ///
    /// Idempotent; returns whether a connection existed. Aborts the read
    /// loop and drops the socket.
    pub(crate) fn close(&self, address: &ServerAddress) -> bool {
        let removed = self
            .connections
            .lock()
            .expect("pool lock poisoned")
            .remove(address);

        match removed {
            Some(conn) => {
                conn.reader_task.abort();
                tracing::trace!(server = %address, "connection closed");
                true
            }
            None => false,
        }
    }

    /// Close every connection in the pool.
    pub(crate) fn close_all(&self) {
        let connections = std::mem::take(
            &mut *self.connections.lock().expect("pool lock poisoned"),
        );

        for (address, conn) in connections {
            conn.reader_task.abort();
            tracing::trace!(server = %address, "connection closed");
        }
    }

    /// Whether a connection currently exists for `address`.
    pub(crate) fn has_connection(&self, address: &ServerAddress) -> bool {
        self.connections
            .lock()
            .expect("pool lock poisoned")
            .contains_key(address)
    }
}

/// Pull chunks from the socket and feed them to the decoder until the
/// stream ends.
async fn read_loop(
    mut reader: OwnedReadHalf,
    address: ServerAddress,
    on_frame: FrameHandler,
    buffer_size: usize,
) {
    let mut frame_buffer = FrameBuffer::new();
    let mut buf = vec![0u8; buffer_size];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                tracing::trace!(server = %address, "stream ended");
                return;
            }
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(server = %address, error = %e, "read loop ended");
                return;
            }
        };

        for frame in frame_buffer.push(&buf[..n]) {
            (on_frame)(&address, frame.payload);
        }
    }
}
