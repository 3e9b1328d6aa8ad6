//! Outbound command queue and socket write path.
//!
//! Callers enqueue command text from any task through a cloneable
//! [`CommandSender`]; the connection loop owns the matching
//! [`CommandQueue`] and drains it once per cycle. The channel replaces a
//! lock-shared send list: FIFO order is preserved end to end and enqueue
//! never blocks.
//!
//! ```text
//! Caller 1 ─┐
//! Caller 2 ─┼─► CommandSender ─► CommandQueue ─► connection loop ─► TCP
//! Caller N ─┘
//! ```

use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::error::{LwrpError, Result};

/// Cloneable handle for queueing outbound commands.
#[derive(Clone)]
pub struct CommandSender {
    tx: mpsc::UnboundedSender<String>,
}

impl CommandSender {
    /// Append a command to the FIFO, newline-terminated.
    ///
    /// Fails with [`LwrpError::ConnectionClosed`] once the connection loop
    /// has exited and dropped the queue.
    pub fn enqueue(&self, command: &str) -> Result<()> {
        let mut text = String::with_capacity(command.len() + 1);
        text.push_str(command);
        text.push('\n');
        self.tx.send(text).map_err(|_| LwrpError::ConnectionClosed)
    }
}

/// Receive end of the command FIFO, owned by the connection loop.
pub struct CommandQueue {
    rx: mpsc::UnboundedReceiver<String>,
}

impl CommandQueue {
    /// Create a connected sender/queue pair.
    pub fn channel() -> (CommandSender, CommandQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        (CommandSender { tx }, CommandQueue { rx })
    }

    /// Remove and return everything queued so far, in FIFO order.
    ///
    /// Never waits: an empty queue yields an empty vector.
    pub fn drain(&mut self) -> Vec<String> {
        let mut pending = Vec::new();
        while let Ok(command) = self.rx.try_recv() {
            pending.push(command);
        }
        pending
    }
}

/// Write one command fully before returning.
///
/// Partial writes retry with the remainder; a would-block write waits for
/// the socket to become writable again.
pub async fn write_command(stream: &TcpStream, command: &str) -> Result<()> {
    let bytes = command.as_bytes();
    let mut written = 0;

    while written < bytes.len() {
        stream.writable().await?;
        match stream.try_write(&bytes[written..]) {
            Ok(0) => {
                return Err(LwrpError::Io(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "socket write returned 0",
                )));
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
            Err(e) => return Err(LwrpError::Io(e)),
        }
    }

    Ok(())
}
