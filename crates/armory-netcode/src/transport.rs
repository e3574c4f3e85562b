//! Transport traits for network communication
//!
//! The protocol needs a reliable, ordered byte channel to one peer. Hosts
//! implement [`Connection`] for their network stack; [`LocalChannel`] is the
//! in-process implementation used by tests and single-process games.

use crate::{Error, Packet, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Connection-oriented transport (e.g. TCP, WebSocket)
///
/// Reliable, ordered communication with a specific peer.
pub trait Connection: Send + Sync {
    /// Error type for this connection
    type Error: std::error::Error + Send + Sync + 'static;

    /// Send data reliably (guaranteed delivery, ordered)
    fn send_reliable(&self, data: &[u8]) -> std::result::Result<(), Self::Error>;

    /// Receive data (non-blocking)
    ///
    /// Returns `Ok(None)` if no data is available.
    fn recv(&self) -> std::result::Result<Option<Vec<u8>>, Self::Error>;

    /// Check if the connection is still alive
    fn is_connected(&self) -> bool;

    /// Close the connection gracefully
    fn close(&self) -> std::result::Result<(), Self::Error>;
}

/// Encode and send one packet
pub fn send_packet<C: Connection>(conn: &C, packet: &Packet) -> Result<()> {
    let bytes = packet.encode()?;
    conn.send_reliable(&bytes)
        .map_err(|e| Error::Transport(e.to_string()))
}

/// Receive and decode one packet, if any is waiting
pub fn recv_packet<C: Connection>(conn: &C) -> Result<Option<Packet>> {
    match conn.recv().map_err(|e| Error::Transport(e.to_string()))? {
        Some(bytes) => Packet::decode(&bytes).map(Some),
        None => Ok(None),
    }
}

/// Failure of a [`LocalChannel`] endpoint
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("channel closed")]
    Closed,
    #[error("channel lock poisoned")]
    Poisoned,
}

type Queue = Arc<Mutex<VecDeque<Vec<u8>>>>;

/// One end of an in-process connection
#[derive(Debug, Clone)]
pub struct LocalChannel {
    inbox: Queue,
    outbox: Queue,
    open: Arc<AtomicBool>,
}

impl LocalChannel {
    /// Two connected endpoints
    pub fn pair() -> (LocalChannel, LocalChannel) {
        let a: Queue = Arc::default();
        let b: Queue = Arc::default();
        let open = Arc::new(AtomicBool::new(true));
        (
            LocalChannel {
                inbox: a.clone(),
                outbox: b.clone(),
                open: open.clone(),
            },
            LocalChannel {
                inbox: b,
                outbox: a,
                open,
            },
        )
    }

    /// Packets waiting to be received on this end
    pub fn pending(&self) -> usize {
        self.inbox.lock().map_or(0, |q| q.len())
    }
}

impl Connection for LocalChannel {
    type Error = ChannelError;

    fn send_reliable(&self, data: &[u8]) -> std::result::Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::Closed);
        }
        self.outbox
            .lock()
            .map_err(|_| ChannelError::Poisoned)?
            .push_back(data.to_vec());
        Ok(())
    }

    fn recv(&self) -> std::result::Result<Option<Vec<u8>>, ChannelError> {
        // Drain what arrived before a close
        Ok(self
            .inbox
            .lock()
            .map_err(|_| ChannelError::Poisoned)?
            .pop_front())
    }

    fn is_connected(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn close(&self) -> std::result::Result<(), ChannelError> {
        self.open.store(false, Ordering::Release);
        Ok(())
    }
}
