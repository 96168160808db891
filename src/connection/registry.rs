//! Registry of the currently connected client
//!
//! The active session publishes the sending side of its outbound channel
//! here; the button poller only ever calls [`ConnectionRegistry::try_send`].
//! No caller outside the session gets hold of the socket, and `publish`,
//! `clear` and `try_send` all run under one lock, so once `clear` returns no
//! later `try_send` can reach the session being torn down.

use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

/// Identifies one published session
pub type SessionId = u64;

struct ClientSlot {
    id: SessionId,
    peer: SocketAddr,
    outbound: mpsc::Sender<Bytes>,
}

/// Single slot holding the active client's outbound channel, or nothing
pub struct ConnectionRegistry {
    slot: Mutex<Option<ClientSlot>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Publish a session's outbound channel, replacing any previous one
    pub async fn publish(&self, peer: SocketAddr, outbound: mpsc::Sender<Bytes>) -> SessionId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut slot = self.slot.lock().await;
        if let Some(previous) = slot.replace(ClientSlot { id, peer, outbound }) {
            debug!(
                "Registry: session {} ({}) replaced by {}",
                previous.id, previous.peer, id
            );
        }
        debug!("Registry: published session {} ({})", id, peer);
        id
    }

    /// Remove a session, if it is still the published one
    ///
    /// Returns true if the slot was cleared.
    pub async fn clear(&self, id: SessionId) -> bool {
        let mut slot = self.slot.lock().await;
        match slot.as_ref() {
            Some(current) if current.id == id => {
                *slot = None;
                debug!("Registry: cleared session {}", id);
                true
            }
            _ => false,
        }
    }

    /// Hand bytes to the active session without waiting
    ///
    /// Returns false when no client is registered, the session is already
    /// closing, or its outbound queue is full. Nothing is retried.
    pub async fn try_send(&self, data: Bytes) -> bool {
        let slot = self.slot.lock().await;
        match slot.as_ref() {
            Some(current) => current.outbound.try_send(data).is_ok(),
            None => false,
        }
    }

    /// Peer address of the published session
    #[cfg(test)]
    pub async fn current_peer(&self) -> Option<SocketAddr> {
        self.slot.lock().await.as_ref().map(|s| s.peer)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
