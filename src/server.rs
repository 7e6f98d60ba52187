//! TCP front end: accepts connections and gives each one a reader and a
//! writer thread.
//!
//! The reader thread runs [`run_session`], which feeds lines into the shared
//! engine. The writer thread drains the connection's [`ChannelOutbox`], so
//! the engine never blocks on a socket while it holds its lock.

mod outbox;
mod session;

use std::io::BufReader;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::ServerError;
use crate::game::{PlayerId, SharedEngine};

pub use outbox::{ChannelOutbox, OUTBOX_CAPACITY, Outgoing, drain, spawn_writer};
pub use session::{MAX_LINE_BYTES, SessionEnd, run_session};

/// Hands out player ids. Ids are never reused within a process.
#[derive(Debug, Default)]
pub struct PlayerIds {
    next: AtomicU64,
}

impl PlayerIds {
    /// Allocator whose first id is 0.
    #[must_use]
    pub const fn new() -> Self {
        Self::starting_at(0)
    }

    /// Allocator whose first id is `first`.
    #[must_use]
    pub const fn starting_at(first: PlayerId) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Take the next id.
    #[must_use]
    pub fn allocate(&self) -> PlayerId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// Counts connections whose writer is still running.
///
/// Shutdown waits on this so queued farewells reach clients before the
/// process exits.
#[derive(Debug, Clone, Default)]
pub struct Connections {
    inner: Arc<(Mutex<usize>, Condvar)>,
}

impl Connections {
    /// Empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn count_guard(&self) -> MutexGuard<'_, usize> {
        self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn open(&self) {
        *self.count_guard() += 1;
    }

    pub(crate) fn close(&self) {
        let mut open = self.count_guard();
        *open = open.saturating_sub(1);
        if *open == 0 {
            self.inner.1.notify_all();
        }
    }

    /// Connections still writing.
    #[must_use]
    pub fn count(&self) -> usize {
        *self.count_guard()
    }

    /// Block until every writer has finished or `timeout` passes. Returns
    /// whether the server went idle.
    #[must_use]
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let guard = self.count_guard();
        let (open, _) = self
            .inner
            .1
            .wait_timeout_while(guard, timeout, |open| *open > 0)
            .unwrap_or_else(PoisonError::into_inner);
        *open == 0
    }
}

/// A listening game server.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    engine: SharedEngine,
    ids: Arc<PlayerIds>,
    connections: Connections,
}

impl Server {
    /// Bind the listening socket.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub fn bind(addr: impl ToSocketAddrs, engine: SharedEngine) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self {
            listener,
            engine,
            ids: Arc::new(PlayerIds::new()),
            connections: Connections::new(),
        })
    }

    /// Tracker for this server's live connections.
    #[must_use]
    pub fn connections(&self) -> Connections {
        self.connections.clone()
    }

    /// The address actually bound, useful after binding port 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever.
    ///
    /// A failed accept or connection setup is logged and skipped.
    ///
    /// # Errors
    ///
    /// Only returns if the listener stops yielding connections.
    pub fn serve(&self) -> Result<(), ServerError> {
        info!(addr = %self.local_addr()?, "listening");
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    if let Err(e) = self.spawn_connection(stream) {
                        warn!(error = %e, "failed to set up connection");
                    }
                }
                Err(e) => warn!(error = %e, "accept failed"),
            }
        }
        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream) -> Result<(), ServerError> {
        let peer = stream.peer_addr()?;
        let write_half = stream.try_clone()?;
        let shutdown_handle = stream.try_clone()?;
        let stall_handle = stream.try_clone()?;
        info!(%peer, "connection accepted");

        let (outbox, rx) = ChannelOutbox::channel();
        let outbox = outbox.on_overflow(move || {
            let _ = stall_handle.shutdown(Shutdown::Both);
        });
        let connections = self.connections.clone();
        self.connections.open();
        let spawned = spawn_writer(format!("dod-writer-{peer}"), rx, write_half, move || {
            let _ = shutdown_handle.shutdown(Shutdown::Both);
            connections.close();
        });
        if let Err(e) = spawned {
            self.connections.close();
            return Err(e.into());
        }

        let engine = self.engine.clone();
        let ids = Arc::clone(&self.ids);
        thread::Builder::new()
            .name(format!("dod-conn-{peer}"))
            .spawn(move || {
                let end = run_session(&engine, &ids, BufReader::new(stream), &outbox);
                info!(%peer, ?end, "connection finished");
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_sequential() {
        let ids = PlayerIds::new();
        assert_eq!(ids.allocate(), 0);
        assert_eq!(ids.allocate(), 1);

        let ids = PlayerIds::starting_at(40);
        assert_eq!(ids.allocate(), 40);
    }

    #[test]
    fn test_ids_unique_across_threads() {
        let ids = Arc::new(PlayerIds::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = Arc::clone(&ids);
                thread::spawn(move || (0..100).map(|_| ids.allocate()).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<PlayerId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 400);
    }

    #[test]
    fn test_connections_wait_idle() {
        let connections = Connections::new();
        assert!(connections.wait_idle(Duration::ZERO));

        connections.open();
        connections.open();
        assert_eq!(connections.count(), 2);
        assert!(!connections.wait_idle(Duration::from_millis(10)));

        let closer = connections.clone();
        let handle = thread::spawn(move || {
            closer.close();
            closer.close();
        });
        assert!(connections.wait_idle(Duration::from_secs(5)));
        handle.join().unwrap();
        assert_eq!(connections.count(), 0);

        connections.close();
        assert_eq!(connections.count(), 0);
    }
}
