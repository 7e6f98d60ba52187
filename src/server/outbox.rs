//! Per-connection outbound queue and the thread that drains it.

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::game::Outbox;

/// One item on a connection's outbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// A line to write, without its newline.
    Line(String),
    /// Stop writing and close the connection.
    Close,
}

/// Lines a connection may have queued before it counts as stalled.
pub const OUTBOX_CAPACITY: usize = 1024;

type OverflowHook = Arc<dyn Fn() + Send + Sync>;

/// [`Outbox`] backed by a bounded channel.
///
/// Sending never blocks, so the engine can broadcast while holding its lock.
/// A full queue means the client stopped reading: the item is dropped and
/// the overflow hook runs.
#[derive(Clone)]
pub struct ChannelOutbox {
    tx: SyncSender<Outgoing>,
    on_overflow: Option<OverflowHook>,
}

impl fmt::Debug for ChannelOutbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelOutbox")
            .field("tx", &self.tx)
            .field("on_overflow", &self.on_overflow.is_some())
            .finish()
    }
}

impl ChannelOutbox {
    /// Create an outbox holding up to [`OUTBOX_CAPACITY`] items and the
    /// receiving end a writer drains.
    #[must_use]
    pub fn channel() -> (Self, Receiver<Outgoing>) {
        Self::with_capacity(OUTBOX_CAPACITY)
    }

    /// Create an outbox holding up to `capacity` items.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> (Self, Receiver<Outgoing>) {
        let (tx, rx) = mpsc::sync_channel(capacity);
        let outbox = Self {
            tx,
            on_overflow: None,
        };
        (outbox, rx)
    }

    /// Run `hook` whenever an item is dropped because the queue is full.
    #[must_use]
    pub fn on_overflow(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_overflow = Some(Arc::new(hook));
        self
    }

    fn push(&self, item: Outgoing) {
        match self.tx.try_send(item) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("outbox full; dropping slow client");
                if let Some(hook) = &self.on_overflow {
                    hook();
                }
            }
            // The writer is gone once its connection died; the item is moot.
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

impl Outbox for ChannelOutbox {
    fn deliver(&self, line: String) {
        self.push(Outgoing::Line(line));
    }

    fn close(&self) {
        self.push(Outgoing::Close);
    }
}

/// Write queued lines to `writer` until a [`Outgoing::Close`], a write
/// error, or every sender is dropped. Returns the number of lines written.
///
/// # Errors
///
/// Returns the first write or flush failure.
pub fn drain<W: Write>(rx: &Receiver<Outgoing>, writer: &mut W) -> io::Result<usize> {
    let mut written = 0;
    for item in rx {
        match item {
            Outgoing::Line(line) => {
                writer.write_all(line.as_bytes())?;
                writer.write_all(b"\n")?;
                writer.flush()?;
                written += 1;
            }
            Outgoing::Close => break,
        }
    }
    Ok(written)
}

/// Spawn the writer thread for one connection.
///
/// `on_close` runs once the queue is finished, whatever the reason; the TCP
/// layer uses it to shut the socket down so the reader unblocks.
///
/// # Errors
///
/// Returns an error if the thread cannot be spawned.
pub fn spawn_writer<W, F>(
    name: String,
    rx: Receiver<Outgoing>,
    mut writer: W,
    on_close: F,
) -> io::Result<JoinHandle<()>>
where
    W: Write + Send + 'static,
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new().name(name).spawn(move || {
        match drain(&rx, &mut writer) {
            Ok(lines) => debug!(lines, "writer finished"),
            Err(e) => debug!(error = %e, "writer stopped"),
        }
        on_close();
    })
}
