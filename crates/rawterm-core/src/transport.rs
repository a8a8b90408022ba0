//! The transport seam: one frame in, one frame out.
//!
//! The protocol core never assumes a medium.  Anything that can deliver
//! whole frames in order — a WebSocket, a message bus, an in-process channel
//! — implements [`Transport`], and everything above it (sessions, renderers,
//! the filesystem bridge) is written against the trait.
//!
//! [`ChannelTransport`] is the in-process implementation: a cross-wired pair
//! of tokio channels.  It doubles as the loopback used throughout the test
//! suites.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

/// Errors surfaced by [`Transport::send`].
#[derive(Debug, Error, PartialEq)]
pub enum TransportError {
    /// The transport is closed; no further I/O will succeed.
    #[error("transport closed")]
    Closed,

    /// A medium-specific failure.
    #[error("transport failure: {0}")]
    Other(String),
}

/// A reliable, ordered, message-at-a-time pipe carrying whole frames.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Delivers a single frame verbatim.
    async fn send(&self, frame: &[u8]) -> Result<(), TransportError>;

    /// Receives the next frame, or `None` at end-of-stream.
    ///
    /// `None` is terminal: once returned, the transport never yields frames
    /// again and callers must stop reading.
    async fn receive(&self) -> Option<Vec<u8>>;

    /// Closes the transport.  Idempotent.
    async fn close(&self);
}

/// In-process transport over a pair of tokio channels.
pub struct ChannelTransport {
    tx: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    rx: Mutex<mpsc::Receiver<Vec<u8>>>,
}

impl ChannelTransport {
    /// Channel depth; sends beyond this backpressure the sender.
    const DEPTH: usize = 64;

    /// Creates a cross-wired pair: frames sent on one end arrive on the
    /// other.
    pub fn pair() -> (ChannelTransport, ChannelTransport) {
        let (a_tx, a_rx) = mpsc::channel(Self::DEPTH);
        let (b_tx, b_rx) = mpsc::channel(Self::DEPTH);
        (
            ChannelTransport {
                tx: Mutex::new(Some(a_tx)),
                rx: Mutex::new(b_rx),
            },
            ChannelTransport {
                tx: Mutex::new(Some(b_tx)),
                rx: Mutex::new(a_rx),
            },
        )
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        let guard = self.tx.lock().await;
        let tx = guard.as_ref().ok_or(TransportError::Closed)?;
        tx.send(frame.to_vec())
            .await
            .map_err(|_| TransportError::Closed)
    }

    async fn receive(&self) -> Option<Vec<u8>> {
        self.rx.lock().await.recv().await
    }

    async fn close(&self) {
        // Dropping the sender ends the peer's receive stream.
        self.tx.lock().await.take();
        self.rx.lock().await.close();
    }
}
