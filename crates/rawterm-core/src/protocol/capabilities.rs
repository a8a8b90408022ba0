//! Negotiated per-transport capability flags.
//!
//! One [`Capabilities`] value lives for a transport's lifetime and is shared
//! (via `Arc`) between the handshake handler, the frame layer, and the packet
//! dispatchers.  Only the handshake handler ever writes to it, and every flag
//! is monotone — it can only turn on — so plain atomic loads/stores with
//! relaxed ordering are sufficient; no lock is needed.

use std::sync::atomic::{AtomicBool, Ordering};

/// The capability set negotiated by the kind-6 handshake.
#[derive(Debug, Default)]
pub struct Capabilities {
    /// True once any kind-6 packet has been observed on this transport.
    version_11: AtomicBool,
    /// Frame checksums cover the pre-base64 binary octets.
    binary_checksum: AtomicBool,
    /// Kinds 7–9 are recognized.
    filesystem: AtomicBool,
}

impl Capabilities {
    /// A fresh protocol-1.0 capability set with every flag off.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version_11(&self) -> bool {
        self.version_11.load(Ordering::Relaxed)
    }

    pub fn binary_checksum(&self) -> bool {
        self.binary_checksum.load(Ordering::Relaxed)
    }

    pub fn filesystem(&self) -> bool {
        self.filesystem.load(Ordering::Relaxed)
    }

    /// Marks the link as protocol 1.1 (long frames become legal).
    pub fn enable_version_11(&self) {
        self.version_11.store(true, Ordering::Relaxed);
    }

    pub fn enable_binary_checksum(&self) {
        self.binary_checksum.store(true, Ordering::Relaxed);
    }

    pub fn enable_filesystem(&self) {
        self.filesystem.store(true, Ordering::Relaxed);
    }
}
