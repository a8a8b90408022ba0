//! # rawterm-core
//!
//! Shared protocol core for the rawterm remote-terminal suite: the textual
//! frame layer, the packet codec for all ten packet kinds, the key map, the
//! capability handshake, and the seams (`Transport`, `Display`) that the
//! server and client crates build on.
//!
//! This crate has no opinion about the medium (WebSocket, message bus,
//! in-process channel) or the concrete display; it is used by both
//! `rawterm-server` and `rawterm-client` and contains no OS-specific code.
//!
//! # Architecture overview (for beginners)
//!
//! Raw mode multiplexes interactive terminal sessions over any reliable
//! message pipe.  A **server** owns the real terminal state — a character
//! grid, an optional pixel grid, a palette, a cursor — and streams compressed
//! repaints to a **client**, which replays them onto a local display.  The
//! client streams keyboard and mouse input back.  After a version handshake
//! the same pipe can also carry remote filesystem traffic.
//!
//! This crate defines:
//!
//! - **`protocol`** – How bytes travel: textual frames with a CRC-32
//!   trailer, base64 payloads, and the binary packet bodies inside them.
//! - **`keymap`** – The wire key-code space and its mapping to named keys
//!   and characters.
//! - **`event`** – The canonical event type both endpoints exchange.
//! - **`transport` / `display`** – The two seams implemented by embedders.

pub mod display;
pub mod event;
pub mod keymap;
pub mod protocol;
pub mod transport;

pub use display::{Display, DisplayCall, RecordingDisplay};
pub use event::TermEvent;
pub use keymap::KeyCode;
pub use protocol::capabilities::Capabilities;
pub use protocol::codec::{decode_packet, encode_packet, ProtocolError};
pub use protocol::frame::{decode_frame, encode_frame, FrameError};
pub use protocol::ibt::IbtValue;
pub use protocol::messages::{Packet, PacketBody, PacketKind, WindowId};
pub use transport::{ChannelTransport, Transport, TransportError};
