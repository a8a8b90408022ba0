//! Protocol module: framing, packet codec, and the byte-level helpers.
//!
//! # How a frame comes apart (for beginners)
//!
//! Everything on the wire is a textual **frame**:
//!
//! ```text
//! !CPC  0008  AQAeCA==  5A17B8C2  \n
//! magic hexlen base64   crc32    newline
//! ```
//!
//! 1. The `frame` sub-module strips the magic, length, and checksum and
//!    yields the base64-decoded **payload** octets.
//! 2. The `codec` sub-module turns payload octets into a typed [`Packet`]:
//!    a kind byte, a window id, and a kind-specific body.
//! 3. Kind-specific bodies use the `wire` primitives (little-endian integers,
//!    NUL-terminated strings), the `ibt` value encoding for custom event
//!    parameters, and run-length encoding for screen grids.
//!
//! The `capabilities` sub-module carries the flags negotiated by the kind-6
//! handshake; the frame layer consults them to pick the long frame form and
//! the checksum domain.
//!
//! [`Packet`]: messages::Packet

pub mod base64;
pub mod capabilities;
pub mod codec;
pub mod crc;
pub mod frame;
pub mod ibt;
pub mod messages;
pub mod wire;

pub use capabilities::Capabilities;
pub use codec::{decode_packet, encode_packet, ProtocolError};
pub use frame::{decode_frame, encode_frame, FrameError};
pub use ibt::IbtValue;
pub use messages::{Packet, PacketBody, PacketKind};
