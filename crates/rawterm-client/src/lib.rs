//! # rawterm-client
//!
//! Client side of the rawterm suite: consumes server packets and drives a
//! [`rawterm_core::Display`], forwards host input, and issues remote
//! filesystem calls with synchronous request/response correlation.
//!
//! A client embeds this crate by implementing `Display` for its surface,
//! constructing a [`Client`] over any [`rawterm_core::Transport`], calling
//! [`Client::attach`], and pumping [`Client::run`] (or [`Client::next_event`]
//! for finer control).

pub mod events;
pub mod fs;
pub mod renderer;
pub mod ws;

pub use events::event_to_packet;
pub use fs::{FsCallError, FsClient, FsReply};
pub use renderer::{Client, ClientError, ClientOptions};
pub use ws::WsTransport;
