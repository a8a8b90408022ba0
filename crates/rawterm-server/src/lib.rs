//! # rawterm-server
//!
//! Server side of the rawterm suite: the authoritative terminal state with
//! run-length-compressed repaints, the session pump, and the host side of
//! the remote filesystem bridge.
//!
//! A server embeds this crate by constructing a [`ServerTerminal`], wrapping
//! it in a [`ServerSession`] over any [`rawterm_core::Transport`], and then
//! alternating between drawing through [`ServerSession::terminal_mut`] and
//! awaiting [`ServerSession::pull_event`].

pub mod fs;
pub mod session;
pub mod terminal;
pub mod ws;

pub use fs::{FsAttributes, FsDispatcher, FsError, HostFs, MemoryFs};
pub use session::{ServerConfig, ServerSession, SessionError, REPAINT_INTERVAL};
pub use terminal::{ServerTerminal, TerminalError, DEFAULT_PALETTE};
pub use ws::WsTransport;
