//! One server session: a terminal, a transport, and the event pump.
//!
//! # The pump (for beginners)
//!
//! `pull_event` is the heart of the server.  It runs three concurrent
//! sources under `tokio::select!`:
//!
//! 1. **Transport frames** — decoded and dispatched: input packets become
//!    events, window-info closes mark the session closed, handshakes flip
//!    capability flags, filesystem packets go to the dispatcher.
//! 2. **Local host events** — whatever the embedder feeds in (its own
//!    keyboard, timers); pass `None` to suppress them.
//! 3. **The 50 ms repaint tick** — when the terminal is dirty, one kind-0
//!    packet is emitted and the dirty flag cleared, so bursts of drawing
//!    coalesce into a single repaint.
//!
//! `select!` cancels the losing branches at their next suspend point, which
//! is safe here: no branch holds partial decode state across an await.
//!
//! Frames that fail their checksum are dropped silently and reading
//! continues; a corrupt frame must never desynchronize the stream.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use rawterm_core::display::Display;
use rawterm_core::event::TermEvent;
use rawterm_core::keymap::KeyCode;
use rawterm_core::protocol::capabilities::Capabilities;
use rawterm_core::protocol::codec::{decode_packet, encode_packet, ProtocolError};
use rawterm_core::protocol::frame::{decode_frame, encode_frame, FrameError};
use rawterm_core::protocol::messages::{
    feature_bits, Handshake, MessageKind, MouseEventKind, Packet, PacketBody, WindowAction,
};
use rawterm_core::transport::{Transport, TransportError};

use crate::fs::{FsDispatcher, HostFs};
use crate::terminal::ServerTerminal;

/// How often dirty terminals are flushed to the wire.
pub const REPAINT_INTERVAL: Duration = Duration::from_millis(50);

/// Server-side configuration for one session.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Permit the remote filesystem (kinds 7–9) once the peer asks for it.
    pub allow_filesystem: bool,
    /// Switch frame checksums to the binary domain when the peer supports
    /// it.  Off by default: the reply always advertises support, but
    /// activation needs this explicit opt-in.
    pub binary_checksum: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            allow_filesystem: true,
            binary_checksum: false,
        }
    }
}

/// Errors from session I/O.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The transport reached end-of-stream; the session is permanently done.
    #[error("transport closed")]
    TransportClosed,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// A terminal session being served to one remote client.
pub struct ServerSession<T: Transport, F: HostFs> {
    transport: Arc<T>,
    caps: Arc<Capabilities>,
    config: ServerConfig,
    terminal: ServerTerminal,
    fs: Option<FsDispatcher<F>>,
    /// Optional local mirror; repainted whenever the wire is.
    parent: Option<Box<dyn Display>>,
}

impl<T: Transport, F: HostFs> ServerSession<T, F> {
    pub fn new(transport: Arc<T>, terminal: ServerTerminal, config: ServerConfig) -> Self {
        Self {
            transport,
            caps: Arc::new(Capabilities::new()),
            config,
            terminal,
            fs: None,
            parent: None,
        }
    }

    /// Mounts a host filesystem; without one, filesystem requests are
    /// ignored even when `allow_filesystem` is set.
    pub fn with_filesystem(mut self, host: F) -> Self {
        self.fs = Some(FsDispatcher::new(host));
        self
    }

    /// Attaches a local display that mirrors every repaint.
    pub fn with_parent(mut self, parent: Box<dyn Display>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn capabilities(&self) -> Arc<Capabilities> {
        Arc::clone(&self.caps)
    }

    pub fn terminal(&self) -> &ServerTerminal {
        &self.terminal
    }

    /// The drawing surface; mutations are picked up by the next repaint
    /// tick.
    pub fn terminal_mut(&mut self) -> &mut ServerTerminal {
        &mut self.terminal
    }

    /// The feature bits this server advertises: binary-checksum support is
    /// always claimed, filesystem support when it is actually available.
    fn supported_features(&self) -> u16 {
        let mut features = feature_bits::BINARY_CHECKSUM;
        if self.config.allow_filesystem && self.fs.is_some() {
            features |= feature_bits::FILESYSTEM;
        }
        features
    }

    /// Announces the session: handshake, window info, and the initial
    /// repaint.
    pub async fn attach(&mut self) -> Result<(), SessionError> {
        let handshake = Packet {
            window: self.terminal.window(),
            body: PacketBody::Handshake(Handshake {
                features: self.supported_features(),
            }),
        };
        self.send_packet(&handshake).await?;
        self.send_packet(&self.terminal.window_info_packet(WindowAction::Update))
            .await?;
        self.flush_repaint().await
    }

    /// Encodes and sends one packet under the current capabilities.
    pub async fn send_packet(&self, packet: &Packet) -> Result<(), SessionError> {
        let payload = encode_packet(packet)?;
        let frame = encode_frame(&payload, &self.caps)?;
        self.transport.send(&frame).await?;
        Ok(())
    }

    /// Emits a repaint now if the terminal is dirty, and mirrors it to the
    /// parent display.
    pub async fn flush_repaint(&mut self) -> Result<(), SessionError> {
        if let Some(packet) = self.terminal.render_screen_packet() {
            self.send_packet(&packet).await?;
            if let Some(parent) = self.parent.as_mut() {
                self.terminal.mirror_to(parent.as_mut());
            }
        }
        Ok(())
    }

    /// Sends a kind-5 message to the client.
    pub async fn show_message(
        &self,
        kind: MessageKind,
        title: &str,
        body: &str,
    ) -> Result<(), SessionError> {
        self.send_packet(&self.terminal.message_packet(kind, title, body))
            .await
    }

    /// Resizes locally and announces the new dimensions.
    pub async fn resize(&mut self, width: u16, height: u16) -> Result<(), SessionError> {
        self.terminal.resize(width, height);
        self.send_packet(&self.terminal.window_info_packet(WindowAction::Update))
            .await
    }

    /// Retitles locally and announces the new title.
    pub async fn set_title(&mut self, title: &str) -> Result<(), SessionError> {
        self.terminal.set_title(title);
        self.send_packet(&self.terminal.window_info_packet(WindowAction::Update))
            .await
    }

    /// Closes the window: `keep_alive` keeps the transport open for another
    /// window, otherwise the connection is torn down too.
    pub async fn close(&mut self, keep_alive: bool) -> Result<(), SessionError> {
        let action = if keep_alive {
            WindowAction::CloseKeepAlive
        } else {
            WindowAction::CloseTearDown
        };
        self.send_packet(&self.terminal.window_info_packet(action))
            .await?;
        self.terminal.mark_closed();
        if !keep_alive {
            self.transport.close().await;
        }
        Ok(())
    }

    /// Waits for the next event, racing the transport against the local
    /// source and servicing the repaint tick in between.
    ///
    /// `filter` keeps only events with that name (others are discarded, as
    /// hosted programs expect).  Pass `local: None` to suppress local
    /// events entirely.
    ///
    /// # Errors
    ///
    /// [`SessionError::TransportClosed`] once the peer is gone; the session
    /// must not be pumped again after that.
    pub async fn pull_event(
        &mut self,
        mut local: Option<&mut mpsc::Receiver<TermEvent>>,
        filter: Option<&str>,
    ) -> Result<TermEvent, SessionError> {
        if self.terminal.is_closed() {
            return Err(SessionError::TransportClosed);
        }
        let transport = Arc::clone(&self.transport);
        let mut repaint = tokio::time::interval(REPAINT_INTERVAL);
        repaint.tick().await; // the first tick fires immediately; skip it

        // One pump turn: whichever source wins the race.  The losing
        // futures are dropped by select! before the outcome is handled, so
        // the handling below is free to borrow the session mutably.
        enum Turn {
            Frame(Option<Vec<u8>>),
            Local(Option<TermEvent>),
            Repaint,
        }

        loop {
            let turn = tokio::select! {
                frame = transport.receive() => Turn::Frame(frame),
                event = async {
                    match local.as_mut() {
                        Some(rx) => rx.recv().await,
                        None => std::future::pending().await,
                    }
                } => Turn::Local(event),
                _ = repaint.tick() => Turn::Repaint,
            };

            let event = match turn {
                Turn::Frame(None) => {
                    self.terminal.mark_closed();
                    return Err(SessionError::TransportClosed);
                }
                Turn::Frame(Some(frame)) => self.handle_frame(&frame).await?,
                Turn::Local(None) => {
                    // A closed local channel just mutes that branch.
                    local = None;
                    None
                }
                Turn::Local(Some(event)) => Some(event),
                Turn::Repaint => {
                    self.flush_repaint().await?;
                    None
                }
            };

            if let Some(event) = event {
                if filter.map_or(true, |name| event.name() == name) {
                    return Ok(event);
                }
                trace!(event = event.name(), "event discarded by filter");
            }
        }
    }

    /// Decodes one frame and dispatches its packet.  Returns an event when
    /// the packet surfaces one.
    async fn handle_frame(&mut self, frame: &[u8]) -> Result<Option<TermEvent>, SessionError> {
        let payload = match decode_frame(frame, &self.caps) {
            Ok(payload) => payload,
            Err(FrameError::ChecksumMismatch { expected, found }) => {
                debug!(expected, found, "dropping frame with bad checksum");
                return Ok(None);
            }
            Err(e) => {
                debug!(error = %e, "dropping unparseable frame");
                return Ok(None);
            }
        };
        let packet = match decode_packet(&payload) {
            Ok(packet) => packet,
            Err(ProtocolError::UnknownKind(kind)) => {
                debug!(kind, "ignoring unknown packet kind");
                return Ok(None);
            }
            Err(e) => {
                warn!(error = %e, "ignoring malformed packet");
                return Ok(None);
            }
        };
        self.handle_packet(packet).await
    }

    async fn handle_packet(&mut self, packet: Packet) -> Result<Option<TermEvent>, SessionError> {
        let window = packet.window;
        let kind = packet.body.kind();
        match packet.body {
            PacketBody::KeyInput(input) => {
                if input.flags.is_char() {
                    // The code byte IS the character; it never passes
                    // through the scancode table.
                    return Ok(Some(TermEvent::Char(input.code as char)));
                }
                let Some(code) = KeyCode::from_code(input.code) else {
                    debug!(code = input.code, "ignoring unassigned key code");
                    return Ok(None);
                };
                Ok(Some(if input.flags.key_up() {
                    TermEvent::KeyUp { code }
                } else {
                    TermEvent::Key {
                        code,
                        held: input.flags.held(),
                    }
                }))
            }
            PacketBody::MouseInput(input) => Ok(Some(match input.kind {
                MouseEventKind::Click => TermEvent::MouseClick {
                    button: input.button,
                    x: input.x,
                    y: input.y,
                },
                MouseEventKind::Up => TermEvent::MouseUp {
                    button: input.button,
                    x: input.x,
                    y: input.y,
                },
                MouseEventKind::Scroll => TermEvent::MouseScroll {
                    direction: if input.button == 0 { -1 } else { 1 },
                    x: input.x,
                    y: input.y,
                },
                MouseEventKind::Drag => TermEvent::MouseDrag {
                    button: input.button,
                    x: input.x,
                    y: input.y,
                },
            })),
            PacketBody::EventQueue(event) => Ok(Some(TermEvent::Custom {
                name: event.name,
                params: event.params,
            })),
            PacketBody::WindowInfo(info) => match info.action {
                WindowAction::Update => {
                    if info.width > 0 && info.height > 0 {
                        self.terminal.resize(info.width, info.height);
                        return Ok(Some(TermEvent::Resize { window }));
                    }
                    Ok(None)
                }
                WindowAction::CloseKeepAlive | WindowAction::CloseTearDown => {
                    self.terminal.mark_closed();
                    if info.action == WindowAction::CloseTearDown {
                        self.transport.close().await;
                    }
                    Ok(Some(TermEvent::WindowClosed { window }))
                }
            },
            PacketBody::Handshake(handshake) => {
                self.handle_handshake(handshake).await?;
                Ok(None)
            }
            PacketBody::FsRequest(request) => {
                if !self.caps.filesystem() {
                    debug!("filesystem request before the capability was negotiated");
                    return Ok(None);
                }
                if let Some(fs) = self.fs.as_mut() {
                    let response = fs.handle_request(window, &request);
                    self.send_packet(&response).await?;
                }
                Ok(None)
            }
            PacketBody::FsData(data) => {
                if !self.caps.filesystem() {
                    return Ok(None);
                }
                let confirm = self
                    .fs
                    .as_mut()
                    .and_then(|fs| fs.handle_data(window, &data));
                if let Some(confirm) = confirm {
                    self.send_packet(&confirm).await?;
                }
                Ok(None)
            }
            PacketBody::ScreenUpdate(_) | PacketBody::ServerMessage(_)
            | PacketBody::FsResponse(_) => {
                debug!(?kind, "ignoring client-bound packet");
                Ok(None)
            }
        }
    }

    /// Applies the peer's feature bits and replies with our own.
    async fn handle_handshake(&mut self, handshake: Handshake) -> Result<(), SessionError> {
        self.caps.enable_version_11();
        let peer = handshake.features;
        if peer & feature_bits::BINARY_CHECKSUM != 0 && self.config.binary_checksum {
            self.caps.enable_binary_checksum();
        }
        if peer & feature_bits::FILESYSTEM != 0
            && self.config.allow_filesystem
            && self.fs.is_some()
        {
            self.caps.enable_filesystem();
        }

        let reply = Packet {
            window: self.terminal.window(),
            body: PacketBody::Handshake(Handshake {
                features: self.supported_features(),
            }),
        };
        self.send_packet(&reply).await?;

        if peer & feature_bits::SEND_WINDOW_INFO != 0 {
            self.send_packet(&self.terminal.window_info_packet(WindowAction::Update))
                .await?;
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
