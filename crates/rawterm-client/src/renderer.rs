//! The client: screen renderer, input forwarder, and receive pump.
//!
//! A [`Client`] consumes server packets and drives a [`Display`]: kind-0
//! repaints are replayed row by row, kind-4 retitles or closes, kind-5
//! surfaces messages, kind-6 completes the handshake, kind-8/9 complete
//! filesystem calls.  Host input flows the other way through
//! [`Client::queue_event`].
//!
//! # Repaint replay order
//!
//! A repaint hides the display first and shows it last, so a slow display
//! never tears: mode, clear, rows, palette, cursor, blink, visible.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use rawterm_core::display::Display;
use rawterm_core::event::TermEvent;
use rawterm_core::protocol::capabilities::Capabilities;
use rawterm_core::protocol::codec::{decode_packet, encode_packet, ProtocolError};
use rawterm_core::protocol::frame::{decode_frame, encode_frame, FrameError};
use rawterm_core::protocol::messages::{
    feature_bits, Handshake, Packet, PacketBody, ScreenContents, ScreenUpdate, WindowAction,
    WindowId, WindowInfo,
};
use rawterm_core::transport::{Transport, TransportError};

use crate::events::event_to_packet;
use crate::fs::{FsClient, FsReply};

/// Client-side feature configuration, turned into handshake bits.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Offer the remote filesystem capability.
    pub request_filesystem: bool,
    /// Offer binary-domain checksums and activate them if the server
    /// confirms.
    pub binary_checksum: bool,
    /// Ask the server for an immediate window-info packet on handshake.
    pub request_window_info: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_filesystem: true,
            binary_checksum: false,
            request_window_info: true,
        }
    }
}

/// Errors from client I/O.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The transport reached end-of-stream.
    #[error("transport closed")]
    TransportClosed,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// A raw-mode client bound to one window and one display.
pub struct Client<T: Transport, D: Display> {
    transport: Arc<T>,
    caps: Arc<Capabilities>,
    options: ClientOptions,
    display: D,
    window: WindowId,
    fs: FsClient<T>,
    closed: bool,
}

impl<T: Transport, D: Display> Client<T, D> {
    pub fn new(transport: Arc<T>, display: D, window: WindowId, options: ClientOptions) -> Self {
        let caps = Arc::new(Capabilities::new());
        let fs = FsClient::new(Arc::clone(&transport), Arc::clone(&caps), window);
        Self {
            transport,
            caps,
            options,
            display,
            window,
            fs,
            closed: false,
        }
    }

    pub fn capabilities(&self) -> Arc<Capabilities> {
        Arc::clone(&self.caps)
    }

    /// A filesystem handle sharing this client's pending-call table.
    pub fn fs(&self) -> FsClient<T> {
        self.fs.clone()
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn offered_features(&self) -> u16 {
        let mut features = 0;
        if self.options.binary_checksum {
            features |= feature_bits::BINARY_CHECKSUM;
        }
        if self.options.request_filesystem {
            features |= feature_bits::FILESYSTEM;
        }
        if self.options.request_window_info {
            features |= feature_bits::SEND_WINDOW_INFO;
        }
        features
    }

    /// Opens the session by offering this client's feature bits.
    pub async fn attach(&self) -> Result<(), ClientError> {
        self.send_packet(&Packet {
            window: self.window,
            body: PacketBody::Handshake(Handshake {
                features: self.offered_features(),
            }),
        })
        .await
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), ClientError> {
        let payload = encode_packet(packet)?;
        let frame = encode_frame(&payload, &self.caps)?;
        self.transport.send(&frame).await?;
        Ok(())
    }

    /// Serializes a host event onto the wire.  Resizes are built from the
    /// display's own dimensions.
    pub async fn queue_event(&self, event: &TermEvent) -> Result<(), ClientError> {
        if let TermEvent::Resize { window } = event {
            let (width, height) = self.display.size();
            return self
                .send_packet(&Packet {
                    window: *window,
                    body: PacketBody::WindowInfo(WindowInfo {
                        action: WindowAction::Update,
                        secondary_id: 0,
                        width,
                        height,
                        title: String::new(),
                    }),
                })
                .await;
        }
        match event_to_packet(self.window, event) {
            Some(packet) => self.send_packet(&packet).await,
            None => Ok(()),
        }
    }

    /// Asks the server to close the window; `keep_alive` keeps the
    /// transport usable for other windows.
    pub async fn close(&mut self, keep_alive: bool) -> Result<(), ClientError> {
        let action = if keep_alive {
            WindowAction::CloseKeepAlive
        } else {
            WindowAction::CloseTearDown
        };
        self.send_packet(&Packet {
            window: self.window,
            body: PacketBody::WindowInfo(WindowInfo {
                action,
                secondary_id: 0,
                width: 0,
                height: 0,
                title: String::new(),
            }),
        })
        .await?;
        self.closed = true;
        if !keep_alive {
            self.transport.close().await;
        }
        Ok(())
    }

    /// Waits for the next surfaced event, forwarding host input in the
    /// background of the same race.  Most server packets (repaints,
    /// handshakes, filesystem responses) are absorbed silently; closes,
    /// messages, and resizes surface.
    pub async fn next_event(
        &mut self,
        mut host: Option<&mut mpsc::Receiver<TermEvent>>,
    ) -> Result<TermEvent, ClientError> {
        if self.closed {
            return Err(ClientError::TransportClosed);
        }
        let transport = Arc::clone(&self.transport);

        enum Turn {
            Frame(Option<Vec<u8>>),
            Host(Option<TermEvent>),
        }

        loop {
            let turn = tokio::select! {
                frame = transport.receive() => Turn::Frame(frame),
                event = async {
                    match host.as_mut() {
                        Some(rx) => rx.recv().await,
                        None => std::future::pending().await,
                    }
                } => Turn::Host(event),
            };

            match turn {
                Turn::Frame(None) => {
                    self.closed = true;
                    self.fs.fail_all();
                    return Err(ClientError::TransportClosed);
                }
                Turn::Frame(Some(frame)) => {
                    if let Some(event) = self.handle_frame(&frame).await? {
                        return Ok(event);
                    }
                }
                Turn::Host(None) => host = None,
                Turn::Host(Some(event)) => self.queue_event(&event).await?,
            }
        }
    }

    /// Pumps until the window closes or the transport ends.
    pub async fn run(
        &mut self,
        mut host: Option<&mut mpsc::Receiver<TermEvent>>,
    ) -> Result<(), ClientError> {
        loop {
            let host_ref = host.as_mut().map(|rx| &mut **rx);
            match self.next_event(host_ref).await {
                Ok(TermEvent::WindowClosed { .. }) => return Ok(()),
                Ok(event) => trace!(event = event.name(), "client event"),
                Err(ClientError::TransportClosed) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    /// Decodes one frame and applies its packet.
    pub async fn handle_frame(&mut self, frame: &[u8]) -> Result<Option<TermEvent>, ClientError> {
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

    async fn handle_packet(&mut self, packet: Packet) -> Result<Option<TermEvent>, ClientError> {
        let kind = packet.body.kind();
        match packet.body {
            PacketBody::ScreenUpdate(update) => {
                if packet.window == self.window {
                    self.apply_screen(&update);
                } else {
                    trace!(window = packet.window, "repaint for a window we do not own");
                }
                Ok(None)
            }
            PacketBody::WindowInfo(info) => {
                if packet.window != self.window {
                    self.display.window_notification(packet.window);
                    return Ok(None);
                }
                match info.action {
                    WindowAction::Update => {
                        if !info.title.is_empty() {
                            self.display.set_title(&info.title);
                        }
                        if info.width > 0 && info.height > 0 {
                            return Ok(Some(TermEvent::Resize {
                                window: packet.window,
                            }));
                        }
                        Ok(None)
                    }
                    WindowAction::CloseKeepAlive | WindowAction::CloseTearDown => {
                        self.closed = true;
                        self.fs.fail_all();
                        if info.action == WindowAction::CloseTearDown {
                            self.transport.close().await;
                        }
                        Ok(Some(TermEvent::WindowClosed {
                            window: packet.window,
                        }))
                    }
                }
            }
            PacketBody::ServerMessage(message) => {
                let Some(level) = message.kind() else {
                    debug!(flags = message.flags, "message with no severity bit");
                    return Ok(None);
                };
                self.display
                    .show_message(level, &message.title, &message.body);
                Ok(Some(TermEvent::Message {
                    kind: level,
                    title: message.title,
                    body: message.body,
                }))
            }
            PacketBody::Handshake(handshake) => {
                self.handle_handshake(handshake).await?;
                Ok(None)
            }
            PacketBody::FsResponse(response) => {
                self.fs.complete(response.req_id, FsReply::Response(response));
                Ok(None)
            }
            PacketBody::FsData(data) => {
                self.fs.complete(data.req_id, FsReply::Data(data));
                Ok(None)
            }
            PacketBody::KeyInput(_) | PacketBody::MouseInput(_) | PacketBody::EventQueue(_)
            | PacketBody::FsRequest(_) => {
                debug!(?kind, "ignoring server-bound packet");
                Ok(None)
            }
        }
    }

    async fn handle_handshake(&mut self, handshake: Handshake) -> Result<(), ClientError> {
        self.caps.enable_version_11();
        let confirmed = handshake.features;
        if confirmed & feature_bits::BINARY_CHECKSUM != 0 && self.options.binary_checksum {
            self.caps.enable_binary_checksum();
        }
        if confirmed & feature_bits::FILESYSTEM != 0 && self.options.request_filesystem {
            self.caps.enable_filesystem();
        }
        if confirmed & feature_bits::SEND_WINDOW_INFO != 0 {
            let (width, height) = self.display.size();
            self.send_packet(&Packet {
                window: self.window,
                body: PacketBody::WindowInfo(WindowInfo {
                    action: WindowAction::Update,
                    secondary_id: 0,
                    width,
                    height,
                    title: String::new(),
                }),
            })
            .await?;
        }
        Ok(())
    }

    /// Replays a kind-0 repaint onto the display.
    fn apply_screen(&mut self, update: &ScreenUpdate) {
        self.display.set_visible(false);
        self.display.set_mode(update.mode);
        self.display.clear();
        match &update.contents {
            ScreenContents::Text { chars, colors } => {
                let width = update.width as usize;
                for y in 0..update.height as usize {
                    let row = y * width;
                    self.display.blit_line(
                        y as u16 + 1,
                        &chars[row..row + width],
                        &colors[row..row + width],
                    );
                }
            }
            ScreenContents::Pixels(pixels) => {
                let width = update.width as usize * 6;
                for y in 0..update.height as usize * 9 {
                    let row = y * width;
                    self.display
                        .blit_pixel_row(y as u32 + 1, &pixels[row..row + width]);
                }
            }
        }
        for (index, &color) in update.palette.iter().enumerate() {
            self.display.set_palette_entry(index as u8, color);
        }
        self.display.set_cursor(update.cursor_x, update.cursor_y);
        self.display.set_cursor_blink(update.blink);
        self.display.set_visible(true);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
