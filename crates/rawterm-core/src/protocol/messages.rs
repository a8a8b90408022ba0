//! All raw-mode packet types.
//!
//! A frame's base64 payload decodes to `[kind: u8][window: u8][body...]`.
//! Ten packet kinds are defined; this module holds the typed representation
//! of each body, the flag-bit constants, and the discriminant enums.  The
//! binary layout itself lives in [`super::codec`].
//!
//! # Packet kinds at a glance (for beginners)
//!
//! | Kind | Direction | Purpose |
//! |------|-----------|---------|
//! | 0    | S→C  | Full screen repaint (RLE-compressed grids + palette) |
//! | 1    | C→S  | Keyboard input (key, key-up, or character) |
//! | 2    | C→S  | Mouse input (click/up/scroll/drag) |
//! | 3    | C→S  | Custom named event with IBT-encoded parameters |
//! | 4    | both | Window metadata: resize, retitle, or close |
//! | 5    | S→C  | Out-of-band message (error/warning/info popup) |
//! | 6    | both | Version handshake and feature negotiation |
//! | 7    | C→S  | Remote filesystem request |
//! | 8    | S→C  | Remote filesystem response |
//! | 9    | both | Remote file contents (read result or write commit) |

use serde::{Deserialize, Serialize};

use super::ibt::IbtValue;

/// Identifies one virtual terminal multiplexed on a transport.
pub type WindowId = u8;

// ── Packet kind discriminants ─────────────────────────────────────────────────

/// The ten defined packet kinds; the first byte of every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum PacketKind {
    ScreenUpdate = 0,
    KeyInput = 1,
    MouseInput = 2,
    EventQueue = 3,
    WindowInfo = 4,
    ServerMessage = 5,
    Handshake = 6,
    FsRequest = 7,
    FsResponse = 8,
    FsData = 9,
}

impl TryFrom<u8> for PacketKind {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0 => Ok(PacketKind::ScreenUpdate),
            1 => Ok(PacketKind::KeyInput),
            2 => Ok(PacketKind::MouseInput),
            3 => Ok(PacketKind::EventQueue),
            4 => Ok(PacketKind::WindowInfo),
            5 => Ok(PacketKind::ServerMessage),
            6 => Ok(PacketKind::Handshake),
            7 => Ok(PacketKind::FsRequest),
            8 => Ok(PacketKind::FsResponse),
            9 => Ok(PacketKind::FsData),
            _ => Err(()),
        }
    }
}

// ── Feature bits (kind 6) ─────────────────────────────────────────────────────

/// Feature bits carried in the kind-6 handshake.
pub mod feature_bits {
    /// Peer supports CRC-32 over the pre-base64 binary octets.
    pub const BINARY_CHECKSUM: u16 = 0x01;
    /// Peer supports the remote filesystem packets (kinds 7–9).
    pub const FILESYSTEM: u16 = 0x02;
    /// Peer requests an immediate kind-4 window-info packet.
    pub const SEND_WINDOW_INFO: u16 = 0x04;
}

// ── Rendering mode ────────────────────────────────────────────────────────────

/// Terminal rendering mode: character grid or pixel grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RenderMode {
    /// Character cells with packed 4-bit foreground/background colors.
    Text = 0,
    /// Pixel grid limited to the 16-color palette.
    Pixel16 = 1,
    /// Pixel grid with the full 256-entry palette.
    Pixel256 = 2,
}

impl RenderMode {
    /// Returns `true` for the two pixel-grid modes.
    pub fn is_pixel(self) -> bool {
        !matches!(self, RenderMode::Text)
    }

    /// Number of palette entries serialized in a kind-0 packet for this mode.
    pub fn palette_len(self) -> usize {
        match self {
            RenderMode::Text | RenderMode::Pixel16 => 16,
            RenderMode::Pixel256 => 256,
        }
    }
}

impl TryFrom<u8> for RenderMode {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0 => Ok(RenderMode::Text),
            1 => Ok(RenderMode::Pixel16),
            2 => Ok(RenderMode::Pixel256),
            _ => Err(()),
        }
    }
}

/// Each character cell is 6×9 pixels in the pixel modes.
pub const CELL_WIDTH_PX: u32 = 6;
/// See [`CELL_WIDTH_PX`].
pub const CELL_HEIGHT_PX: u32 = 9;

// ── Kind 0: screen update ─────────────────────────────────────────────────────

/// One palette entry as serialized on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rgb8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb8 {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// The grids carried by a screen update, flattened row-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScreenContents {
    /// Text mode: `width × height` characters and packed color bytes.
    Text { chars: Vec<u8>, colors: Vec<u8> },
    /// Pixel modes: `(width·6) × (height·9)` palette indices.
    Pixels(Vec<u8>),
}

/// Kind 0: a full repaint of one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenUpdate {
    pub mode: RenderMode,
    pub blink: bool,
    /// Size in character cells.
    pub width: u16,
    pub height: u16,
    /// 1-indexed cursor position; may lie outside the visible grid.
    pub cursor_x: i32,
    pub cursor_y: i32,
    pub grayscale: bool,
    pub contents: ScreenContents,
    /// 16 entries in text/pixel-16 mode, 256 in pixel-256 mode.
    pub palette: Vec<Rgb8>,
}

// ── Kind 1: keyboard input ────────────────────────────────────────────────────

/// Flag bits attached to a key packet.
///
/// Bit 0: key-up event.  Bit 1: held/repeat.  Bit 3: the code byte is the
/// UTF-8 character byte value, not a scancode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyFlags(pub u8);

impl KeyFlags {
    pub const KEY_UP: u8 = 1 << 0;
    pub const HELD: u8 = 1 << 1;
    pub const IS_CHAR: u8 = 1 << 3;

    pub fn key_up(self) -> bool {
        self.0 & Self::KEY_UP != 0
    }

    pub fn held(self) -> bool {
        self.0 & Self::HELD != 0
    }

    pub fn is_char(self) -> bool {
        self.0 & Self::IS_CHAR != 0
    }
}

/// Kind 1: one keyboard event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInput {
    /// Wire scancode, or the UTF-8 character byte value when
    /// [`KeyFlags::is_char`] is set.
    pub code: u8,
    pub flags: KeyFlags,
}

// ── Kind 2: mouse input ───────────────────────────────────────────────────────

/// Mouse event discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MouseEventKind {
    Click = 0,
    Up = 1,
    Scroll = 2,
    Drag = 3,
}

impl TryFrom<u8> for MouseEventKind {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0 => Ok(MouseEventKind::Click),
            1 => Ok(MouseEventKind::Up),
            2 => Ok(MouseEventKind::Scroll),
            3 => Ok(MouseEventKind::Drag),
            _ => Err(()),
        }
    }
}

/// Kind 2: one mouse event.
///
/// For [`MouseEventKind::Scroll`], `button` is 0 for scroll-up and 1 for
/// scroll-down; receivers map it to a −1/+1 direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseInput {
    pub kind: MouseEventKind,
    pub button: u8,
    pub x: u32,
    pub y: u32,
}

// ── Kind 3: custom event ──────────────────────────────────────────────────────

/// Kind 3: a named event with dynamically-typed parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventQueue {
    pub name: String,
    pub params: Vec<IbtValue>,
}

// ── Kind 4: window info ───────────────────────────────────────────────────────

/// What a kind-4 packet asks the receiver to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum WindowAction {
    /// Metadata update; resizes when width and height are nonzero.
    Update = 0,
    /// Close the window but keep the connection alive.
    CloseKeepAlive = 1,
    /// Close the window and tear the connection down.
    CloseTearDown = 2,
}

impl TryFrom<u8> for WindowAction {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0 => Ok(WindowAction::Update),
            1 => Ok(WindowAction::CloseKeepAlive),
            2 => Ok(WindowAction::CloseTearDown),
            _ => Err(()),
        }
    }
}

/// Kind 4: window metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub action: WindowAction,
    /// The computer identifier modulo 256, or zero for a monitor.
    pub secondary_id: u8,
    pub width: u16,
    pub height: u16,
    pub title: String,
}

// ── Kind 5: server message ────────────────────────────────────────────────────

/// Severity of a kind-5 message, from its flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    Error,
    Warning,
    Info,
}

impl MessageKind {
    /// The flag bit for this severity.
    pub fn flag(self) -> u32 {
        match self {
            MessageKind::Error => 0x10,
            MessageKind::Warning => 0x20,
            MessageKind::Info => 0x40,
        }
    }

    /// Extracts the severity from a kind-5 flags word, highest-severity
    /// bit first.
    pub fn from_flags(flags: u32) -> Option<Self> {
        if flags & 0x10 != 0 {
            Some(MessageKind::Error)
        } else if flags & 0x20 != 0 {
            Some(MessageKind::Warning)
        } else if flags & 0x40 != 0 {
            Some(MessageKind::Info)
        } else {
            None
        }
    }
}

/// Kind 5: an out-of-band message from the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMessage {
    pub flags: u32,
    pub title: String,
    pub body: String,
}

impl ServerMessage {
    pub fn kind(&self) -> Option<MessageKind> {
        MessageKind::from_flags(self.flags)
    }
}

// ── Kind 6: handshake ─────────────────────────────────────────────────────────

/// Kind 6: the version/feature handshake.  Observing one at all upgrades the
/// link to protocol 1.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    pub features: u16,
}

// ── Kinds 7–9: remote filesystem ──────────────────────────────────────────────

/// File open mode: the low three bits of an open op code (`16..=23`).
///
/// The mode table is `{r, w, r, a, rb, wb, rb, ab}`; bit 0 distinguishes the
/// write class (`w`/`a`/`wb`/`ab`) from the read class, bit 2 the binary
/// variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenMode(pub u8);

impl OpenMode {
    pub const READ: OpenMode = OpenMode(0);
    pub const WRITE: OpenMode = OpenMode(1);
    pub const APPEND: OpenMode = OpenMode(3);
    pub const READ_BINARY: OpenMode = OpenMode(4);
    pub const WRITE_BINARY: OpenMode = OpenMode(5);
    pub const APPEND_BINARY: OpenMode = OpenMode(7);

    /// Builds a mode from the low three bits of an op byte.
    pub fn from_bits(bits: u8) -> Self {
        OpenMode(bits & 0x07)
    }

    /// `w`, `a`, `wb`, `ab` — modes that create a server-side write handle.
    pub fn is_write_class(self) -> bool {
        self.0 & 0x01 != 0
    }

    /// `a` and `ab`.
    pub fn is_append(self) -> bool {
        self.0 & 0x03 == 0x03
    }

    /// `rb`, `wb`, `ab`.
    pub fn is_binary(self) -> bool {
        self.0 & 0x04 != 0
    }

    /// The classic mode string for this mode.
    pub fn as_str(self) -> &'static str {
        match self.0 & 0x07 {
            0 | 2 => "r",
            1 => "w",
            3 => "a",
            4 | 6 => "rb",
            5 => "wb",
            _ => "ab",
        }
    }

    /// The op byte for a kind-7 open request using this mode.
    pub fn op_code(self) -> u8 {
        0x10 | self.0
    }
}

/// One remote filesystem operation, as requested by a kind-7 packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FsCall {
    Exists(String),
    IsDir(String),
    IsReadOnly(String),
    GetSize(String),
    GetDrive(String),
    GetCapacity(String),
    GetFreeSpace(String),
    List(String),
    Attributes(String),
    Find(String),
    MakeDir(String),
    Delete(String),
    Copy(String, String),
    Move(String, String),
    Open { path: String, mode: OpenMode },
}

impl FsCall {
    /// The op byte serialized for this call.
    pub fn op_code(&self) -> u8 {
        match self {
            FsCall::Exists(_) => 0,
            FsCall::IsDir(_) => 1,
            FsCall::IsReadOnly(_) => 2,
            FsCall::GetSize(_) => 3,
            FsCall::GetDrive(_) => 4,
            FsCall::GetCapacity(_) => 5,
            FsCall::GetFreeSpace(_) => 6,
            FsCall::List(_) => 7,
            FsCall::Attributes(_) => 8,
            FsCall::Find(_) => 9,
            FsCall::MakeDir(_) => 10,
            FsCall::Delete(_) => 11,
            FsCall::Copy(_, _) => 12,
            FsCall::Move(_, _) => 13,
            FsCall::Open { mode, .. } => mode.op_code(),
        }
    }
}

/// Kind 7: a remote filesystem request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsRequest {
    pub req_id: u8,
    pub call: FsCall,
}

/// Result of an attributes query (op 8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileAttributes {
    pub size: u32,
    /// Milliseconds since the Unix epoch.
    pub created: u64,
    pub modified: u64,
    pub is_dir: bool,
    pub is_read_only: bool,
    pub error: FsErrorCode,
}

/// Error byte inside a kind-8 attributes response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum FsErrorCode {
    #[default]
    Ok = 0,
    NoEntry = 1,
    Failure = 2,
}

impl FsErrorCode {
    /// Lenient decode: unknown bytes collapse to [`FsErrorCode::Failure`].
    pub fn from_byte(value: u8) -> Self {
        match value {
            0 => FsErrorCode::Ok,
            1 => FsErrorCode::NoEntry,
            _ => FsErrorCode::Failure,
        }
    }
}

/// Error sentinel for numeric responses (ops 3, 5, 6).
pub const FS_NUMBER_ERROR: u32 = 0xFFFF_FFFF;

/// The shape of a kind-8 response body, dispatched by op code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FsResponseBody {
    /// Ops 0–2.  `None` is the error sentinel (wire byte 2).
    Boolean(Option<bool>),
    /// Ops 3, 5, 6.  [`FS_NUMBER_ERROR`] is the error sentinel.
    Number(u32),
    /// Ops 4, 7, 9.  An empty list is the error sentinel.
    Strings(Vec<String>),
    /// Op 8.
    Attributes(FileAttributes),
    /// Ops 10–13 and the open acks (16..=23 and the write confirm, 17).
    /// An empty string means success.
    Void { error: String },
}

/// Kind 8: a remote filesystem response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsResponse {
    pub op: u8,
    pub req_id: u8,
    pub body: FsResponseBody,
}

/// Kind 9: file contents, or an error from an open-for-read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsData {
    /// Subtype 1 marks an open-for-read failure; the payload is the message.
    pub is_error: bool,
    pub req_id: u8,
    pub payload: Vec<u8>,
}

// ── Top-level packet ──────────────────────────────────────────────────────────

/// A decoded packet: window id plus the kind-specific body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    pub window: WindowId,
    pub body: PacketBody,
}

/// The body of each packet kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PacketBody {
    ScreenUpdate(ScreenUpdate),
    KeyInput(KeyInput),
    MouseInput(MouseInput),
    EventQueue(EventQueue),
    WindowInfo(WindowInfo),
    ServerMessage(ServerMessage),
    Handshake(Handshake),
    FsRequest(FsRequest),
    FsResponse(FsResponse),
    FsData(FsData),
}

impl PacketBody {
    /// Returns the [`PacketKind`] discriminant for this body.
    pub fn kind(&self) -> PacketKind {
        match self {
            PacketBody::ScreenUpdate(_) => PacketKind::ScreenUpdate,
            PacketBody::KeyInput(_) => PacketKind::KeyInput,
            PacketBody::MouseInput(_) => PacketKind::MouseInput,
            PacketBody::EventQueue(_) => PacketKind::EventQueue,
            PacketBody::WindowInfo(_) => PacketKind::WindowInfo,
            PacketBody::ServerMessage(_) => PacketKind::ServerMessage,
            PacketBody::Handshake(_) => PacketKind::Handshake,
            PacketBody::FsRequest(_) => PacketKind::FsRequest,
            PacketBody::FsResponse(_) => PacketKind::FsResponse,
            PacketBody::FsData(_) => PacketKind::FsData,
        }
    }
}
