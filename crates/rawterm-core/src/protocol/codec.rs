//! Binary codec between [`Packet`] values and payload octets.
//!
//! Payload layout:
//!
//! ```text
//! [kind: u8][window: u8][body...]
//! ```
//!
//! All multi-byte integers are little-endian; strings are NUL-terminated
//! UTF-8.  The kind-0 screen grids are run-length encoded as `(byte, run)`
//! pairs with runs in `1..=255`; longer runs are cut at 255 and continued in
//! the next pair.
//!
//! Decoding is strict about structure (a truncated or internally inconsistent
//! body is an error) but lenient about trailing bytes, so peers may append
//! fields in future revisions without breaking old decoders.

use thiserror::Error;

use super::ibt::{IbtError, IbtValue};
use super::messages::{
    EventQueue, FileAttributes, FsCall, FsData, FsErrorCode, FsRequest, FsResponse,
    FsResponseBody, Handshake, KeyFlags, KeyInput, MouseEventKind, MouseInput, OpenMode, Packet,
    PacketBody, PacketKind, RenderMode, Rgb8, ScreenContents, ScreenUpdate, ServerMessage,
    WindowAction, WindowInfo, CELL_HEIGHT_PX, CELL_WIDTH_PX,
};
use super::wire::{ByteReader, ByteWriter};

/// Errors that can occur during packet encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The byte slice ended before the structure it claims to hold.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    Truncated { needed: usize, available: usize },

    /// The kind byte is not one of the ten defined packet kinds.
    #[error("unknown packet kind: 0x{0:02X}")]
    UnknownKind(u8),

    /// A field value is out of range or internally inconsistent.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

impl From<IbtError> for ProtocolError {
    fn from(err: IbtError) -> Self {
        ProtocolError::MalformedPayload(err.to_string())
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a packet into payload octets (kind byte, window byte, body).
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPayload`] when the packet's fields are
/// inconsistent (grid sizes not matching the declared dimensions, palette of
/// the wrong length, strings with interior NULs).
pub fn encode_packet(packet: &Packet) -> Result<Vec<u8>, ProtocolError> {
    let mut out = ByteWriter::with_capacity(16);
    out.u8(packet.body.kind() as u8);
    out.u8(packet.window);
    match &packet.body {
        PacketBody::ScreenUpdate(update) => encode_screen_update(&mut out, update)?,
        PacketBody::KeyInput(input) => {
            out.u8(input.code);
            out.u8(input.flags.0);
        }
        PacketBody::MouseInput(input) => {
            out.u8(input.kind as u8);
            out.u8(input.button);
            out.u32(input.x);
            out.u32(input.y);
        }
        PacketBody::EventQueue(event) => encode_event_queue(&mut out, event)?,
        PacketBody::WindowInfo(info) => {
            out.u8(info.action as u8);
            out.u8(info.secondary_id);
            out.u16(info.width);
            out.u16(info.height);
            out.cstring(&info.title)?;
        }
        PacketBody::ServerMessage(message) => {
            out.u32(message.flags);
            out.cstring(&message.title)?;
            out.cstring(&message.body)?;
        }
        PacketBody::Handshake(handshake) => out.u16(handshake.features),
        PacketBody::FsRequest(request) => encode_fs_request(&mut out, request)?,
        PacketBody::FsResponse(response) => encode_fs_response(&mut out, response)?,
        PacketBody::FsData(data) => {
            out.u8(u8::from(data.is_error));
            out.u8(data.req_id);
            out.u32(data.payload.len() as u32);
            out.bytes(&data.payload);
        }
    }
    Ok(out.into_bytes())
}

/// Decodes payload octets into a [`Packet`].
///
/// # Errors
///
/// [`ProtocolError::UnknownKind`] for undefined kind bytes (callers normally
/// ignore such frames), [`ProtocolError::Truncated`] or
/// [`ProtocolError::MalformedPayload`] for structurally broken bodies.
pub fn decode_packet(payload: &[u8]) -> Result<Packet, ProtocolError> {
    let mut reader = ByteReader::new(payload);
    let kind_byte = reader.u8()?;
    let kind =
        PacketKind::try_from(kind_byte).map_err(|_| ProtocolError::UnknownKind(kind_byte))?;
    let window = reader.u8()?;

    let body = match kind {
        PacketKind::ScreenUpdate => PacketBody::ScreenUpdate(decode_screen_update(&mut reader)?),
        PacketKind::KeyInput => PacketBody::KeyInput(KeyInput {
            code: reader.u8()?,
            flags: KeyFlags(reader.u8()?),
        }),
        PacketKind::MouseInput => {
            let kind_byte = reader.u8()?;
            let kind = MouseEventKind::try_from(kind_byte).map_err(|_| {
                ProtocolError::MalformedPayload(format!("unknown mouse event: {kind_byte}"))
            })?;
            PacketBody::MouseInput(MouseInput {
                kind,
                button: reader.u8()?,
                x: reader.u32()?,
                y: reader.u32()?,
            })
        }
        PacketKind::EventQueue => PacketBody::EventQueue(decode_event_queue(&mut reader)?),
        PacketKind::WindowInfo => {
            let action_byte = reader.u8()?;
            let action = WindowAction::try_from(action_byte).map_err(|_| {
                ProtocolError::MalformedPayload(format!("unknown window action: {action_byte}"))
            })?;
            PacketBody::WindowInfo(WindowInfo {
                action,
                secondary_id: reader.u8()?,
                width: reader.u16()?,
                height: reader.u16()?,
                title: reader.cstring()?,
            })
        }
        PacketKind::ServerMessage => PacketBody::ServerMessage(ServerMessage {
            flags: reader.u32()?,
            title: reader.cstring()?,
            body: reader.cstring()?,
        }),
        PacketKind::Handshake => PacketBody::Handshake(Handshake {
            features: reader.u16()?,
        }),
        PacketKind::FsRequest => PacketBody::FsRequest(decode_fs_request(&mut reader)?),
        PacketKind::FsResponse => PacketBody::FsResponse(decode_fs_response(&mut reader)?),
        PacketKind::FsData => {
            let subtype = reader.u8()?;
            if subtype > 1 {
                return Err(ProtocolError::MalformedPayload(format!(
                    "unknown file data subtype: {subtype}"
                )));
            }
            let req_id = reader.u8()?;
            let len = reader.u32()? as usize;
            PacketBody::FsData(FsData {
                is_error: subtype == 1,
                req_id,
                payload: reader.bytes(len)?.to_vec(),
            })
        }
    };

    Ok(Packet { window, body })
}

// ── Run-length encoding ───────────────────────────────────────────────────────

/// Appends `(byte, run)` pairs covering `data`; runs are cut at 255.
pub(crate) fn rle_encode(data: &[u8], out: &mut ByteWriter) {
    let mut iter = data.iter().copied();
    let Some(mut current) = iter.next() else {
        return;
    };
    let mut run: u8 = 1;
    for byte in iter {
        if byte == current && run < 255 {
            run += 1;
        } else {
            out.u8(current);
            out.u8(run);
            current = byte;
            run = 1;
        }
    }
    out.u8(current);
    out.u8(run);
}

/// Reads pairs until exactly `expected` bytes have been reproduced.
pub(crate) fn rle_decode(
    reader: &mut ByteReader<'_>,
    expected: usize,
) -> Result<Vec<u8>, ProtocolError> {
    let mut out = Vec::with_capacity(expected);
    while out.len() < expected {
        let value = reader.u8()?;
        let run = reader.u8()? as usize;
        if run == 0 {
            return Err(ProtocolError::MalformedPayload(
                "zero-length run in RLE stream".to_string(),
            ));
        }
        if out.len() + run > expected {
            return Err(ProtocolError::MalformedPayload(format!(
                "RLE run overflows the grid: {} + {run} > {expected}",
                out.len()
            )));
        }
        out.resize(out.len() + run, value);
    }
    Ok(out)
}

// ── Kind 0 helpers ────────────────────────────────────────────────────────────

fn pixel_count(width: u16, height: u16) -> usize {
    width as usize * CELL_WIDTH_PX as usize * height as usize * CELL_HEIGHT_PX as usize
}

fn encode_screen_update(out: &mut ByteWriter, update: &ScreenUpdate) -> Result<(), ProtocolError> {
    let cells = update.width as usize * update.height as usize;
    match (&update.contents, update.mode) {
        (ScreenContents::Text { chars, colors }, RenderMode::Text) => {
            if chars.len() != cells || colors.len() != cells {
                return Err(ProtocolError::MalformedPayload(format!(
                    "text grids must hold {cells} cells, got {} chars / {} colors",
                    chars.len(),
                    colors.len()
                )));
            }
        }
        (ScreenContents::Pixels(pixels), mode) if mode.is_pixel() => {
            let expected = pixel_count(update.width, update.height);
            if pixels.len() != expected {
                return Err(ProtocolError::MalformedPayload(format!(
                    "pixel grid must hold {expected} bytes, got {}",
                    pixels.len()
                )));
            }
        }
        _ => {
            return Err(ProtocolError::MalformedPayload(
                "screen contents do not match the declared mode".to_string(),
            ));
        }
    }
    if update.palette.len() != update.mode.palette_len() {
        return Err(ProtocolError::MalformedPayload(format!(
            "palette must hold {} entries, got {}",
            update.mode.palette_len(),
            update.palette.len()
        )));
    }

    out.u8(update.mode as u8);
    out.u8(u8::from(update.blink));
    out.u16(update.width);
    out.u16(update.height);
    out.u16(update.cursor_x as u16);
    out.u16(update.cursor_y as u16);
    out.u8(u8::from(update.grayscale));
    out.bytes(&[0, 0, 0]);

    match &update.contents {
        ScreenContents::Text { chars, colors } => {
            rle_encode(chars, out);
            rle_encode(colors, out);
        }
        ScreenContents::Pixels(pixels) => rle_encode(pixels, out),
    }

    for entry in &update.palette {
        out.u8(entry.r);
        out.u8(entry.g);
        out.u8(entry.b);
    }
    Ok(())
}

fn decode_screen_update(reader: &mut ByteReader<'_>) -> Result<ScreenUpdate, ProtocolError> {
    let mode_byte = reader.u8()?;
    let mode = RenderMode::try_from(mode_byte).map_err(|_| {
        ProtocolError::MalformedPayload(format!("unknown render mode: {mode_byte}"))
    })?;
    let blink = reader.u8()? != 0;
    let width = reader.u16()?;
    let height = reader.u16()?;
    let cursor_x = reader.u16()? as i32;
    let cursor_y = reader.u16()? as i32;
    let grayscale = reader.u8()? != 0;
    reader.bytes(3)?; // reserved

    let cells = width as usize * height as usize;
    let contents = match mode {
        RenderMode::Text => {
            let chars = rle_decode(reader, cells)?;
            let colors = rle_decode(reader, cells)?;
            ScreenContents::Text { chars, colors }
        }
        RenderMode::Pixel16 | RenderMode::Pixel256 => {
            ScreenContents::Pixels(rle_decode(reader, pixel_count(width, height))?)
        }
    };

    let mut palette = Vec::with_capacity(mode.palette_len());
    for _ in 0..mode.palette_len() {
        palette.push(Rgb8::new(reader.u8()?, reader.u8()?, reader.u8()?));
    }

    Ok(ScreenUpdate {
        mode,
        blink,
        width,
        height,
        cursor_x,
        cursor_y,
        grayscale,
        contents,
        palette,
    })
}

// ── Kind 3 helpers ────────────────────────────────────────────────────────────

fn encode_event_queue(out: &mut ByteWriter, event: &EventQueue) -> Result<(), ProtocolError> {
    if event.params.len() > 255 {
        return Err(ProtocolError::MalformedPayload(format!(
            "custom event carries {} parameters; the wire format allows at most 255",
            event.params.len()
        )));
    }
    out.u8(event.params.len() as u8);
    out.cstring(&event.name)?;
    for param in &event.params {
        param.encode(out)?;
    }
    Ok(())
}

fn decode_event_queue(reader: &mut ByteReader<'_>) -> Result<EventQueue, ProtocolError> {
    let count = reader.u8()? as usize;
    let name = reader.cstring()?;
    let mut params = Vec::with_capacity(count);
    for _ in 0..count {
        params.push(IbtValue::decode(reader)?);
    }
    Ok(EventQueue { name, params })
}

// ── Kind 7/8 helpers ──────────────────────────────────────────────────────────

fn encode_fs_request(out: &mut ByteWriter, request: &FsRequest) -> Result<(), ProtocolError> {
    out.u8(request.call.op_code());
    out.u8(request.req_id);
    match &request.call {
        FsCall::Exists(path)
        | FsCall::IsDir(path)
        | FsCall::IsReadOnly(path)
        | FsCall::GetSize(path)
        | FsCall::GetDrive(path)
        | FsCall::GetCapacity(path)
        | FsCall::GetFreeSpace(path)
        | FsCall::List(path)
        | FsCall::Attributes(path)
        | FsCall::Find(path)
        | FsCall::MakeDir(path)
        | FsCall::Delete(path)
        | FsCall::Open { path, .. } => out.cstring(path)?,
        FsCall::Copy(from, to) | FsCall::Move(from, to) => {
            out.cstring(from)?;
            out.cstring(to)?;
        }
    }
    Ok(())
}

fn decode_fs_request(reader: &mut ByteReader<'_>) -> Result<FsRequest, ProtocolError> {
    let op = reader.u8()?;
    let req_id = reader.u8()?;
    let call = match op {
        0 => FsCall::Exists(reader.cstring()?),
        1 => FsCall::IsDir(reader.cstring()?),
        2 => FsCall::IsReadOnly(reader.cstring()?),
        3 => FsCall::GetSize(reader.cstring()?),
        4 => FsCall::GetDrive(reader.cstring()?),
        5 => FsCall::GetCapacity(reader.cstring()?),
        6 => FsCall::GetFreeSpace(reader.cstring()?),
        7 => FsCall::List(reader.cstring()?),
        8 => FsCall::Attributes(reader.cstring()?),
        9 => FsCall::Find(reader.cstring()?),
        10 => FsCall::MakeDir(reader.cstring()?),
        11 => FsCall::Delete(reader.cstring()?),
        12 => FsCall::Copy(reader.cstring()?, reader.cstring()?),
        13 => FsCall::Move(reader.cstring()?, reader.cstring()?),
        16..=23 => FsCall::Open {
            path: reader.cstring()?,
            mode: OpenMode::from_bits(op),
        },
        other => {
            return Err(ProtocolError::MalformedPayload(format!(
                "unknown filesystem op: {other}"
            )));
        }
    };
    Ok(FsRequest { req_id, call })
}

fn encode_fs_response(out: &mut ByteWriter, response: &FsResponse) -> Result<(), ProtocolError> {
    out.u8(response.op);
    out.u8(response.req_id);
    match &response.body {
        FsResponseBody::Boolean(value) => out.u8(match value {
            Some(false) => 0,
            Some(true) => 1,
            None => 2,
        }),
        FsResponseBody::Number(value) => out.u32(*value),
        FsResponseBody::Strings(entries) => {
            out.u32(entries.len() as u32);
            for entry in entries {
                out.cstring(entry)?;
            }
        }
        FsResponseBody::Attributes(attrs) => {
            out.u32(attrs.size);
            out.u64(attrs.created);
            out.u64(attrs.modified);
            out.u8(u8::from(attrs.is_dir));
            out.u8(u8::from(attrs.is_read_only));
            out.u8(attrs.error as u8);
            out.u8(0);
        }
        FsResponseBody::Void { error } => out.cstring(error)?,
    }
    Ok(())
}

fn decode_fs_response(reader: &mut ByteReader<'_>) -> Result<FsResponse, ProtocolError> {
    let op = reader.u8()?;
    let req_id = reader.u8()?;
    let body = match op {
        0..=2 => {
            let byte = reader.u8()?;
            FsResponseBody::Boolean(match byte {
                0 => Some(false),
                1 => Some(true),
                _ => None,
            })
        }
        3 | 5 | 6 => FsResponseBody::Number(reader.u32()?),
        4 | 7 | 9 => {
            let count = reader.u32()? as usize;
            let mut entries = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                entries.push(reader.cstring()?);
            }
            FsResponseBody::Strings(entries)
        }
        8 => {
            let size = reader.u32()?;
            let created = reader.u64()?;
            let modified = reader.u64()?;
            let is_dir = reader.u8()? != 0;
            let is_read_only = reader.u8()? != 0;
            let error = FsErrorCode::from_byte(reader.u8()?);
            reader.u8()?; // pad
            FsResponseBody::Attributes(FileAttributes {
                size,
                created,
                modified,
                is_dir,
                is_read_only,
                error,
            })
        }
        10..=13 | 16..=23 => FsResponseBody::Void {
            error: reader.cstring()?,
        },
        other => {
            return Err(ProtocolError::MalformedPayload(format!(
                "unknown filesystem response op: {other}"
            )));
        }
    };
    Ok(FsResponse { op, req_id, body })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
