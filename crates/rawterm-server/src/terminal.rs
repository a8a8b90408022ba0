//! Per-window terminal state owned by the server.
//!
//! A [`ServerTerminal`] is the authoritative copy of everything a window
//! shows: the character grid with packed colors, the pixel grid, the
//! 256-entry palette, the cursor, and the window metadata.  Drawing
//! operations mutate the state and set a dirty flag; the session's repaint
//! tick turns the dirty state into a kind-0 packet via
//! [`ServerTerminal::render_screen_packet`], which run-length encodes the
//! grids.
//!
//! # Coordinates and clipping
//!
//! Cursor coordinates are 1-indexed and deliberately allowed to stray
//! outside the visible grid: writing there draws nothing but still advances
//! the cursor, which is how hosted programs expect a terminal to behave.
//! Pixel coordinates are 0-indexed.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use rawterm_core::display::Display;
use rawterm_core::protocol::messages::{
    MessageKind, Packet, PacketBody, RenderMode, Rgb8, ScreenContents, ScreenUpdate,
    ServerMessage, WindowAction, WindowId, WindowInfo, CELL_HEIGHT_PX, CELL_WIDTH_PX,
};

/// Fatal caller errors from drawing operations.
#[derive(Debug, Error, PartialEq)]
pub enum TerminalError {
    /// `blit` was given text and color runs of different lengths.
    #[error("blit arguments differ in length: {chars} chars, {fg} fg, {bg} bg")]
    LengthMismatch { chars: usize, fg: usize, bg: usize },

    /// Not a valid palette selector for the current mode.
    #[error("invalid palette color {0:#x} for the current mode")]
    InvalidColor(u32),
}

/// The default 16-color palette, as `(r, g, b)` bytes.
pub const DEFAULT_PALETTE: [Rgb8; 16] = [
    Rgb8::new(0xF0, 0xF0, 0xF0), // white
    Rgb8::new(0xF2, 0xB2, 0x33), // orange
    Rgb8::new(0xE5, 0x7F, 0xD8), // magenta
    Rgb8::new(0x99, 0xB2, 0xF2), // light blue
    Rgb8::new(0xDE, 0xDE, 0x6C), // yellow
    Rgb8::new(0x7F, 0xCC, 0x19), // lime
    Rgb8::new(0xF2, 0xB2, 0xCC), // pink
    Rgb8::new(0x4C, 0x4C, 0x4C), // gray
    Rgb8::new(0x99, 0x99, 0x99), // light gray
    Rgb8::new(0x4C, 0x99, 0xB2), // cyan
    Rgb8::new(0xB2, 0x66, 0xE5), // purple
    Rgb8::new(0x33, 0x66, 0xCC), // blue
    Rgb8::new(0x7F, 0x66, 0x4C), // brown
    Rgb8::new(0x57, 0xA6, 0x4E), // green
    Rgb8::new(0xCC, 0x4C, 0x4C), // red
    Rgb8::new(0x11, 0x11, 0x11), // black
];

/// Packed white-on-black: background 15, foreground 0.
const DEFAULT_COLOR: u8 = 0xF0;
/// Palette index filling a fresh pixel grid.
const DEFAULT_PIXEL: u8 = 0x0F;

/// The server-side state of one window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerTerminal {
    window: WindowId,
    mode: RenderMode,
    width: u16,
    height: u16,
    cursor_x: i32,
    cursor_y: i32,
    blink: bool,
    visible: bool,
    closed: bool,
    grayscale: bool,
    current_color: u8,
    /// `height` rows of `width` characters.
    screen: Vec<Vec<u8>>,
    /// `height` rows of `width` packed `(bg << 4) | fg` bytes.
    colors: Vec<Vec<u8>>,
    /// `height·9` rows of `width·6` palette indices.
    pixels: Vec<Vec<u8>>,
    /// 256 entries of `(r, g, b)` in `[0, 1]`.
    palette: Vec<[f64; 3]>,
    title: String,
    is_monitor: bool,
    computer_id: u32,
    changed: bool,
}

impl ServerTerminal {
    /// Creates a window with the default palette, a cleared grid, and the
    /// cursor at (1, 1).
    pub fn new(window: WindowId, width: u16, height: u16, computer_id: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let mut palette = vec![[0.0, 0.0, 0.0]; 256];
        for (entry, rgb) in palette.iter_mut().zip(DEFAULT_PALETTE) {
            *entry = [
                rgb.r as f64 / 255.0,
                rgb.g as f64 / 255.0,
                rgb.b as f64 / 255.0,
            ];
        }
        Self {
            window,
            mode: RenderMode::Text,
            width,
            height,
            cursor_x: 1,
            cursor_y: 1,
            blink: true,
            visible: true,
            closed: false,
            grayscale: false,
            current_color: DEFAULT_COLOR,
            screen: vec![vec![b' '; width as usize]; height as usize],
            colors: vec![vec![DEFAULT_COLOR; width as usize]; height as usize],
            pixels: vec![
                vec![DEFAULT_PIXEL; width as usize * CELL_WIDTH_PX as usize];
                height as usize * CELL_HEIGHT_PX as usize
            ],
            palette,
            title: String::new(),
            is_monitor: false,
            computer_id,
            changed: true,
        }
    }

    /// Marks this window as a monitor peripheral (zero secondary id on the
    /// wire).
    pub fn set_monitor(&mut self, is_monitor: bool) {
        self.is_monitor = is_monitor;
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn window(&self) -> WindowId {
        self.window
    }

    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    pub fn cursor_pos(&self) -> (i32, i32) {
        (self.cursor_x, self.cursor_y)
    }

    pub fn graphics_mode(&self) -> RenderMode {
        self.mode
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn mark_closed(&mut self) {
        self.closed = true;
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Foreground palette index of the current color.
    pub fn text_color(&self) -> u8 {
        self.current_color & 0x0F
    }

    /// Background palette index of the current color.
    pub fn background_color(&self) -> u8 {
        self.current_color >> 4
    }

    /// The packed current color byte.
    pub fn packed_color(&self) -> u8 {
        self.current_color
    }

    // ── Cursor and attributes ─────────────────────────────────────────────────

    pub fn set_cursor_pos(&mut self, x: i32, y: i32) {
        self.cursor_x = x;
        self.cursor_y = y;
        self.changed = true;
    }

    pub fn set_cursor_blink(&mut self, blink: bool) {
        self.blink = blink;
        self.changed = true;
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        self.changed = true;
    }

    pub fn set_grayscale(&mut self, grayscale: bool) {
        self.grayscale = grayscale;
        self.changed = true;
    }

    pub fn set_text_color(&mut self, fg: u8) {
        self.current_color = (self.current_color & 0xF0) | (fg & 0x0F);
        self.changed = true;
    }

    pub fn set_background_color(&mut self, bg: u8) {
        self.current_color = (bg << 4) | (self.current_color & 0x0F);
        self.changed = true;
    }

    pub fn set_graphics_mode(&mut self, mode: RenderMode) {
        self.mode = mode;
        self.changed = true;
    }

    // ── Text drawing ──────────────────────────────────────────────────────────

    /// Writes `text` at the cursor in the current color, advancing the
    /// cursor one cell per character.  Off-grid cells are clipped.
    pub fn write(&mut self, text: &str) {
        for byte in text.bytes() {
            self.put_cell(byte, self.current_color);
            self.cursor_x += 1;
        }
        self.changed = true;
    }

    /// Writes characters with per-cell foreground and background palette
    /// indices.
    ///
    /// # Errors
    ///
    /// [`TerminalError::LengthMismatch`] when the three slices differ in
    /// length; this is a caller bug, not a recoverable condition.
    pub fn blit(&mut self, chars: &[u8], fg: &[u8], bg: &[u8]) -> Result<(), TerminalError> {
        if chars.len() != fg.len() || chars.len() != bg.len() {
            return Err(TerminalError::LengthMismatch {
                chars: chars.len(),
                fg: fg.len(),
                bg: bg.len(),
            });
        }
        for ((&c, &f), &b) in chars.iter().zip(fg).zip(bg) {
            self.put_cell(c, ((b & 0x0F) << 4) | (f & 0x0F));
            self.cursor_x += 1;
        }
        self.changed = true;
        Ok(())
    }

    fn put_cell(&mut self, c: u8, color: u8) {
        if self.cursor_x >= 1
            && self.cursor_x <= self.width as i32
            && self.cursor_y >= 1
            && self.cursor_y <= self.height as i32
        {
            let (x, y) = (self.cursor_x as usize - 1, self.cursor_y as usize - 1);
            self.screen[y][x] = c;
            self.colors[y][x] = color;
        }
    }

    /// Clears the whole grid to spaces in the current color.
    pub fn clear(&mut self) {
        for row in &mut self.screen {
            row.fill(b' ');
        }
        for row in &mut self.colors {
            row.fill(self.current_color);
        }
        for row in &mut self.pixels {
            row.fill(DEFAULT_PIXEL);
        }
        self.changed = true;
    }

    /// Clears the cursor's row only.
    pub fn clear_line(&mut self) {
        if self.cursor_y >= 1 && self.cursor_y <= self.height as i32 {
            let y = self.cursor_y as usize - 1;
            self.screen[y].fill(b' ');
            self.colors[y].fill(self.current_color);
        }
        self.changed = true;
    }

    /// Scrolls content up by `n` rows (down for negative `n`).  Vacated rows
    /// are filled with spaces in the current color; `|n| >= height` clears
    /// the whole buffer.
    pub fn scroll(&mut self, n: i32) {
        if n == 0 {
            return;
        }
        let height = self.height as usize;
        let blank_char = vec![b' '; self.width as usize];
        let blank_color = vec![self.current_color; self.width as usize];
        if n.unsigned_abs() as usize >= height {
            for y in 0..height {
                self.screen[y] = blank_char.clone();
                self.colors[y] = blank_color.clone();
            }
        } else if n > 0 {
            let n = n as usize;
            self.screen.rotate_left(n);
            self.colors.rotate_left(n);
            for y in height - n..height {
                self.screen[y] = blank_char.clone();
                self.colors[y] = blank_color.clone();
            }
        } else {
            let n = (-n) as usize;
            self.screen.rotate_right(n);
            self.colors.rotate_right(n);
            for y in 0..n {
                self.screen[y] = blank_char.clone();
                self.colors[y] = blank_color.clone();
            }
        }
        self.changed = true;
    }

    // ── Pixel drawing ─────────────────────────────────────────────────────────

    /// Sets one pixel (0-indexed) to a palette index.  Out-of-range
    /// coordinates are clipped.
    pub fn set_pixel(&mut self, x: u32, y: u32, color: u8) {
        let (pw, ph) = self.pixel_size();
        if x < pw && y < ph {
            self.pixels[y as usize][x as usize] = color;
        }
        self.changed = true;
    }

    /// Reads one pixel (0-indexed); `None` out of range.
    pub fn pixel(&self, x: u32, y: u32) -> Option<u8> {
        let (pw, ph) = self.pixel_size();
        if x < pw && y < ph {
            Some(self.pixels[y as usize][x as usize])
        } else {
            None
        }
    }

    pub fn pixel_size(&self) -> (u32, u32) {
        (
            self.width as u32 * CELL_WIDTH_PX,
            self.height as u32 * CELL_HEIGHT_PX,
        )
    }

    // ── Palette ───────────────────────────────────────────────────────────────

    /// Resolves a palette selector for the current mode: a color *bit value*
    /// (power of two in `1..=0x8000`) in the 16-color modes, a raw index in
    /// pixel-256 mode.
    fn palette_index(&self, color: u32) -> Result<usize, TerminalError> {
        match self.mode {
            RenderMode::Pixel256 => {
                if color <= 0xFF {
                    Ok(color as usize)
                } else {
                    Err(TerminalError::InvalidColor(color))
                }
            }
            _ => {
                if color.is_power_of_two() && color <= 0x8000 {
                    Ok(color.trailing_zeros() as usize)
                } else {
                    Err(TerminalError::InvalidColor(color))
                }
            }
        }
    }

    /// Replaces one palette entry; components are clamped to `[0, 1]`.
    pub fn set_palette(&mut self, color: u32, rgb: [f64; 3]) -> Result<(), TerminalError> {
        let index = self.palette_index(color)?;
        self.palette[index] = rgb.map(|v| v.clamp(0.0, 1.0));
        self.changed = true;
        Ok(())
    }

    /// Reads one palette entry through the same selector rules.
    pub fn palette(&self, color: u32) -> Result<[f64; 3], TerminalError> {
        Ok(self.palette[self.palette_index(color)?])
    }

    // ── Window metadata ───────────────────────────────────────────────────────

    /// Resizes all grids, truncating or padding.  The session announces the
    /// new dimensions with a kind-4 update when the resize originates
    /// locally.
    pub fn resize(&mut self, width: u16, height: u16) {
        let width = width.max(1);
        let height = height.max(1);
        resize_grid(&mut self.screen, width as usize, height as usize, b' ');
        resize_grid(
            &mut self.colors,
            width as usize,
            height as usize,
            self.current_color,
        );
        resize_grid(
            &mut self.pixels,
            width as usize * CELL_WIDTH_PX as usize,
            height as usize * CELL_HEIGHT_PX as usize,
            DEFAULT_PIXEL,
        );
        self.width = width;
        self.height = height;
        self.changed = true;
        trace!(window = self.window, width, height, "terminal resized");
    }

    /// Retitles the window.
    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    /// Builds a kind-4 packet for this window.
    pub fn window_info_packet(&self, action: WindowAction) -> Packet {
        Packet {
            window: self.window,
            body: PacketBody::WindowInfo(WindowInfo {
                action,
                secondary_id: if self.is_monitor {
                    0
                } else {
                    (self.computer_id % 256) as u8
                },
                width: self.width,
                height: self.height,
                title: self.title.clone(),
            }),
        }
    }

    /// Builds a kind-5 message packet for this window.
    pub fn message_packet(&self, kind: MessageKind, title: &str, body: &str) -> Packet {
        Packet {
            window: self.window,
            body: PacketBody::ServerMessage(ServerMessage {
                flags: kind.flag(),
                title: title.to_string(),
                body: body.to_string(),
            }),
        }
    }

    // ── Repaint ───────────────────────────────────────────────────────────────

    /// Snapshot of the current state as a kind-0 body.
    pub fn screen_update(&self) -> ScreenUpdate {
        let contents = match self.mode {
            RenderMode::Text => ScreenContents::Text {
                chars: self.screen.concat(),
                colors: self.colors.concat(),
            },
            RenderMode::Pixel16 | RenderMode::Pixel256 => {
                ScreenContents::Pixels(self.pixels.concat())
            }
        };
        let palette = self.palette[..self.mode.palette_len()]
            .iter()
            .map(|&[r, g, b]| {
                Rgb8::new(
                    (r * 255.0).round() as u8,
                    (g * 255.0).round() as u8,
                    (b * 255.0).round() as u8,
                )
            })
            .collect();
        ScreenUpdate {
            mode: self.mode,
            blink: self.blink,
            width: self.width,
            height: self.height,
            cursor_x: self.cursor_x,
            cursor_y: self.cursor_y,
            grayscale: self.grayscale,
            contents,
            palette,
        }
    }

    /// Emits the repaint packet when the window is visible and dirty, and
    /// clears the dirty flag.  The session calls this from its 50 ms tick so
    /// bursts of drawing coalesce into one packet.
    pub fn render_screen_packet(&mut self) -> Option<Packet> {
        if !self.visible || !self.changed {
            return None;
        }
        self.changed = false;
        Some(Packet {
            window: self.window,
            body: PacketBody::ScreenUpdate(self.screen_update()),
        })
    }

    /// Replays the current state onto a parent display.
    pub fn mirror_to(&self, display: &mut dyn Display) {
        display.set_visible(false);
        display.set_mode(self.mode);
        match self.mode {
            RenderMode::Text => {
                for (y, (chars, colors)) in self.screen.iter().zip(&self.colors).enumerate() {
                    display.blit_line(y as u16 + 1, chars, colors);
                }
            }
            _ => {
                for (y, row) in self.pixels.iter().enumerate() {
                    display.blit_pixel_row(y as u32 + 1, row);
                }
            }
        }
        for (index, &[r, g, b]) in self.palette[..self.mode.palette_len()].iter().enumerate() {
            display.set_palette_entry(
                index as u8,
                Rgb8::new(
                    (r * 255.0).round() as u8,
                    (g * 255.0).round() as u8,
                    (b * 255.0).round() as u8,
                ),
            );
        }
        display.set_cursor(self.cursor_x, self.cursor_y);
        display.set_cursor_blink(self.blink);
        display.set_visible(true);
    }
}

fn resize_grid(grid: &mut Vec<Vec<u8>>, width: usize, height: usize, fill: u8) {
    for row in grid.iter_mut() {
        row.resize(width, fill);
    }
    grid.resize_with(height, || vec![fill; width]);
}

// ── Tests ─────────────────────────────────────────────────────────────────────
