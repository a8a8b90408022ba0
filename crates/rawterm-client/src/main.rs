//! rawterm demo client.
//!
//! Connects to a rawterm server over WebSocket, dumps each repaint to
//! stdout, and forwards typed lines as character events.  This is a
//! plumbing demo, not a terminal emulator: every repaint prints the full
//! grid.

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rawterm_client::{Client, ClientOptions, WsTransport};
use rawterm_core::display::Display;
use rawterm_core::event::TermEvent;
use rawterm_core::keymap::KeyCode;
use rawterm_core::protocol::messages::{MessageKind, RenderMode, Rgb8, WindowId};

#[derive(Debug, Parser)]
#[command(name = "rawterm-client", about = "Attach to a raw-mode terminal server")]
struct Args {
    /// Server URL.
    #[arg(long, default_value = "ws://127.0.0.1:5678")]
    url: String,

    /// Window id to attach to.
    #[arg(long, default_value_t = 0)]
    window: u8,
}

/// A line-printing display: repaints are dumped to stdout as text.
struct TextDisplay {
    width: u16,
    height: u16,
    rows: Vec<Vec<u8>>,
    visible: bool,
}

impl TextDisplay {
    fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            rows: vec![vec![b' '; width as usize]; height as usize],
            visible: true,
        }
    }

    fn dump(&self) {
        println!("+{}+", "-".repeat(self.width as usize));
        for row in &self.rows {
            println!("|{}|", String::from_utf8_lossy(row));
        }
        println!("+{}+", "-".repeat(self.width as usize));
    }
}

impl Display for TextDisplay {
    fn set_mode(&mut self, mode: RenderMode) {
        if mode.is_pixel() {
            warn!("pixel modes are not rendered by this demo");
        }
    }

    fn set_cursor(&mut self, _x: i32, _y: i32) {}

    fn set_cursor_blink(&mut self, _blink: bool) {}

    fn set_visible(&mut self, visible: bool) {
        // The renderer shows the display as the last step of a repaint;
        // that is the moment the whole grid is consistent.
        if visible && !self.visible {
            self.dump();
        }
        self.visible = visible;
    }

    fn clear(&mut self) {
        for row in &mut self.rows {
            row.fill(b' ');
        }
    }

    fn set_palette_entry(&mut self, _index: u8, _color: Rgb8) {}

    fn blit_line(&mut self, y: u16, chars: &[u8], _colors: &[u8]) {
        if y >= 1 && y <= self.height {
            let row = &mut self.rows[y as usize - 1];
            let n = row.len().min(chars.len());
            row[..n].copy_from_slice(&chars[..n]);
        }
    }

    fn blit_pixel_row(&mut self, _y: u32, _pixels: &[u8]) {}

    fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    fn set_title(&mut self, title: &str) {
        info!("window title: {title}");
    }

    fn show_message(&mut self, kind: MessageKind, title: &str, body: &str) {
        info!("server message [{kind:?}] {title}: {body}");
    }

    fn window_notification(&mut self, window: WindowId) {
        info!("activity on window {window}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    info!("connecting to {}", args.url);
    let transport = Arc::new(WsTransport::connect(&args.url).await?);

    let mut client = Client::new(
        transport,
        TextDisplay::new(51, 19),
        args.window,
        ClientOptions::default(),
    );
    client.attach().await?;

    // Feed stdin lines in as typed characters followed by Enter.
    let (tx, mut rx) = mpsc::channel::<TermEvent>(64);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            for c in line.chars() {
                if tx.send(TermEvent::Char(c)).await.is_err() {
                    return;
                }
            }
            let enter = TermEvent::Key {
                code: KeyCode::Enter,
                held: false,
            };
            if tx.send(enter).await.is_err() {
                return;
            }
        }
    });

    client.run(Some(&mut rx)).await?;
    info!("session ended");
    Ok(())
}
