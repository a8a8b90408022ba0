//! rawterm demo server.
//!
//! Listens for WebSocket connections and serves each one an interactive
//! echo terminal backed by an in-memory filesystem.  Type and the
//! characters come back through the repaint pipeline; close the client
//! window and the session ends.
//!
//! ```text
//! main()
//!  └─ TcpListener accept loop
//!       └─ per connection: WsTransport::accept
//!            └─ ServerSession::attach + echo loop (Tokio task)
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use rawterm_core::event::TermEvent;
use rawterm_core::keymap::KeyCode;
use rawterm_server::{
    MemoryFs, ServerConfig, ServerSession, ServerTerminal, SessionError, WsTransport,
};

#[derive(Debug, Parser)]
#[command(name = "rawterm-server", about = "Serve a raw-mode terminal over WebSocket")]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:5678")]
    listen: SocketAddr,

    /// Terminal width in cells.
    #[arg(long, default_value_t = 51)]
    width: u16,

    /// Terminal height in cells.
    #[arg(long, default_value_t = 19)]
    height: u16,

    /// Window title announced to clients.
    #[arg(long, default_value = "rawterm demo")]
    title: String,

    /// Refuse the remote filesystem capability.
    #[arg(long)]
    no_filesystem: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let listener = TcpListener::bind(args.listen).await?;
    info!("rawterm server listening on {}", args.listen);

    let args = Arc::new(args);
    loop {
        let (stream, peer) = listener.accept().await?;
        info!("connection from {peer}");
        let args = Arc::clone(&args);
        tokio::spawn(async move {
            match serve_connection(stream, &args).await {
                Ok(()) => info!("session {peer} closed"),
                Err(e) => warn!("session {peer} ended with error: {e}"),
            }
        });
    }
}

async fn serve_connection(stream: TcpStream, args: &Args) -> anyhow::Result<()> {
    let transport = Arc::new(WsTransport::accept(stream).await?);

    let mut terminal = ServerTerminal::new(0, args.width, args.height, 0);
    terminal.set_title(&args.title);
    terminal.write("rawterm echo demo - type away");
    terminal.set_cursor_pos(1, 3);

    let config = ServerConfig {
        allow_filesystem: !args.no_filesystem,
        ..ServerConfig::default()
    };
    let mut session = ServerSession::new(transport, terminal, config);
    if !args.no_filesystem {
        let fs = MemoryFs::new();
        fs.seed_file("motd.txt", b"Hello from the rawterm demo server.\n");
        session = session.with_filesystem(fs);
    }

    session.attach().await?;

    loop {
        let event = match session.pull_event(None, None).await {
            Ok(event) => event,
            Err(SessionError::TransportClosed) => return Ok(()),
            Err(e) => {
                error!("pump error: {e}");
                return Err(e.into());
            }
        };
        match event {
            TermEvent::Char(c) => {
                let mut buf = [0u8; 4];
                session.terminal_mut().write(c.encode_utf8(&mut buf));
            }
            TermEvent::Key { code: KeyCode::Enter, .. } => {
                line_feed(&mut session);
            }
            TermEvent::Key { code: KeyCode::Backspace, .. } => {
                let term = session.terminal_mut();
                let (x, y) = term.cursor_pos();
                if x > 1 {
                    term.set_cursor_pos(x - 1, y);
                    term.write(" ");
                    term.set_cursor_pos(x - 1, y);
                }
            }
            TermEvent::WindowClosed { .. } => return Ok(()),
            other => info!(event = other.name(), "event"),
        }
    }
}

fn line_feed<T, F>(session: &mut ServerSession<T, F>)
where
    T: rawterm_core::Transport,
    F: rawterm_server::HostFs,
{
    let term = session.terminal_mut();
    let (_, y) = term.cursor_pos();
    let (_, height) = term.size();
    if y >= height as i32 {
        term.scroll(1);
        term.set_cursor_pos(1, height as i32);
    } else {
        term.set_cursor_pos(1, y + 1);
    }
}
