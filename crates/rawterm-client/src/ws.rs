//! WebSocket transport, connect side.
//!
//! The counterpart of the server's accept-side transport: one WebSocket
//! message is one frame, text or binary.  TLS endpoints work through
//! tungstenite's `MaybeTlsStream`.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use rawterm_core::transport::{Transport, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A [`Transport`] over an outgoing WebSocket connection.
pub struct WsTransport {
    sink: Mutex<SplitSink<WsStream, WsMessage>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl WsTransport {
    /// Connects to `url` (`ws://` or `wss://`).
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let (ws, _response) = connect_async(url).await?;
        let (sink, stream) = ws.split();
        Ok(Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        })
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        let text = String::from_utf8_lossy(frame).into_owned();
        self.sink
            .lock()
            .await
            .send(WsMessage::Text(text))
            .await
            .map_err(|e| TransportError::Other(e.to_string()))
    }

    async fn receive(&self) -> Option<Vec<u8>> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await? {
                Ok(WsMessage::Text(text)) => return Some(text.into_bytes()),
                Ok(WsMessage::Binary(bytes)) => return Some(bytes),
                Ok(WsMessage::Close(_)) => return None,
                Ok(_) => continue,
                Err(e) => {
                    debug!(error = %e, "websocket receive error");
                    return None;
                }
            }
        }
    }

    async fn close(&self) {
        let _ = self.sink.lock().await.send(WsMessage::Close(None)).await;
    }
}
