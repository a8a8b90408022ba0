//! WebSocket transport, accept side.
//!
//! One accepted WebSocket connection carries one raw-mode link; every
//! WebSocket message is exactly one frame.  Frames are ASCII, so they travel
//! as text messages; binary messages from the peer are accepted too.
//! Protocol-level ping/pong is handled by tungstenite underneath.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{accept_async, WebSocketStream};
use tracing::debug;

use rawterm_core::transport::{Transport, TransportError};

/// A [`Transport`] over an accepted WebSocket connection.
pub struct WsTransport {
    sink: Mutex<SplitSink<WebSocketStream<TcpStream>, WsMessage>>,
    stream: Mutex<SplitStream<WebSocketStream<TcpStream>>>,
}

impl WsTransport {
    /// Performs the WebSocket upgrade on an accepted TCP stream.
    pub async fn accept(stream: TcpStream) -> anyhow::Result<Self> {
        let ws = accept_async(stream).await?;
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
