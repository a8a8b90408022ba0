//! Client side of the remote filesystem bridge.
//!
//! Every call allocates a request id, sends a kind-7 packet, and parks on a
//! oneshot channel until the matching kind-8 (or kind-9, for reads) arrives.
//! The client's receive pump completes the channels via [`FsClient::complete`];
//! responses with an id nobody is waiting on are dropped, so correlation is
//! by id, never by arrival order.
//!
//! Ids advance `(id + 1) mod 256` and at most one call may be in flight per
//! id.  Error sentinels in the response shapes surface as
//! [`FsCallError::Remote`].  An empty `list`/`find` result is returned as an
//! empty vector — only `getDrive`'s empty answer is unambiguously an error.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;

use rawterm_core::protocol::capabilities::Capabilities;
use rawterm_core::protocol::codec::{encode_packet, ProtocolError};
use rawterm_core::protocol::frame::{encode_frame, FrameError};
use rawterm_core::protocol::messages::{
    FileAttributes, FsCall, FsData, FsErrorCode, FsRequest, FsResponse, FsResponseBody, OpenMode,
    Packet, PacketBody, WindowId, FS_NUMBER_ERROR,
};
use rawterm_core::transport::{Transport, TransportError};

/// Errors surfaced to filesystem callers.
#[derive(Debug, Error)]
pub enum FsCallError {
    /// The filesystem capability was never negotiated on this link.
    #[error("the remote filesystem capability is not enabled")]
    Unsupported,

    /// 256 calls are already in flight and this id wrapped onto one of them.
    #[error("request id {0} already has a call in flight")]
    Busy(u8),

    /// The transport closed before the response arrived.
    #[error("transport closed before the filesystem response arrived")]
    TransportClosed,

    /// The server reported a failure for this operation.
    #[error("{0}")]
    Remote(String),

    /// The server answered with a shape the op does not define.
    #[error("unexpected response shape for op {0}")]
    UnexpectedResponse(u8),

    /// The mode given to `write_file` cannot create a write handle.
    #[error("mode \"{}\" is not a write mode", .0.as_str())]
    NotWriteMode(OpenMode),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// A completed response: kind 8 or kind 9.
#[derive(Debug)]
pub enum FsReply {
    Response(FsResponse),
    Data(FsData),
}

/// Handle for issuing remote filesystem calls.  Cheap to clone; all clones
/// share the id counter and the pending-call table.
pub struct FsClient<T> {
    transport: Arc<T>,
    caps: Arc<Capabilities>,
    window: WindowId,
    next_id: Arc<AtomicU8>,
    pending: Arc<Mutex<HashMap<u8, oneshot::Sender<FsReply>>>>,
}

impl<T> Clone for FsClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            caps: Arc::clone(&self.caps),
            window: self.window,
            next_id: Arc::clone(&self.next_id),
            pending: Arc::clone(&self.pending),
        }
    }
}

impl<T: Transport> FsClient<T> {
    pub(crate) fn new(transport: Arc<T>, caps: Arc<Capabilities>, window: WindowId) -> Self {
        Self {
            transport,
            caps,
            window,
            next_id: Arc::new(AtomicU8::new(0)),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Completes the pending call for `req_id`, if any.  Called by the
    /// client's receive pump.
    pub(crate) fn complete(&self, req_id: u8, reply: FsReply) {
        let sender = self.pending.lock().expect("lock poisoned").remove(&req_id);
        match sender {
            Some(tx) => {
                let _ = tx.send(reply);
            }
            None => debug!(req_id, "filesystem response for no pending call"),
        }
    }

    /// Drops every pending call; their awaiters see
    /// [`FsCallError::TransportClosed`].
    pub(crate) fn fail_all(&self) {
        self.pending.lock().expect("lock poisoned").clear();
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), FsCallError> {
        let payload = encode_packet(packet)?;
        let frame = encode_frame(&payload, &self.caps)?;
        self.transport.send(&frame).await?;
        Ok(())
    }

    /// Registers a fresh id and parks the reply channel for it.
    fn register(&self) -> Result<(u8, oneshot::Receiver<FsReply>), FsCallError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.park(id)
    }

    fn park(&self, id: u8) -> Result<(u8, oneshot::Receiver<FsReply>), FsCallError> {
        let mut pending = self.pending.lock().expect("lock poisoned");
        if pending.contains_key(&id) {
            return Err(FsCallError::Busy(id));
        }
        let (tx, rx) = oneshot::channel();
        pending.insert(id, tx);
        Ok((id, rx))
    }

    async fn call(&self, call: FsCall) -> Result<(u8, FsReply), FsCallError> {
        if !self.caps.filesystem() {
            return Err(FsCallError::Unsupported);
        }
        let (id, rx) = self.register()?;
        let packet = Packet {
            window: self.window,
            body: PacketBody::FsRequest(FsRequest { req_id: id, call }),
        };
        if let Err(e) = self.send_packet(&packet).await {
            self.pending.lock().expect("lock poisoned").remove(&id);
            return Err(e);
        }
        let reply = rx.await.map_err(|_| FsCallError::TransportClosed)?;
        Ok((id, reply))
    }

    fn expect_response(op_hint: u8, reply: FsReply) -> Result<FsResponseBody, FsCallError> {
        match reply {
            FsReply::Response(r) => Ok(r.body),
            FsReply::Data(_) => Err(FsCallError::UnexpectedResponse(op_hint)),
        }
    }

    async fn boolean_call(&self, call: FsCall) -> Result<bool, FsCallError> {
        let op = call.op_code();
        let (_, reply) = self.call(call).await?;
        match Self::expect_response(op, reply)? {
            FsResponseBody::Boolean(Some(value)) => Ok(value),
            FsResponseBody::Boolean(None) => {
                Err(FsCallError::Remote("operation failed".to_string()))
            }
            _ => Err(FsCallError::UnexpectedResponse(op)),
        }
    }

    async fn number_call(&self, call: FsCall) -> Result<u32, FsCallError> {
        let op = call.op_code();
        let (_, reply) = self.call(call).await?;
        match Self::expect_response(op, reply)? {
            FsResponseBody::Number(FS_NUMBER_ERROR) => {
                Err(FsCallError::Remote("operation failed".to_string()))
            }
            FsResponseBody::Number(value) => Ok(value),
            _ => Err(FsCallError::UnexpectedResponse(op)),
        }
    }

    async fn strings_call(&self, call: FsCall) -> Result<Vec<String>, FsCallError> {
        let op = call.op_code();
        let (_, reply) = self.call(call).await?;
        match Self::expect_response(op, reply)? {
            FsResponseBody::Strings(entries) => Ok(entries),
            _ => Err(FsCallError::UnexpectedResponse(op)),
        }
    }

    async fn void_call(&self, call: FsCall) -> Result<(), FsCallError> {
        let op = call.op_code();
        let (_, reply) = self.call(call).await?;
        match Self::expect_response(op, reply)? {
            FsResponseBody::Void { error } if error.is_empty() => Ok(()),
            FsResponseBody::Void { error } => Err(FsCallError::Remote(error)),
            _ => Err(FsCallError::UnexpectedResponse(op)),
        }
    }

    // ── Typed API ─────────────────────────────────────────────────────────────

    pub async fn exists(&self, path: &str) -> Result<bool, FsCallError> {
        self.boolean_call(FsCall::Exists(path.to_string())).await
    }

    pub async fn is_dir(&self, path: &str) -> Result<bool, FsCallError> {
        self.boolean_call(FsCall::IsDir(path.to_string())).await
    }

    pub async fn is_read_only(&self, path: &str) -> Result<bool, FsCallError> {
        self.boolean_call(FsCall::IsReadOnly(path.to_string())).await
    }

    pub async fn size(&self, path: &str) -> Result<u32, FsCallError> {
        self.number_call(FsCall::GetSize(path.to_string())).await
    }

    pub async fn capacity(&self, path: &str) -> Result<u32, FsCallError> {
        self.number_call(FsCall::GetCapacity(path.to_string())).await
    }

    pub async fn free_space(&self, path: &str) -> Result<u32, FsCallError> {
        self.number_call(FsCall::GetFreeSpace(path.to_string())).await
    }

    pub async fn drive(&self, path: &str) -> Result<String, FsCallError> {
        let mut entries = self.strings_call(FsCall::GetDrive(path.to_string())).await?;
        match entries.first().map(String::as_str) {
            Some("") | None => Err(FsCallError::Remote("operation failed".to_string())),
            Some(_) => Ok(entries.remove(0)),
        }
    }

    pub async fn list(&self, path: &str) -> Result<Vec<String>, FsCallError> {
        self.strings_call(FsCall::List(path.to_string())).await
    }

    pub async fn find(&self, pattern: &str) -> Result<Vec<String>, FsCallError> {
        self.strings_call(FsCall::Find(pattern.to_string())).await
    }

    pub async fn attributes(&self, path: &str) -> Result<FileAttributes, FsCallError> {
        let op = 8;
        let (_, reply) = self.call(FsCall::Attributes(path.to_string())).await?;
        match Self::expect_response(op, reply)? {
            FsResponseBody::Attributes(attrs) => match attrs.error {
                FsErrorCode::Ok => Ok(attrs),
                FsErrorCode::NoEntry => {
                    Err(FsCallError::Remote(format!("/{path}: No such file")))
                }
                FsErrorCode::Failure => {
                    Err(FsCallError::Remote("operation failed".to_string()))
                }
            },
            _ => Err(FsCallError::UnexpectedResponse(op)),
        }
    }

    pub async fn make_dir(&self, path: &str) -> Result<(), FsCallError> {
        self.void_call(FsCall::MakeDir(path.to_string())).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), FsCallError> {
        self.void_call(FsCall::Delete(path.to_string())).await
    }

    pub async fn copy(&self, from: &str, to: &str) -> Result<(), FsCallError> {
        self.void_call(FsCall::Copy(from.to_string(), to.to_string()))
            .await
    }

    pub async fn rename(&self, from: &str, to: &str) -> Result<(), FsCallError> {
        self.void_call(FsCall::Move(from.to_string(), to.to_string()))
            .await
    }

    /// Reads a whole file; the server answers on kind 9.
    pub async fn read_file(&self, path: &str, binary: bool) -> Result<Vec<u8>, FsCallError> {
        let mode = if binary {
            OpenMode::READ_BINARY
        } else {
            OpenMode::READ
        };
        let (_, reply) = self
            .call(FsCall::Open {
                path: path.to_string(),
                mode,
            })
            .await?;
        match reply {
            FsReply::Data(data) if data.is_error => Err(FsCallError::Remote(
                String::from_utf8_lossy(&data.payload).into_owned(),
            )),
            FsReply::Data(data) => Ok(data.payload),
            FsReply::Response(_) => Err(FsCallError::UnexpectedResponse(mode.op_code())),
        }
    }

    /// Writes a whole file: open ack on kind 8, contents shipped on kind 9,
    /// confirmation awaited on op 17.
    pub async fn write_file(
        &self,
        path: &str,
        data: &[u8],
        mode: OpenMode,
    ) -> Result<(), FsCallError> {
        if !mode.is_write_class() {
            return Err(FsCallError::NotWriteMode(mode));
        }
        let (id, reply) = self
            .call(FsCall::Open {
                path: path.to_string(),
                mode,
            })
            .await?;
        match Self::expect_response(mode.op_code(), reply)? {
            FsResponseBody::Void { error } if error.is_empty() => {}
            FsResponseBody::Void { error } => return Err(FsCallError::Remote(error)),
            _ => return Err(FsCallError::UnexpectedResponse(mode.op_code())),
        }

        // Commit under the open call's id; the handle table is keyed by it.
        let (_, rx) = self.park(id)?;
        let packet = Packet {
            window: self.window,
            body: PacketBody::FsData(FsData {
                is_error: false,
                req_id: id,
                payload: data.to_vec(),
            }),
        };
        if let Err(e) = self.send_packet(&packet).await {
            self.pending.lock().expect("lock poisoned").remove(&id);
            return Err(e);
        }
        let reply = rx.await.map_err(|_| FsCallError::TransportClosed)?;
        match Self::expect_response(OpenMode::WRITE.op_code(), reply)? {
            FsResponseBody::Void { error } if error.is_empty() => Ok(()),
            FsResponseBody::Void { error } => Err(FsCallError::Remote(error)),
            _ => Err(FsCallError::UnexpectedResponse(OpenMode::WRITE.op_code())),
        }
    }
}
