//! Server side of the remote filesystem bridge.
//!
//! Kind-7 requests are dispatched against a [`HostFs`] implementation and
//! answered with the typed kind-8/kind-9 shapes.  Failures never cross the
//! trait boundary as errors — each response shape has its own error
//! sentinel (byte 2 for booleans, `0xFFFFFFFF` for numbers, an empty list
//! for string results, an error string for void ops), which is what the
//! client-side bridge decodes back into failures.
//!
//! # The write-handle table
//!
//! Opening a file for writing is a two-phase exchange.  The open request is
//! acknowledged on kind-8 and remembered in a write-handle table keyed by
//! request id; the client then ships the entire contents in a kind-9 packet,
//! which commits the write and produces the final kind-8 confirmation
//! (op 17).

pub mod memory;

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use rawterm_core::protocol::messages::{
    FileAttributes, FsCall, FsData, FsErrorCode, FsRequest, FsResponse, FsResponseBody, OpenMode,
    Packet, PacketBody, WindowId, FS_NUMBER_ERROR,
};

pub use memory::MemoryFs;

/// Errors surfaced by a [`HostFs`] implementation.
#[derive(Debug, Error, PartialEq)]
pub enum FsError {
    #[error("/{0}: No such file")]
    NotFound(String),

    #[error("/{0}: Access denied")]
    AccessDenied(String),

    #[error("{0}")]
    Other(String),
}

/// Attribute record returned by [`HostFs::attributes`].
///
/// Timestamps are milliseconds since the Unix epoch; hosts without clocks
/// report zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FsAttributes {
    pub size: u64,
    pub created: u64,
    pub modified: u64,
    pub is_dir: bool,
    pub is_read_only: bool,
}

/// The host filesystem the server exposes to clients.
///
/// Paths arrive as the client sent them; implementations normalize.  The
/// production implementation wraps whatever the embedder mounts; tests use
/// [`MemoryFs`].
pub trait HostFs: Send + Sync {
    fn exists(&self, path: &str) -> bool;
    fn is_dir(&self, path: &str) -> bool;
    fn is_read_only(&self, path: &str) -> bool;
    fn size(&self, path: &str) -> Result<u64, FsError>;
    fn drive(&self, path: &str) -> Result<String, FsError>;
    fn capacity(&self, path: &str) -> Result<u64, FsError>;
    fn free_space(&self, path: &str) -> Result<u64, FsError>;
    fn list(&self, path: &str) -> Result<Vec<String>, FsError>;
    fn attributes(&self, path: &str) -> Result<FsAttributes, FsError>;
    fn find(&self, pattern: &str) -> Result<Vec<String>, FsError>;
    fn make_dir(&self, path: &str) -> Result<(), FsError>;
    fn delete(&self, path: &str) -> Result<(), FsError>;
    fn copy(&self, from: &str, to: &str) -> Result<(), FsError>;
    fn rename(&self, from: &str, to: &str) -> Result<(), FsError>;
    fn read(&self, path: &str) -> Result<Vec<u8>, FsError>;
    fn write(&self, path: &str, data: &[u8], append: bool) -> Result<(), FsError>;
}

/// A pending open-for-write, keyed by request id.
#[derive(Debug, Clone)]
struct FileWriteBuffer {
    path: String,
    mode: OpenMode,
}

/// Dispatches filesystem packets against a [`HostFs`].
pub struct FsDispatcher<F> {
    host: F,
    write_handles: HashMap<u8, FileWriteBuffer>,
}

impl<F: HostFs> FsDispatcher<F> {
    pub fn new(host: F) -> Self {
        Self {
            host,
            write_handles: HashMap::new(),
        }
    }

    pub fn host(&self) -> &F {
        &self.host
    }

    /// Answers one kind-7 request with a kind-8 (or, for open-for-read, a
    /// kind-9) packet.
    pub fn handle_request(&mut self, window: WindowId, request: &FsRequest) -> Packet {
        let req_id = request.req_id;
        let op = request.call.op_code();
        let body = match &request.call {
            FsCall::Exists(path) => FsResponseBody::Boolean(Some(self.host.exists(path))),
            FsCall::IsDir(path) => FsResponseBody::Boolean(Some(self.host.is_dir(path))),
            FsCall::IsReadOnly(path) => {
                FsResponseBody::Boolean(Some(self.host.is_read_only(path)))
            }
            FsCall::GetSize(path) => number_body(self.host.size(path)),
            FsCall::GetCapacity(path) => number_body(self.host.capacity(path)),
            FsCall::GetFreeSpace(path) => number_body(self.host.free_space(path)),
            FsCall::GetDrive(path) => {
                strings_body(self.host.drive(path).map(|drive| vec![drive]))
            }
            FsCall::List(path) => strings_body(self.host.list(path)),
            FsCall::Find(pattern) => strings_body(self.host.find(pattern)),
            FsCall::Attributes(path) => FsResponseBody::Attributes(match self.host.attributes(path)
            {
                Ok(attrs) => FileAttributes {
                    size: attrs.size.min(u32::MAX as u64) as u32,
                    created: attrs.created,
                    modified: attrs.modified,
                    is_dir: attrs.is_dir,
                    is_read_only: attrs.is_read_only,
                    error: FsErrorCode::Ok,
                },
                Err(FsError::NotFound(_)) => FileAttributes {
                    error: FsErrorCode::NoEntry,
                    ..FileAttributes::default()
                },
                Err(_) => FileAttributes {
                    error: FsErrorCode::Failure,
                    ..FileAttributes::default()
                },
            }),
            FsCall::MakeDir(path) => void_body(self.host.make_dir(path)),
            FsCall::Delete(path) => void_body(self.host.delete(path)),
            FsCall::Copy(from, to) => void_body(self.host.copy(from, to)),
            FsCall::Move(from, to) => void_body(self.host.rename(from, to)),
            FsCall::Open { path, mode } => {
                return self.handle_open(window, req_id, path, *mode);
            }
        };
        Packet {
            window,
            body: PacketBody::FsResponse(FsResponse { op, req_id, body }),
        }
    }

    fn handle_open(
        &mut self,
        window: WindowId,
        req_id: u8,
        path: &str,
        mode: OpenMode,
    ) -> Packet {
        if mode.is_write_class() {
            // Validate now so the failure arrives on the open ack rather
            // than after the client has shipped the contents.
            let error = if self.host.is_read_only(path) {
                FsError::AccessDenied(path.trim_matches('/').to_string()).to_string()
            } else {
                self.write_handles.insert(
                    req_id,
                    FileWriteBuffer {
                        path: path.to_string(),
                        mode,
                    },
                );
                String::new()
            };
            Packet {
                window,
                body: PacketBody::FsResponse(FsResponse {
                    op: mode.op_code(),
                    req_id,
                    body: FsResponseBody::Void { error },
                }),
            }
        } else {
            // Read class: the whole file travels back on kind 9.
            let (is_error, payload) = match self.host.read(path) {
                Ok(data) => (false, data),
                Err(e) => (true, e.to_string().into_bytes()),
            };
            Packet {
                window,
                body: PacketBody::FsData(FsData {
                    is_error,
                    req_id,
                    payload,
                }),
            }
        }
    }

    /// Commits a client's kind-9 write against its open handle and builds
    /// the op-17 confirmation.  Data for an unknown request id is ignored.
    pub fn handle_data(&mut self, window: WindowId, data: &FsData) -> Option<Packet> {
        let Some(handle) = self.write_handles.remove(&data.req_id) else {
            debug!(req_id = data.req_id, "file data for unknown write handle");
            return None;
        };
        let result = self
            .host
            .write(&handle.path, &data.payload, handle.mode.is_append());
        Some(Packet {
            window,
            body: PacketBody::FsResponse(FsResponse {
                op: OpenMode::WRITE.op_code(),
                req_id: data.req_id,
                body: void_body(result),
            }),
        })
    }
}

fn number_body(result: Result<u64, FsError>) -> FsResponseBody {
    FsResponseBody::Number(match result {
        Ok(n) => n.min((FS_NUMBER_ERROR - 1) as u64) as u32,
        Err(_) => FS_NUMBER_ERROR,
    })
}

fn strings_body(result: Result<Vec<String>, FsError>) -> FsResponseBody {
    FsResponseBody::Strings(result.unwrap_or_default())
}

fn void_body(result: Result<(), FsError>) -> FsResponseBody {
    FsResponseBody::Void {
        error: match result {
            Ok(()) => String::new(),
            Err(e) => e.to_string(),
        },
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher() -> FsDispatcher<MemoryFs> {
        let fs = MemoryFs::new();
        fs.seed_file("startup.lua", b"print('hi')");
        fs.seed_file("rom/programs/shell.lua", b"-- shell");
        FsDispatcher::new(fs)
    }

    fn request(req_id: u8, call: FsCall) -> FsRequest {
        FsRequest { req_id, call }
    }

    fn response_body(packet: Packet) -> FsResponseBody {
        match packet.body {
            PacketBody::FsResponse(r) => r.body,
            other => panic!("expected kind-8, got {other:?}"),
        }
    }

    #[test]
    fn test_exists_answers_boolean() {
        let mut d = dispatcher();
        let packet = d.handle_request(0, &request(0, FsCall::Exists("startup.lua".into())));
        assert_eq!(response_body(packet), FsResponseBody::Boolean(Some(true)));

        let packet = d.handle_request(0, &request(1, FsCall::Exists("missing".into())));
        assert_eq!(response_body(packet), FsResponseBody::Boolean(Some(false)));
    }

    #[test]
    fn test_size_uses_number_sentinel_on_error() {
        let mut d = dispatcher();
        let packet = d.handle_request(0, &request(2, FsCall::GetSize("startup.lua".into())));
        assert_eq!(response_body(packet), FsResponseBody::Number(11));

        let packet = d.handle_request(0, &request(3, FsCall::GetSize("missing".into())));
        assert_eq!(response_body(packet), FsResponseBody::Number(FS_NUMBER_ERROR));
    }

    #[test]
    fn test_list_returns_entries_and_empty_on_error() {
        let mut d = dispatcher();
        let packet = d.handle_request(0, &request(4, FsCall::List(String::new())));
        match response_body(packet) {
            FsResponseBody::Strings(entries) => {
                assert!(entries.contains(&"startup.lua".to_string()));
                assert!(entries.contains(&"rom".to_string()));
            }
            other => panic!("expected strings, got {other:?}"),
        }

        let packet = d.handle_request(0, &request(5, FsCall::List("nope".into())));
        assert_eq!(response_body(packet), FsResponseBody::Strings(vec![]));
    }

    #[test]
    fn test_attributes_error_codes() {
        let mut d = dispatcher();
        let packet = d.handle_request(0, &request(6, FsCall::Attributes("startup.lua".into())));
        match response_body(packet) {
            FsResponseBody::Attributes(attrs) => {
                assert_eq!(attrs.size, 11);
                assert_eq!(attrs.error, FsErrorCode::Ok);
                assert!(!attrs.is_dir);
            }
            other => panic!("expected attributes, got {other:?}"),
        }

        let packet = d.handle_request(0, &request(7, FsCall::Attributes("missing".into())));
        match response_body(packet) {
            FsResponseBody::Attributes(attrs) => assert_eq!(attrs.error, FsErrorCode::NoEntry),
            other => panic!("expected attributes, got {other:?}"),
        }
    }

    #[test]
    fn test_open_read_ships_contents_on_kind_nine() {
        let mut d = dispatcher();
        let packet = d.handle_request(
            0,
            &request(
                8,
                FsCall::Open {
                    path: "startup.lua".into(),
                    mode: OpenMode::READ,
                },
            ),
        );
        match packet.body {
            PacketBody::FsData(data) => {
                assert!(!data.is_error);
                assert_eq!(data.req_id, 8);
                assert_eq!(data.payload, b"print('hi')");
            }
            other => panic!("expected kind-9, got {other:?}"),
        }
    }

    #[test]
    fn test_open_read_missing_file_is_kind_nine_error() {
        let mut d = dispatcher();
        let packet = d.handle_request(
            0,
            &request(
                9,
                FsCall::Open {
                    path: "missing.lua".into(),
                    mode: OpenMode::READ_BINARY,
                },
            ),
        );
        match packet.body {
            PacketBody::FsData(data) => {
                assert!(data.is_error);
                assert!(String::from_utf8_lossy(&data.payload).contains("No such file"));
            }
            other => panic!("expected kind-9, got {other:?}"),
        }
    }

    #[test]
    fn test_write_flow_acknowledges_then_commits() {
        let mut d = dispatcher();
        let packet = d.handle_request(
            0,
            &request(
                10,
                FsCall::Open {
                    path: "new.txt".into(),
                    mode: OpenMode::WRITE,
                },
            ),
        );
        assert_eq!(
            response_body(packet),
            FsResponseBody::Void {
                error: String::new()
            }
        );

        let confirm = d
            .handle_data(
                0,
                &FsData {
                    is_error: false,
                    req_id: 10,
                    payload: b"contents".to_vec(),
                },
            )
            .expect("commit must produce a confirmation");
        match confirm.body {
            PacketBody::FsResponse(r) => {
                assert_eq!(r.op, 17);
                assert_eq!(r.req_id, 10);
                assert_eq!(
                    r.body,
                    FsResponseBody::Void {
                        error: String::new()
                    }
                );
            }
            other => panic!("expected kind-8, got {other:?}"),
        }
        assert_eq!(d.host().read("new.txt").unwrap(), b"contents");
    }

    #[test]
    fn test_append_mode_appends() {
        let mut d = dispatcher();
        d.handle_request(
            0,
            &request(
                11,
                FsCall::Open {
                    path: "startup.lua".into(),
                    mode: OpenMode::APPEND,
                },
            ),
        );
        d.handle_data(
            0,
            &FsData {
                is_error: false,
                req_id: 11,
                payload: b"\nos.reboot()".to_vec(),
            },
        );
        assert_eq!(d.host().read("startup.lua").unwrap(), b"print('hi')\nos.reboot()");
    }

    #[test]
    fn test_write_to_read_only_path_fails_on_open() {
        let mut d = dispatcher();
        let packet = d.handle_request(
            0,
            &request(
                12,
                FsCall::Open {
                    path: "rom/evil.lua".into(),
                    mode: OpenMode::WRITE,
                },
            ),
        );
        match response_body(packet) {
            FsResponseBody::Void { error } => assert!(error.contains("Access denied")),
            other => panic!("expected void, got {other:?}"),
        }
        // No handle was registered, so a commit attempt is ignored.
        assert!(d
            .handle_data(
                0,
                &FsData {
                    is_error: false,
                    req_id: 12,
                    payload: vec![],
                }
            )
            .is_none());
    }

    #[test]
    fn test_data_for_unknown_handle_is_ignored() {
        let mut d = dispatcher();
        assert!(d
            .handle_data(
                0,
                &FsData {
                    is_error: false,
                    req_id: 99,
                    payload: b"orphan".to_vec(),
                }
            )
            .is_none());
    }
}
