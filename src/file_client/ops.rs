//! File Client Operations: Open/Read/Write/Seek/Tell/Size/Close, the
//! synchronous request/ack primitive, and chunked Read.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::delay::Delay;
use crate::directory::{ActiveNodesCursor, NodeDirectory, NodeShortName};
use crate::error::FileResult;
use crate::transport::{BROADCAST, Channel, NodeId, Priority, TransportSender};
use crate::wire::file_ops::{
    DATA_HEADER_SIZE, encode_ack_size_request, encode_close, encode_lseek, encode_open,
    encode_read, encode_write,
};

use super::slot::FileClientSlot;

/// File access mode, passed through to the server verbatim on `Open`.
pub type FileAccessMode = u16;

/// Per-process file-client engine: one [`FileClientSlot`] per local node.
pub struct FileClient {
    slots: Vec<FileClientSlot>,
    directory: Arc<NodeDirectory>,
    transport: Arc<dyn TransportSender>,
    delay: Arc<dyn Delay>,
    config: EngineConfig,
}

impl FileClient {
    pub fn new(
        directory: Arc<NodeDirectory>,
        transport: Arc<dyn TransportSender>,
        delay: Arc<dyn Delay>,
        config: EngineConfig,
    ) -> Self {
        let slots = (0..config.max_own_nodes())
            .map(|_| FileClientSlot::default())
            .collect();
        FileClient {
            slots,
            directory,
            transport,
            delay,
            config,
        }
    }

    pub(crate) fn slot(&self, local: NodeId) -> Result<(&FileClientSlot, usize), FileResult> {
        let idx = self
            .directory
            .my_index(local)
            .ok_or(FileResult::NodeOffline)? as usize;
        Ok((&self.slots[idx], idx))
    }

    /// Current logical cursor for `local` (0 if the slot doesn't exist).
    pub fn tell(&self, local: NodeId) -> u32 {
        match self.slot(local) {
            Ok((slot, _)) => slot.file_cursor(),
            Err(_) => 0,
        }
    }

    /// The file server currently bound to `local`, or `NodeShortName::NONE`.
    pub fn get_server(&self, local: NodeId) -> NodeShortName {
        match self.slot(local) {
            Ok((slot, _)) if slot.is_bound() => self.directory.node_by_id(slot.bound_server()),
            _ => NodeShortName::NONE,
        }
    }

    /// Scans the directory for the first active `file_server`-capable node.
    pub fn find_file_server(&self, cursor: &mut ActiveNodesCursor) -> NodeShortName {
        self.directory.find_file_server(cursor)
    }

    /// `SPEC_FULL.md` §4.4.1: three attempts, each clearing the ack slot,
    /// sending, then polling with a 1 ms delay up to `file_timeout_ms`.
    /// Send failures return immediately with no retry.
    fn request_ack(&self, local: NodeId, server: NodeId, record: &[u8]) -> (FileResult, u32) {
        let Ok((slot, _)) = self.slot(local) else {
            return (FileResult::NodeOffline, 0);
        };
        for _attempt in 0..3 {
            slot.pending_ack.clear();
            let send = self
                .transport
                .send(local, server, Channel::FileClient, Priority::Low, record);
            if send != crate::error::SendResult::Ok {
                return (send.into_file_result(), 0);
            }
            let mut waited_ms: u32 = 0;
            loop {
                if let Some((error, position)) = slot.pending_ack.poll() {
                    let result = FileResult::from_wire(error);
                    if result != FileResult::NetworkError {
                        return (result, position);
                    }
                    // NetworkError reported by the remote side is transient; retry.
                    break;
                }
                if waited_ms >= self.config.file_timeout_ms() {
                    break;
                }
                self.delay.delay_ms(1);
                waited_ms += 1;
            }
        }
        (FileResult::NetworkTimeout, 0)
    }

    /// `SPEC_FULL.md` §4.4 `Open`.
    pub fn open(
        &self,
        name: &[u8],
        mode: FileAccessMode,
        local: NodeId,
        mut server_hint: NodeId,
    ) -> FileResult {
        if server_hint == BROADCAST {
            let mut cursor = ActiveNodesCursor::default();
            let found = self.find_file_server(&mut cursor);
            if found.is_none() {
                return FileResult::NodeOffline;
            }
            server_hint = found.node_id;
        }
        let Ok((slot, _)) = self.slot(local) else {
            return FileResult::NodeOffline;
        };
        slot.set_bound_server(server_hint);
        let record = encode_open(mode, name);
        let (result, _position) = self.request_ack(local, server_hint, &record);
        if matches!(
            result,
            FileResult::NetworkBusy
                | FileResult::NetworkError
                | FileResult::NetworkTimeout
                | FileResult::MemoryFull
        ) {
            slot.set_bound_server(BROADCAST);
        }
        result
    }

    /// `SPEC_FULL.md` §4.4 `Read`.
    pub fn read(&self, buf: &mut [u8], n: u16, local: NodeId) -> (FileResult, u16) {
        let Ok((slot, _)) = self.slot(local) else {
            return (FileResult::NodeOffline, 0);
        };
        if !slot.is_bound() {
            return (FileResult::FileNotOpened, 0);
        }
        let server = slot.bound_server();
        if !self.directory.node_by_id(server).file_server {
            return (FileResult::NodeOffline, 0);
        }

        let max_chunk = self
            .config
            .object_data_size()
            .saturating_sub(DATA_HEADER_SIZE)
            .min(i16::MAX as u16);
        let n = n.min(buf.len() as u16);
        let mut progress: u16 = 0;
        let mut attempts = 0u8;
        let mut result = FileResult::Ok;

        while progress < n {
            let chunk = max_chunk.min(n - progress);
            let position = slot.file_cursor() + progress as u32;
            slot.pending_read.arm(chunk, position);
            let record = encode_read(chunk, position);
            let send = self
                .transport
                .send(local, server, Channel::FileClient, Priority::Low, &record);
            if send != crate::error::SendResult::Ok {
                result = send.into_file_result();
                break;
            }

            let mut waited_ms = 0u32;
            loop {
                if slot.pending_read.is_ready() {
                    break;
                }
                if waited_ms >= self.config.file_timeout_ms() {
                    break;
                }
                self.delay.delay_ms(1);
                waited_ms += 1;
            }

            if !slot.pending_read.is_ready() {
                attempts += 1;
                if attempts >= 3 {
                    result = FileResult::NetworkTimeout;
                    break;
                }
                continue;
            }

            let wire_error = slot.pending_read.error();
            let received = slot.pending_read.received();
            if wire_error != 0 {
                let mapped = FileResult::from_wire(wire_error);
                if mapped != FileResult::NetworkError {
                    result = mapped;
                    break;
                }
                attempts += 1;
                if attempts >= 3 {
                    result = FileResult::NetworkTimeout;
                    break;
                }
                continue;
            }

            let staged = slot.pending_read.take_staged();
            let end = progress as usize + staged.len();
            buf[progress as usize..end].copy_from_slice(&staged);
            progress += received;
            attempts = 0;
            if received < chunk {
                break; // server signalled EOF mid-chunk
            }
        }

        slot.advance_file_cursor(progress as u32);
        slot.pending_read.disarm();
        (result, progress)
    }

    /// `SPEC_FULL.md` §4.4 `Write`.
    ///
    /// Flagged in `SPEC_FULL.md` §9 item 1: the wire `Write` record never
    /// carries `buf`'s bytes; only the header (`to_write`, `position`) is
    /// sent. This mirrors the reference implementation's behavior exactly.
    pub fn write(&self, buf: &[u8], n: u16, local: NodeId) -> (FileResult, u16) {
        let Ok((slot, _)) = self.slot(local) else {
            return (FileResult::NodeOffline, 0);
        };
        if !slot.is_bound() {
            return (FileResult::FileNotOpened, 0);
        }
        let server = slot.bound_server();
        let n = n.min(buf.len() as u16);
        let record = encode_write(n, slot.file_cursor(), &buf[..n as usize]);
        let (result, position) = self.request_ack(local, server, &record);
        if result == FileResult::Ok {
            slot.set_file_cursor(position);
        }
        (result, if result == FileResult::Ok { n } else { 0 })
    }

    /// `SPEC_FULL.md` §4.4 `Lseek`. Sends the current cursor as a seek
    /// target (subject to the §9 item 2 size quirk) and, on ack, adopts
    /// the server's authoritative returned position.
    pub fn lseek(&self, local: NodeId) -> FileResult {
        let Ok((slot, _)) = self.slot(local) else {
            return FileResult::NodeOffline;
        };
        if !slot.is_bound() {
            return FileResult::FileNotOpened;
        }
        let server = slot.bound_server();
        let record = encode_lseek();
        let (result, position) = self.request_ack(local, server, &record);
        if result == FileResult::Ok {
            slot.set_file_cursor(position);
        }
        result
    }

    /// `SPEC_FULL.md` §4.4 `Tell`.
    pub fn file_cursor(&self, local: NodeId) -> u32 {
        self.tell(local)
    }

    /// `SPEC_FULL.md` §4.4 `Size`.
    pub fn size(&self, local: NodeId) -> u32 {
        let Ok((slot, _)) = self.slot(local) else {
            return 0;
        };
        if !slot.is_bound() {
            return 0;
        }
        let server = slot.bound_server();
        let record = encode_ack_size_request();
        let (result, position) = self.request_ack(local, server, &record);
        if result == FileResult::Ok { position } else { 0 }
    }

    /// `SPEC_FULL.md` §4.4 `Close`. Binds via `server_hint` first if
    /// unbound (the server may need to release state even for a handle we
    /// never successfully opened), then always clears the binding.
    pub fn close(&self, local: NodeId, server_hint: NodeId) -> FileResult {
        let Ok((slot, _)) = self.slot(local) else {
            return FileResult::NodeOffline;
        };
        let server = if slot.is_bound() {
            slot.bound_server()
        } else {
            server_hint
        };
        let record = encode_close();
        let (result, _position) = self.request_ack(local, server, &record);
        slot.set_bound_server(BROADCAST);
        result
    }
}
