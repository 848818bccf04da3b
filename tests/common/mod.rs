//! Shared test support: a toy remote file server answering just enough of
//! the wire protocol to drive the public `Engine`/`FileClient` API from the
//! outside, the way a real test would have to (this crate's wire codec is
//! `pub(crate)`, so external tests hand-encode/decode the same shapes).

use std::sync::Arc;

use parking_lot::Mutex;

use can_node_engine::transport::{Channel, InboundDispatch, NodeId, Priority, TransportSender};

const OP_OPEN: u16 = 1;
const OP_READ: u16 = 2;
const OP_CLOSE: u16 = 4;
const OP_ACK: u16 = 5;
const OP_DATA: u16 = 7;
const OP_ACK_SIZE: u16 = 8;

pub fn encode_ack(error: u16, position: u32) -> Vec<u8> {
    let mut v = Vec::with_capacity(8);
    v.extend_from_slice(&OP_ACK.to_le_bytes());
    v.extend_from_slice(&error.to_le_bytes());
    v.extend_from_slice(&position.to_le_bytes());
    v
}

pub fn encode_data(error: u16, position: u32, total: u16, data: &[u8]) -> Vec<u8> {
    let mut v = Vec::with_capacity(10 + data.len());
    v.extend_from_slice(&OP_DATA.to_le_bytes());
    v.extend_from_slice(&error.to_le_bytes());
    v.extend_from_slice(&position.to_le_bytes());
    v.extend_from_slice(&total.to_le_bytes());
    v.extend_from_slice(data);
    v
}

/// A toy remote file server: serves one fixed file's contents to whichever
/// client opens it. Not part of the library (which only implements the
/// client side of the file protocol) — test/demo glue only.
pub struct ToyFileServer {
    node_id: NodeId,
    transport: Mutex<Option<Arc<dyn TransportSender>>>,
    contents: Vec<u8>,
    /// Number of `Read` requests to silently drop before finally replying,
    /// for exercising the timeout/retry path (spec.md §8 scenario D).
    drop_reads: Mutex<u32>,
}

impl ToyFileServer {
    pub fn new(contents: &[u8], node_id: NodeId) -> Arc<Self> {
        Arc::new(ToyFileServer {
            node_id,
            transport: Mutex::new(None),
            contents: contents.to_vec(),
            drop_reads: Mutex::new(0),
        })
    }

    /// Registers this server on `bus` and remembers the sender it gets
    /// back, so its dispatch handler can reply.
    pub fn attach(self: &Arc<Self>, bus: &Arc<can_node_engine::loopback::LoopbackBus>) {
        let sender = bus.register(self.node_id, self.clone());
        *self.transport.lock() = Some(Arc::new(sender));
    }

    /// Drops the next `n` `Read` requests without replying, to exercise the
    /// client's timeout/retry path.
    pub fn drop_next_reads(&self, n: u32) {
        *self.drop_reads.lock() = n;
    }

    fn reply(&self, to: NodeId, record: &[u8]) {
        if let Some(t) = self.transport.lock().as_ref() {
            let _ = t.send(self.node_id, to, Channel::FileClient, Priority::Low, record);
        }
    }
}

impl InboundDispatch for ToyFileServer {
    fn dispatch(&self, _local_node: NodeId, source: NodeId, channel: Channel, payload: &[u8]) {
        if channel != Channel::FileClient || payload.len() < 2 {
            return;
        }
        let op = u16::from_le_bytes([payload[0], payload[1]]);
        match op {
            OP_OPEN => self.reply(source, &encode_ack(0, 0)),
            OP_CLOSE => self.reply(source, &encode_ack(0, 0)),
            OP_ACK_SIZE => self.reply(source, &encode_ack(0, self.contents.len() as u32)),
            OP_READ => {
                if payload.len() < 8 {
                    return;
                }
                let to_read = u16::from_le_bytes([payload[2], payload[3]]);
                let position =
                    u32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]);
                {
                    let mut drop = self.drop_reads.lock();
                    if *drop > 0 {
                        *drop -= 1;
                        return;
                    }
                }
                let pos = position as usize;
                let avail = self.contents.len().saturating_sub(pos);
                let total = avail.min(to_read as usize) as u16;
                let data = &self.contents[pos..pos + total as usize];
                self.reply(source, &encode_data(0, position, total, data));
            }
            _ => {}
        }
    }
}
