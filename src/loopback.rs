//! In-process loopback transport: a [`TransportSender`]/[`InboundDispatch`]
//! implementation with no OS/bus dependency, for tests and the `demos/`
//! example binary.
//!
//! `SPEC_FULL.md` §4.2: the crate ships no real CAN transport; this is the
//! one concrete implementation it does ship, the way the teacher crate's
//! tests mock its kernel-channel trait rather than opening a real mount.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::SendResult;
use crate::transport::{BROADCAST, Channel, InboundDispatch, NodeId, Priority, TransportSender};

/// A shared in-memory bus. Nodes register an [`InboundDispatch`] and get
/// back a [`LoopbackSender`] bound to their own node id.
#[derive(Default)]
pub struct LoopbackBus {
    nodes: Mutex<HashMap<NodeId, Arc<dyn InboundDispatch + Send + Sync>>>,
}

impl LoopbackBus {
    pub fn new() -> Arc<Self> {
        Arc::new(LoopbackBus::default())
    }

    /// Registers `dispatch` to receive traffic addressed to `node`, and
    /// returns a sender that node can use to transmit.
    pub fn register(
        self: &Arc<Self>,
        node: NodeId,
        dispatch: Arc<dyn InboundDispatch + Send + Sync>,
    ) -> LoopbackSender {
        self.nodes.lock().insert(node, dispatch);
        LoopbackSender {
            bus: Arc::clone(self),
        }
    }

    pub fn unregister(&self, node: NodeId) {
        self.nodes.lock().remove(&node);
    }
}

/// A [`TransportSender`] bound to the bus it was registered on.
pub struct LoopbackSender {
    bus: Arc<LoopbackBus>,
}

impl TransportSender for LoopbackSender {
    fn send(
        &self,
        local_node: NodeId,
        destination: NodeId,
        channel: Channel,
        _priority: Priority,
        record: &[u8],
    ) -> SendResult {
        // Clone the target handles and drop the registry lock before
        // dispatching: `InboundDispatch` implementations are permitted to
        // call back into `send` from inside dispatch (spec.md §9 item 5),
        // which would deadlock against a non-reentrant lock held here.
        let targets: Vec<(NodeId, Arc<dyn InboundDispatch + Send + Sync>)> = {
            let nodes = self.bus.nodes.lock();
            if destination == BROADCAST {
                nodes
                    .iter()
                    .filter(|(&id, _)| id != local_node)
                    .map(|(&id, d)| (id, Arc::clone(d)))
                    .collect()
            } else {
                match nodes.get(&destination) {
                    Some(d) => vec![(destination, Arc::clone(d))],
                    None => return SendResult::NetworkError,
                }
            }
        };
        for (id, dispatch) in targets {
            dispatch.dispatch(id, local_node, channel, record);
        }
        SendResult::Ok
    }
}
