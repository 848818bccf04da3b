//! Transport Facade: the message-sending interface this engine consumes,
//! and the inbound dispatch contract that delivers bus traffic to it.
//!
//! The CAN transport itself (fragmentation, reassembly, priorities,
//! reliable delivery) is out of scope for this crate — it is modeled here
//! as a trait, the way the teacher crate models its kernel channel behind
//! [`ReplySender`](https://docs.rs/fuser)-style `Send + Sync` traits rather
//! than baking mount/ioctl specifics into request handling.

use crate::error::SendResult;

/// The two named channels this engine's traffic travels on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(serde::Serialize, serde::Deserialize))]
pub enum Channel {
    /// File open/read/write/seek/close traffic.
    FileClient,
    /// Parameter descriptor/value traffic.
    Parameters,
}

/// Delivery priority for an outbound message. Both channels this engine
/// uses are reliable and low priority, per `SPEC_FULL.md` §4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(serde::Serialize, serde::Deserialize))]
pub enum Priority {
    Low,
}

/// A bus node identifier. `BROADCAST` (`0xFF`) means "unspecified".
pub type NodeId = u8;

/// `NodeId` meaning "no node" / "unspecified".
pub const BROADCAST: NodeId = 0xFF;

/// Sends typed messages to other bus nodes on behalf of a local node.
///
/// Implementations may be backed by a real CAN controller, a software bus
/// simulator, or (as this crate ships for tests and demos) an in-process
/// loopback. Send must not block past the point of handing the message to
/// the transport's own outbound queue.
pub trait TransportSender: Send + Sync {
    /// Sends `record` from `local_node` to `destination` on `channel`.
    fn send(
        &self,
        local_node: NodeId,
        destination: NodeId,
        channel: Channel,
        priority: Priority,
        record: &[u8],
    ) -> SendResult;
}

/// Delivers inbound `(channel, source_node, payload)` triples to this
/// engine's per-channel handlers.
///
/// `SPEC_FULL.md` §9 item 5 (REDESIGN FLAGS item 5 / spec.md §9 item 5):
/// handler implementations are permitted to call back into
/// [`TransportSender::send`] synchronously, from directly inside dispatch
/// — this engine's own parameter pump (`proceed_rx`) relies on that being
/// safe to do.
pub trait InboundDispatch {
    /// Invoked once per inbound message on `channel`, addressed to
    /// `local_node`, originating at `source`.
    fn dispatch(&self, local_node: NodeId, source: NodeId, channel: Channel, payload: &[u8]);
}
