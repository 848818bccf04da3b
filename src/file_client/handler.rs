//! Inbound file-client handler (`SPEC_FULL.md` §4.4.2).
//!
//! Dispatches an inbound message on the `FileClient` channel into the
//! matching local node's rendezvous slots.

use crate::error::FileResult;
use crate::transport::NodeId;
use crate::wire::file_ops::{FileClientInbound, decode_file_client_inbound};

use super::ops::FileClient;

/// Handles one inbound payload addressed to `local` on the file-client
/// channel. Structural decode failures and recognized-but-unhandled
/// opcodes are logged and otherwise ignored.
pub fn handle_file_client_inbound(file_client: &FileClient, local: NodeId, payload: &[u8]) {
    match decode_file_client_inbound(payload) {
        Ok(FileClientInbound::Ack { error, position }) => {
            if let Ok((slot, _)) = file_client.slot(local) {
                slot.pending_ack.publish(error, position);
            } else {
                log::warn!("Ack for unknown local node {local}");
            }
        }
        Ok(FileClientInbound::Data {
            error,
            position,
            total,
            data,
        }) => {
            let Ok((slot, _)) = file_client.slot(local) else {
                log::warn!("Data for unknown local node {local}");
                return;
            };
            let rendezvous = &slot.pending_read;
            let accepted = rendezvous.is_active()
                && !rendezvous.is_ready()
                && total as usize == data.len()
                && total <= rendezvous.requested()
                && position == rendezvous.expected_position();
            if accepted {
                rendezvous.accept(data, total, error, position);
            } else {
                log::warn!(
                    "rejecting Data frame: active={} total={} data_len={} requested={} position={} expected={}",
                    rendezvous.is_active(),
                    total,
                    data.len(),
                    rendezvous.requested(),
                    position,
                    rendezvous.expected_position()
                );
                rendezvous.reject(FileResult::NetworkError.into());
            }
        }
        Ok(FileClientInbound::Unhandled(opcode)) => {
            log::trace!("file-client: unhandled opcode {opcode:?}");
        }
        Err(e) => {
            log::warn!("dropping malformed file-client record: {e}");
        }
    }
}
