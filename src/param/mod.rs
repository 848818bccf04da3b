//! Parameter subsystem (`SPEC_FULL.md` §4.5/§4.6): data model, serving of
//! this node's own directories, the asynchronous client queue, and
//! (optionally) INI-style text parsing.

pub mod model;
mod queue;
mod serve;
#[cfg(feature = "text-parsing")]
pub mod text;

pub use model::{ParamType, ParameterAddress, ParameterDirectory, ParameterValue, ValueType};
pub use queue::ParamClientQueue;
pub use serve::{ParamInfoSize, ParamServer};

use crate::transport::{Channel, NodeId, Priority, TransportSender};
use crate::wire::param_ops::{ParamInbound, decode_param_inbound, split_literals};

/// `SPEC_FULL.md` §4.5 `proceed_param`: the single inbound dispatch point
/// for the parameter channel.
///
/// Serves requests targeting `server`'s own directories and correlates
/// replies into `queue`'s mirrors. After any dispatch — whether it served
/// a remote peer's request or correlated a reply to our own outstanding
/// one — `queue`'s `busy` flag is cleared and its pump step re-runs, per
/// spec.md §4.5's literal "after any dispatch, mark the client FIFO
/// `busy=false` and re-pump" rule (this applies even when the message just
/// handled had nothing to do with our own queue).
pub fn proceed_param(
    server: &ParamServer,
    queue: &ParamClientQueue,
    transport: &dyn TransportSender,
    local: NodeId,
    source: NodeId,
    payload: &[u8],
) {
    match decode_param_inbound(payload) {
        Ok(ParamInbound::DescriptorRequest { index, directory }) => {
            let reply = server.handle_descriptor_request(directory, index);
            let _ = transport.send(local, source, Channel::Parameters, Priority::Low, &reply);
        }
        Ok(ParamInbound::ValueRequest { index, directory }) => {
            if let Some(reply) = server.handle_value_request(directory, index) {
                let _ = transport.send(local, source, Channel::Parameters, Priority::Low, &reply);
            }
        }
        Ok(ParamInbound::ValueStore {
            value,
            directory,
            index,
        }) => {
            server.handle_value_store(directory, index, value);
        }
        Ok(ParamInbound::ValueReply {
            value,
            directory,
            index,
        }) => {
            queue.apply_value_reply(directory, index, source, value);
        }
        Ok(ParamInbound::DescriptorReply {
            value,
            min,
            max,
            step,
            decimal,
            directory,
            index,
            param_type,
            literals,
        }) => match split_literals(literals) {
            Some((name, formatting)) => {
                let name = String::from_utf8_lossy(name).into_owned();
                let formatting = String::from_utf8_lossy(formatting).into_owned();
                queue.apply_descriptor_reply(
                    directory, index, source, value, min, max, step, decimal, param_type, name,
                    formatting,
                );
            }
            None => {
                log::warn!("descriptor reply from {source} missing NUL-terminated literals");
            }
        },
        Err(e) => {
            log::warn!("dropping malformed parameter record from {source}: {e}");
        }
    }
    queue.clear_busy();
    queue.pump(transport);
}
