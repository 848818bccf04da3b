//! Client-side protocol engine for a CAN-bus application-layer file and
//! parameter protocol.
//!
//! This crate implements two cooperating subsystems that share one
//! message-send/receive substrate: a synchronous remote-file client
//! (open/read/write/seek/close against a file server elsewhere on the bus)
//! and an asynchronous parameter engine (serving this node's own
//! directories of named values, and fetching remote ones into a local
//! mirror). Everything specific to a real CAN controller — framing,
//! arbitration, fragmentation and reassembly — is out of scope; this crate
//! consumes it behind the [`transport::TransportSender`]/
//! [`transport::InboundDispatch`] traits. The only concrete implementation
//! shipped is [`loopback`], for tests and the `demos/` example binary.

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

mod delay;
mod directory;
mod error;

pub mod config;
pub mod file_client;
pub mod loopback;
pub mod param;
pub mod transport;

mod wire;

use std::sync::Arc;

pub use delay::{Delay, StdDelay};
pub use directory::{ActiveNodesCursor, NodeCapabilities, NodeDirectory, NodeShortName};
pub use error::{FileResult, SendResult};

use config::EngineConfig;
use file_client::FileClient;
use param::{
    ParamClientQueue, ParamInfoSize, ParameterDirectory, ParameterValue, ParamServer, proceed_param,
};
use transport::{Channel, InboundDispatch, NodeId, TransportSender};

/// The composed engine: one [`NodeDirectory`], one [`FileClient`], one
/// served [`ParamServer`], and one [`ParamClientQueue`], wired to a single
/// [`TransportSender`] and dispatched into via [`InboundDispatch`].
///
/// An application owns one `Engine` per bus it participates on (commonly
/// just one), registers its local node ids and served parameter
/// directories at startup, and routes inbound bus traffic into
/// [`InboundDispatch::dispatch`].
pub struct Engine {
    directory: Arc<NodeDirectory>,
    file_client: FileClient,
    param_server: ParamServer,
    param_queue: ParamClientQueue,
    transport: Arc<dyn TransportSender>,
}

impl Engine {
    /// Builds a new engine over `transport`, using `delay` for the
    /// synchronous poll primitives and `config` for sizing.
    pub fn new(
        transport: Arc<dyn TransportSender>,
        delay: Arc<dyn Delay>,
        config: EngineConfig,
    ) -> Self {
        let directory = Arc::new(NodeDirectory::new());
        let param_queue = ParamClientQueue::new(config.param_queue_size());
        let file_client = FileClient::new(directory.clone(), transport.clone(), delay, config);
        Engine {
            directory,
            file_client,
            param_server: ParamServer::new(),
            param_queue,
            transport,
        }
    }

    /// Registers a local node id this process owns traffic for.
    pub fn add_local_node(&self, node_id: NodeId) {
        self.directory.add_local_node(node_id);
    }

    /// Registers a directory this node serves over the parameter channel,
    /// returning the directory id assigned to it.
    pub fn register_param_directory(&mut self, dir: ParameterDirectory) -> u8 {
        self.param_server.register_directory(dir)
    }

    /// The file-client operations surface (`Open`/`Read`/`Write`/…).
    pub fn file_client(&self) -> &FileClient {
        &self.file_client
    }

    /// The node directory (local nodes and visible remote nodes).
    pub fn directory(&self) -> &NodeDirectory {
        &self.directory
    }

    /// The asynchronous parameter client queue and its mirrors.
    pub fn param_queue(&self) -> &ParamClientQueue {
        &self.param_queue
    }

    /// `SPEC_FULL.md` §4.6 `ParameterUpdateAsync`: enqueues an asynchronous
    /// descriptor (`full_descriptor=true`) or value-only fetch for
    /// `(directory, index)` from `remote`, sending it immediately if the
    /// queue was idle. This is the public entry point for driving the
    /// queue — [`ParamClientQueue::request_async`] itself needs a
    /// [`TransportSender`] to pump with, which only `Engine` holds.
    pub fn request_param_update_async(
        &self,
        directory: u8,
        index: u8,
        local: NodeId,
        remote: NodeId,
        full_descriptor: bool,
    ) -> SendResult {
        self.param_queue.request_async(
            self.transport.as_ref(),
            local,
            remote,
            directory,
            index,
            full_descriptor,
        )
    }

    /// `SPEC_FULL.md` §6 `ParameterSet`: writes `paramv`'s current value to
    /// a remote `(directory, paramv.index)` entry. Fire-and-forget, unlike
    /// [`ParamClientQueue::request_async`] — see that method's doc comment.
    pub fn parameter_set(
        &self,
        paramv: &ParameterValue,
        directory: u8,
        local: NodeId,
        remote: NodeId,
    ) -> SendResult {
        self.param_queue
            .set(self.transport.as_ref(), paramv, directory, local, remote)
    }

    /// The directories this node serves.
    pub fn param_server(&self) -> &ParamServer {
        &self.param_server
    }

    /// `ParamInfo_Size` over everything this node serves.
    pub fn param_info_size(&self) -> ParamInfoSize {
        self.param_server.info_size()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

impl InboundDispatch for Engine {
    fn dispatch(&self, local_node: NodeId, source: NodeId, channel: Channel, payload: &[u8]) {
        match channel {
            Channel::FileClient => {
                file_client::handle_file_client_inbound(&self.file_client, local_node, payload)
            }
            Channel::Parameters => proceed_param(
                &self.param_server,
                &self.param_queue,
                self.transport.as_ref(),
                local_node,
                source,
                payload,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::model::TypedAccessor;
    use crate::param::{ParamType, ParameterAddress, ValueType};
    use crate::transport::Priority;
    use std::sync::Mutex as StdMutex;

    struct Recorder {
        sent: StdMutex<Vec<(NodeId, NodeId, Vec<u8>)>>,
    }
    impl TransportSender for Recorder {
        fn send(
            &self,
            local: NodeId,
            dest: NodeId,
            _channel: Channel,
            _priority: Priority,
            record: &[u8],
        ) -> SendResult {
            self.sent.lock().unwrap().push((local, dest, record.to_vec()));
            SendResult::Ok
        }
    }

    #[test]
    fn engine_serves_a_descriptor_request_from_a_peer() {
        let recorder = Arc::new(Recorder {
            sent: StdMutex::new(Vec::new()),
        });
        let config = EngineConfig::builder().build().unwrap();
        let mut engine = Engine::new(recorder.clone(), Arc::new(StdDelay), config);
        engine.add_local_node(1);

        let cell: &'static mut i32 = Box::leak(Box::new(0));
        let accessor = TypedAccessor::from_static_i32(cell, ValueType::I32);
        let mut dir = ParameterDirectory::new();
        dir.entries.push(ParameterAddress::new(
            accessor,
            0,
            0,
            0,
            0,
            0,
            ValueType::I32,
            ParamType::DIR,
            Some("Root".into()),
            None,
        ));
        let dir_id = engine.register_param_directory(dir);

        engine.dispatch(1, 2, Channel::Parameters, &[0u8, dir_id]);

        let sent = recorder.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 1);
        assert_eq!(sent[0].1, 2);
    }
}
