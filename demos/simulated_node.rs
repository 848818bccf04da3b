//! Demonstrates two simulated CAN nodes talking over the in-process
//! [`can_node_engine::loopback`] transport: one serving a parameter
//! directory, the other fetching it asynchronously, plus a toy file
//! server answering a file client's `Open`/`Read`.

use std::sync::Arc;

use clap::Parser;
use parking_lot::Mutex;

use can_node_engine::config::EngineConfig;
use can_node_engine::loopback::LoopbackBus;
use can_node_engine::param::model::{TypedAccessor, ValueType};
use can_node_engine::param::{ParamType, ParameterAddress, ParameterDirectory};
use can_node_engine::transport::{Channel, InboundDispatch, NodeId, Priority, TransportSender};
use can_node_engine::{Engine, StdDelay};

const SERVER_NODE: NodeId = 1;
const CLIENT_NODE: NodeId = 2;
const FILE_SERVER_NODE: NodeId = 3;

#[derive(Parser)]
#[command(name = "simulated-node", about = "Loopback demo of the CAN node protocol engine")]
struct Args {
    /// Which scenario to run.
    #[arg(value_enum, default_value = "params")]
    scenario: Scenario,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum Scenario {
    /// Fetch a remote parameter descriptor asynchronously.
    Params,
    /// Open and read a file from a toy remote file server.
    File,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    match args.scenario {
        Scenario::Params => run_params_demo(),
        Scenario::File => run_file_demo(),
    }
}

fn run_params_demo() {
    let bus = LoopbackBus::new();
    let config = EngineConfig::builder().build().expect("valid config");

    let mut server = Engine::new(placeholder_transport(&bus, SERVER_NODE), Arc::new(StdDelay), config.clone());
    server.add_local_node(SERVER_NODE);
    let mut dir = ParameterDirectory::new();
    let speed_cell: &'static mut i32 = Box::leak(Box::new(4200));
    dir.entries.push(ParameterAddress::new(
        TypedAccessor::from_static_i32(Box::leak(Box::new(0)), ValueType::I32),
        0,
        0,
        0,
        0,
        0,
        ValueType::I32,
        ParamType::DIR,
        Some("Motor".into()),
        None,
    ));
    dir.entries.push(ParameterAddress::new(
        TypedAccessor::from_static_i32(speed_cell, ValueType::I32),
        0,
        10_000,
        1,
        0,
        0,
        ValueType::I32,
        ParamType::VALUE,
        Some("Speed".into()),
        Some("rpm".into()),
    ));
    let directory_id = server.register_param_directory(dir);
    let server = Arc::new(server);
    bus.register(SERVER_NODE, server.clone());

    let client = Engine::new(placeholder_transport(&bus, CLIENT_NODE), Arc::new(StdDelay), config);
    client.add_local_node(CLIENT_NODE);
    let client = Arc::new(client);
    bus.register(CLIENT_NODE, client.clone());

    client.request_param_update_async(directory_id, 1, CLIENT_NODE, SERVER_NODE, true);

    // Dispatch in this loopback demo runs synchronously inside `send`, so
    // the mirror is already populated by the time the call above returns.
    match client.param_queue().mirror(directory_id, 1) {
        Some(mirror) => println!(
            "fetched Motor/Speed = {} ({:?})",
            mirror.value, mirror.name
        ),
        None => println!("no reply received"),
    }
}

fn run_file_demo() {
    let bus = LoopbackBus::new();
    let config = EngineConfig::builder().build().expect("valid config");

    let file_server = ToyFileServer::new(b"hello from the bus\n", FILE_SERVER_NODE);
    file_server.attach(&bus);

    let client = Engine::new(placeholder_transport(&bus, CLIENT_NODE), Arc::new(StdDelay), config);
    client.add_local_node(CLIENT_NODE);
    client
        .directory()
        .announce(FILE_SERVER_NODE, can_node_engine::NodeCapabilities { file_server: true });
    let client = Arc::new(client);
    bus.register(CLIENT_NODE, client.clone());

    let result = client.file_client().open(b"readme.txt", 0, CLIENT_NODE, FILE_SERVER_NODE);
    println!("open: {result}");

    let mut buf = [0u8; 64];
    let (result, read) = client.file_client().read(&mut buf, buf.len() as u16, CLIENT_NODE);
    println!("read {read} bytes ({result}): {:?}", String::from_utf8_lossy(&buf[..read as usize]));

    let result = client.file_client().close(CLIENT_NODE, FILE_SERVER_NODE);
    println!("close: {result}");
}

/// A minimal in-process file server answering `Open`/`Read`/`Close` with a
/// single fixed payload, for the `file` demo scenario only — this is not
/// part of the library, which implements the client side of the protocol.
struct ToyFileServer {
    node_id: NodeId,
    transport: Mutex<Option<Arc<dyn TransportSender>>>,
    contents: Vec<u8>,
}

impl ToyFileServer {
    fn new(contents: &[u8], node_id: NodeId) -> Arc<Self> {
        Arc::new(ToyFileServer {
            node_id,
            transport: Mutex::new(None),
            contents: contents.to_vec(),
        })
    }

    /// Registers this server on `bus` and remembers the sender it gets
    /// back, so `dispatch` can answer in place of a second transport handle.
    fn attach(self: &Arc<Self>, bus: &Arc<LoopbackBus>) {
        let sender = bus.register(self.node_id, self.clone());
        *self.transport.lock() = Some(Arc::new(sender));
    }

    fn reply(&self, to: NodeId, record: &[u8]) {
        if let Some(t) = self.transport.lock().as_ref() {
            let _ = t.send(self.node_id, to, Channel::FileClient, Priority::Low, record);
        }
    }
}

impl InboundDispatch for ToyFileServer {
    fn dispatch(&self, _local_node: NodeId, source: NodeId, channel: Channel, payload: &[u8]) {
        if channel != Channel::FileClient {
            return;
        }
        // This toy reimplements just enough of the wire shapes to answer a
        // client; it is demo glue, not a second implementation of the
        // library's (private) wire codec.
        if payload.len() < 2 {
            return;
        }
        let op = u16::from_le_bytes([payload[0], payload[1]]);
        match op {
            1 => self.reply(source, &ack_record(0, 0)), // Open
            4 => self.reply(source, &ack_record(0, 0)), // Close
            2 => {
                // Read: header is operation, to_read, position (8 bytes).
                if payload.len() < 8 {
                    return;
                }
                let to_read = u16::from_le_bytes([payload[2], payload[3]]);
                let position =
                    u32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]);
                let pos = position as usize;
                let avail = self.contents.len().saturating_sub(pos);
                let total = avail.min(to_read as usize) as u16;
                let data = &self.contents[pos..pos + total as usize];
                self.reply(source, &data_record(0, position, total, data));
            }
            _ => {}
        }
    }
}

fn ack_record(error: u16, position: u32) -> [u8; 8] {
    let mut buf = [0u8; 8];
    buf[0..2].copy_from_slice(&5u16.to_le_bytes()); // fOpAck
    buf[2..4].copy_from_slice(&error.to_le_bytes());
    buf[4..8].copy_from_slice(&position.to_le_bytes());
    buf
}

fn data_record(error: u16, position: u32, total: u16, data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(10 + data.len());
    buf.extend_from_slice(&7u16.to_le_bytes()); // fOpData
    buf.extend_from_slice(&error.to_le_bytes());
    buf.extend_from_slice(&position.to_le_bytes());
    buf.extend_from_slice(&total.to_le_bytes());
    buf.extend_from_slice(data);
    buf
}

/// Builds a sender bound to `node` on `bus`, with no inbound handling of its
/// own (the engines it backs register their own `Arc<Engine>` dispatch
/// immediately after construction).
fn placeholder_transport(bus: &Arc<LoopbackBus>, node: NodeId) -> Arc<dyn TransportSender> {
    Arc::new(bus.register(node, Arc::new(NullDispatch)))
}

struct NullDispatch;
impl InboundDispatch for NullDispatch {
    fn dispatch(&self, _local: NodeId, _source: NodeId, _channel: Channel, _payload: &[u8]) {}
}
