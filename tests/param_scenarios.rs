//! End-to-end parameter-engine scenarios (spec.md §8 scenario F, plus
//! `ParameterSet` and `ParametersStopUpdating`), driven through the public
//! `Engine` API over the `loopback` transport.

use std::sync::Arc;

use can_node_engine::config::EngineConfig;
use can_node_engine::loopback::LoopbackBus;
use can_node_engine::param::model::{TypedAccessor, ValueType};
use can_node_engine::param::{ParamType, ParameterAddress, ParameterDirectory, ParameterValue};
use can_node_engine::transport::NodeId;
use can_node_engine::{Engine, StdDelay};

const SERVER_NODE: NodeId = 1;
const CLIENT_NODE: NodeId = 2;

fn motor_directory(speed_cell: &'static mut i32) -> ParameterDirectory {
    let mut dir = ParameterDirectory::new();
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
    dir
}

/// Scenario F: an async descriptor fetch populates the client-side mirror
/// with the remote entry's name/formatting and clears `NO_INIT`.
#[test]
fn scenario_f_descriptor_fetch_populates_the_mirror() {
    let bus = LoopbackBus::new();
    let config = EngineConfig::builder().build().unwrap();

    let speed_cell: &'static mut i32 = Box::leak(Box::new(4200));
    let mut server = Engine::new(
        Arc::new(bus.register(SERVER_NODE, Arc::new(NullDispatch))),
        Arc::new(StdDelay),
        config.clone(),
    );
    server.add_local_node(SERVER_NODE);
    let dir_id = server.register_param_directory(motor_directory(speed_cell));
    let server = Arc::new(server);
    bus.register(SERVER_NODE, server.clone());

    let client = Engine::new(
        Arc::new(bus.register(CLIENT_NODE, Arc::new(NullDispatch))),
        Arc::new(StdDelay),
        config,
    );
    client.add_local_node(CLIENT_NODE);
    let client = Arc::new(client);
    bus.register(CLIENT_NODE, client.clone());

    assert!(client.param_queue().mirror(dir_id, 1).is_none());

    let sent = client.request_param_update_async(dir_id, 1, CLIENT_NODE, SERVER_NODE, true);
    assert_eq!(sent, can_node_engine::SendResult::Ok);

    let mirror = client
        .param_queue()
        .mirror(dir_id, 1)
        .expect("descriptor reply should have populated a mirror");
    assert_eq!(mirror.value, 4200);
    assert_eq!(mirror.name.as_deref(), Some("Speed"));
    assert_eq!(mirror.formatting.as_deref(), Some("rpm"));
    assert!(!mirror.param_type.contains(ParamType::NO_INIT));
    assert!(!mirror.param_type.contains(ParamType::REQ_VAL));
}

/// `ParameterUpdateAsync` rejects a new request once the queue is full.
#[test]
fn async_update_reports_buffer_full_past_capacity() {
    let bus = LoopbackBus::new();
    let config = EngineConfig::builder().param_queue_size(1).build().unwrap();
    let client = Engine::new(
        Arc::new(bus.register(CLIENT_NODE, Arc::new(NullDispatch))),
        Arc::new(StdDelay),
        config,
    );
    client.add_local_node(CLIENT_NODE);

    assert_eq!(
        client.request_param_update_async(0, 0, CLIENT_NODE, SERVER_NODE, true),
        can_node_engine::SendResult::Ok
    );
    assert_eq!(
        client.request_param_update_async(0, 1, CLIENT_NODE, SERVER_NODE, true),
        can_node_engine::SendResult::BufferFull
    );
}

/// `ParameterSet` writes a value to the remote node's directory entry
/// without waiting for (or expecting) a reply.
#[test]
fn parameter_set_writes_a_remote_entry() {
    let bus = LoopbackBus::new();
    let config = EngineConfig::builder().build().unwrap();

    let speed_cell: &'static mut i32 = Box::leak(Box::new(0));
    let mut server = Engine::new(
        Arc::new(bus.register(SERVER_NODE, Arc::new(NullDispatch))),
        Arc::new(StdDelay),
        config.clone(),
    );
    server.add_local_node(SERVER_NODE);
    let dir_id = server.register_param_directory(motor_directory(speed_cell));
    let server = Arc::new(server);
    bus.register(SERVER_NODE, server.clone());

    let client = Engine::new(
        Arc::new(bus.register(CLIENT_NODE, Arc::new(NullDispatch))),
        Arc::new(StdDelay),
        config,
    );
    client.add_local_node(CLIENT_NODE);

    let mut paramv = ParameterValue::new(1);
    paramv.value = 9001;
    let sent = client.parameter_set(&paramv, dir_id, CLIENT_NODE, SERVER_NODE);
    assert_eq!(sent, can_node_engine::SendResult::Ok);

    assert_eq!(
        server
            .param_server()
            .directory(dir_id)
            .unwrap()
            .entries[1]
            .get_value(),
        9001
    );
}

/// `ParametersStopUpdating` drops any queued-but-unsent requests.
#[test]
fn stop_updating_drops_pending_requests() {
    let bus = LoopbackBus::new();
    let config = EngineConfig::builder().build().unwrap();
    let client = Engine::new(
        Arc::new(bus.register(CLIENT_NODE, Arc::new(NullDispatch))),
        Arc::new(StdDelay),
        config,
    );
    client.add_local_node(CLIENT_NODE);

    client.request_param_update_async(0, 0, CLIENT_NODE, SERVER_NODE, true);
    client.param_queue().stop_updating();

    // The default queue holds 8 entries; if `stop_updating` had left the
    // earlier entry in place, the 8th of these would report `BufferFull`.
    for i in 0..8 {
        assert_eq!(
            client.request_param_update_async(0, i, CLIENT_NODE, SERVER_NODE, true),
            can_node_engine::SendResult::Ok
        );
    }
}

struct NullDispatch;
impl can_node_engine::transport::InboundDispatch for NullDispatch {
    fn dispatch(
        &self,
        _local: NodeId,
        _source: NodeId,
        _channel: can_node_engine::transport::Channel,
        _payload: &[u8],
    ) {
    }
}
