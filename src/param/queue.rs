//! Parameter Client Queue (`SPEC_FULL.md` §4.6): a bounded FIFO of
//! outstanding async descriptor/value requests, pumped one at a time onto
//! the bus and correlated back to a client-side mirror by inbound replies.

use std::collections::HashMap;

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::error::SendResult;
use crate::transport::{Channel, NodeId, Priority, TransportSender};
use crate::wire::param_ops::{encode_descriptor_request, encode_value_request, encode_value_store};

use super::model::{ParamType, ParameterValue};

/// One queued request: which remote `(directory, index)` to fetch, from
/// which local node, addressed to which remote `source`, and whether it's
/// a full descriptor or a value-only fetch.
#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    local: NodeId,
    source: NodeId,
    directory: u8,
    index: u8,
    full_descriptor: bool,
}

#[derive(Debug, Default)]
struct QueueState {
    entries: SmallVec<[QueueEntry; 8]>,
    busy: bool,
}

/// Bounded FIFO of outstanding parameter requests, plus the client-side
/// `ParameterValue` mirrors those requests populate.
#[derive(Debug)]
pub struct ParamClientQueue {
    capacity: u16,
    state: Mutex<QueueState>,
    mirrors: Mutex<HashMap<(u8, u8), ParameterValue>>,
}

impl ParamClientQueue {
    pub fn new(capacity: u16) -> Self {
        ParamClientQueue {
            capacity,
            state: Mutex::new(QueueState::default()),
            mirrors: Mutex::new(HashMap::new()),
        }
    }

    /// `SPEC_FULL.md` §4.6 `ParameterUpdateAsync`: enqueues a request for
    /// `(directory, index)` on `source`, registering an uninitialized
    /// mirror if none exists yet and marking it `NO_INIT` (full descriptor)
    /// or `REQ_VAL` (value-only) so the caller can tell the fetch is still
    /// in flight, then pumps the queue immediately if it was idle —
    /// matching the reference's enqueue-then-`proceed_RX`-if-idle sequence
    /// (`levcan_param.c`'s `LC_ParameterUpdateAsync`). Fails with
    /// `BufferFull` once the queue holds `ParamQueueSize` entries.
    pub fn request_async(
        &self,
        transport: &dyn TransportSender,
        local: NodeId,
        source: NodeId,
        directory: u8,
        index: u8,
        full_descriptor: bool,
    ) -> SendResult {
        let mut state = self.state.lock();
        if state.entries.len() >= self.capacity as usize {
            return SendResult::BufferFull;
        }
        state.entries.push(QueueEntry {
            local,
            source,
            directory,
            index,
            full_descriptor,
        });
        drop(state);
        {
            let mut mirrors = self.mirrors.lock();
            let mirror = mirrors
                .entry((directory, index))
                .or_insert_with(|| ParameterValue::new(index));
            if full_descriptor {
                mirror.param_type.insert(ParamType::NO_INIT);
            } else {
                mirror.param_type.insert(ParamType::REQ_VAL);
            }
        }
        self.pump(transport);
        SendResult::Ok
    }

    /// `SPEC_FULL.md` §6 `ParameterSet`: writes `paramv`'s current value to
    /// a remote `(directory, paramv.index)` entry. Unlike
    /// [`Self::request_async`], this is fire-and-forget — the wire protocol
    /// gives no reply to a value store, so no queue slot is consumed and no
    /// mirror bookkeeping happens; the caller learns only whether the
    /// transport accepted the send.
    pub fn set(
        &self,
        transport: &dyn TransportSender,
        paramv: &ParameterValue,
        directory: u8,
        local: NodeId,
        remote: NodeId,
    ) -> SendResult {
        let record = encode_value_store(paramv.value, directory, paramv.index);
        transport.send(local, remote, Channel::Parameters, Priority::Low, &record)
    }

    /// `SPEC_FULL.md` §4.6 `proceed_rx`: if idle and non-empty, sends the
    /// request at the head of the queue and marks the queue busy. Does
    /// *not* dequeue — only a reply arriving through [`Self::find_receiver`]
    /// does that, matching spec.md's "dequeue happens only when the
    /// matching reply arrives" wording.
    pub(crate) fn pump(&self, transport: &dyn TransportSender) {
        let entry = {
            let mut state = self.state.lock();
            if state.busy {
                return;
            }
            match state.entries.first().copied() {
                Some(entry) => entry,
                None => return,
            }
        };
        let record = if entry.full_descriptor {
            encode_descriptor_request(entry.index, entry.directory)
        } else {
            encode_value_request(entry.index, entry.directory)
        };
        let sent = transport.send(
            entry.local,
            entry.source,
            Channel::Parameters,
            Priority::Low,
            &record,
        );
        if sent == SendResult::Ok {
            self.state.lock().busy = true;
        }
    }

    /// Clears `busy`, per spec.md §4.5's "after any dispatch, mark the
    /// client FIFO `busy=false`" rule — called unconditionally by
    /// `proceed_param` after handling any inbound parameter message, not
    /// only ones this queue produced.
    pub(crate) fn clear_busy(&self) {
        self.state.lock().busy = false;
    }

    /// `SPEC_FULL.md` §9 item 4 (preserved, not fixed): pops the head of
    /// the queue unconditionally — even when the reply's `(directory,
    /// index, source)` doesn't match it — and only returns `Some` on an
    /// exact match. A mismatched or out-of-order reply silently discards
    /// whatever request was actually at the head; that request is never
    /// retried or reported as failed.
    fn find_receiver(&self, directory: u8, index: u8, source: NodeId) -> Option<QueueEntry> {
        let mut state = self.state.lock();
        if state.entries.is_empty() {
            return None;
        }
        let head = state.entries.remove(0);
        if head.directory == directory && head.index == index && head.source == source {
            Some(head)
        } else {
            None
        }
    }

    /// Applies an inbound value-only reply, if it correlates to the
    /// current head of the queue.
    pub(crate) fn apply_value_reply(&self, directory: u8, index: u8, source: NodeId, value: i32) {
        if self.find_receiver(directory, index, source).is_none() {
            log::warn!(
                "parameter reply ({directory}, {index}) from {source} dropped: head of queue did not match"
            );
            return;
        }
        if let Some(mirror) = self.mirrors.lock().get_mut(&(directory, index)) {
            mirror.apply_value_reply(value);
        }
    }

    /// Applies an inbound descriptor reply, if it correlates to the
    /// current head of the queue.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn apply_descriptor_reply(
        &self,
        directory: u8,
        index: u8,
        source: NodeId,
        value: i32,
        min: i32,
        max: i32,
        step: i32,
        decimal: u8,
        wire_param_type: u8,
        name: String,
        formatting: String,
    ) {
        if self.find_receiver(directory, index, source).is_none() {
            log::warn!(
                "descriptor reply ({directory}, {index}) from {source} dropped: head of queue did not match"
            );
            return;
        }
        let mut mirrors = self.mirrors.lock();
        let mirror = mirrors
            .entry((directory, index))
            .or_insert_with(|| ParameterValue::new(index));
        mirror.apply_descriptor_reply(value, min, max, step, decimal, wire_param_type, name, formatting);
    }

    /// Reads a client-side mirror, if one has been registered.
    pub fn mirror(&self, directory: u8, index: u8) -> Option<ParameterValue> {
        self.mirrors.lock().get(&(directory, index)).cloned()
    }

    /// `SPEC_FULL.md` §4.6 `StopUpdating`: zeroes the queue and resets the
    /// busy flag. Mirrors already populated are left in place.
    pub fn stop_updating(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.busy = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SendResult;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTransport {
        sends: AtomicUsize,
    }
    impl TransportSender for CountingTransport {
        fn send(&self, _local: NodeId, _dest: NodeId, _ch: Channel, _pri: Priority, _rec: &[u8]) -> SendResult {
            self.sends.fetch_add(1, Ordering::SeqCst);
            SendResult::Ok
        }
    }

    #[test]
    fn enqueue_respects_capacity() {
        let queue = ParamClientQueue::new(1);
        let transport = CountingTransport { sends: AtomicUsize::new(0) };
        assert_eq!(
            queue.request_async(&transport, 0, 1, 0, 0, false),
            SendResult::Ok
        );
        assert_eq!(
            queue.request_async(&transport, 0, 1, 0, 1, false),
            SendResult::BufferFull
        );
    }

    #[test]
    fn request_async_pumps_immediately_and_marks_busy() {
        let queue = ParamClientQueue::new(4);
        let transport = CountingTransport { sends: AtomicUsize::new(0) };
        queue.request_async(&transport, 0, 1, 2, 3, true);
        assert_eq!(
            transport.sends.load(Ordering::SeqCst),
            1,
            "enqueuing an idle queue must send the request immediately"
        );
        queue.pump(&transport);
        assert_eq!(
            transport.sends.load(Ordering::SeqCst),
            1,
            "busy queue must not send a second request"
        );
    }

    #[test]
    fn full_descriptor_request_sets_no_init_and_value_only_sets_req_val() {
        let queue = ParamClientQueue::new(4);
        let transport = CountingTransport { sends: AtomicUsize::new(0) };
        queue.request_async(&transport, 0, 1, 2, 3, true);
        assert!(queue.mirror(2, 3).unwrap().param_type.contains(ParamType::NO_INIT));

        queue.request_async(&transport, 0, 1, 5, 6, false);
        assert!(queue.mirror(5, 6).unwrap().param_type.contains(ParamType::REQ_VAL));
    }

    #[test]
    fn matching_reply_updates_mirror_and_unblocks_queue() {
        let queue = ParamClientQueue::new(4);
        let transport = CountingTransport { sends: AtomicUsize::new(0) };
        queue.request_async(&transport, 0, 9, 2, 3, false);
        queue.apply_value_reply(2, 3, 9, 1234);
        assert_eq!(queue.mirror(2, 3).unwrap().value, 1234);
    }

    #[test]
    fn mismatched_reply_drops_the_queued_entry_without_updating_it() {
        let queue = ParamClientQueue::new(4);
        let transport = CountingTransport { sends: AtomicUsize::new(0) };
        queue.request_async(&transport, 0, 9, 2, 3, false);
        // A reply for a completely different (directory, index, source)
        // still pops the head — this is the preserved §9 item 4 quirk.
        queue.apply_value_reply(5, 5, 5, 999);
        assert_eq!(queue.mirror(2, 3).unwrap().value, 0);
        let sends_before = transport.sends.load(Ordering::SeqCst);
        queue.clear_busy();
        queue.pump(&transport);
        assert_eq!(
            transport.sends.load(Ordering::SeqCst),
            sends_before,
            "queue is empty after the mismatched reply consumed the only entry"
        );
    }

    #[test]
    fn set_sends_a_store_value_record_without_consuming_a_queue_slot() {
        let queue = ParamClientQueue::new(4);
        let transport = CountingTransport { sends: AtomicUsize::new(0) };
        let mut paramv = ParameterValue::new(3);
        paramv.value = 77;
        let sent = queue.set(&transport, &paramv, 1, 0, 9);
        assert_eq!(sent, SendResult::Ok);
        assert_eq!(transport.sends.load(Ordering::SeqCst), 1);
        // no entry was queued, so a pump afterward sends nothing.
        queue.pump(&transport);
        assert_eq!(transport.sends.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_updating_clears_the_queue() {
        let queue = ParamClientQueue::new(4);
        let transport = CountingTransport { sends: AtomicUsize::new(0) };
        queue.request_async(&transport, 0, 1, 0, 0, false);
        queue.stop_updating();
        let transport = CountingTransport { sends: AtomicUsize::new(0) };
        queue.pump(&transport);
        assert_eq!(transport.sends.load(Ordering::SeqCst), 0);
    }
}
