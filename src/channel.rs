//! Flow-controlled endpoints of the secure module.
//!
//! [`RequestChannel`] faces the requester: it admits requests and drains responses back.
//! [`ResponseChannel`] faces memory: it drains latency-cleared requests downstream and
//! admits responses. Each keeps one [`ChannelState`]; the queues and the latency timer
//! belong to the module and are lent to the channel for each operation.

use crate::event::{Schedule, Tick};
use crate::latency::{LatencyTimer, SlotId};
use crate::packet::Packet;
use crate::port::{AcceptsRequests, AcceptsResponses, Delivery};
use crate::queue::BoundedQueue;
use tracing::{debug, trace};

/// A request waiting out its security-check latency.
#[derive(Debug)]
pub struct PendingRequest {
    pub pkt: Packet,
    pub slot: SlotId,
}

pub type RequestQueue = BoundedQueue<PendingRequest>;
pub type ResponseQueue = BoundedQueue<Packet>;

/// Flow-control flags for one direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelState {
    /// The peer rejected our last forward; no further forward until it unblocks us.
    pub blocked: bool,
    /// We rejected the peer and owe it a retry notification.
    pub pending_retry: bool,
}

/// Upstream endpoint: requests in, responses out.
#[derive(Debug, Default)]
pub struct RequestChannel {
    state: ChannelState,
}

impl RequestChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Admits `pkt` into the request queue with a readiness marker that completes at
    /// `ready_at`. A full queue hands the packet back and records the owed retry; no
    /// completion is scheduled for a packet that was not admitted.
    pub fn receive_request<E, S, F>(
        &mut self,
        pkt: Packet,
        ready_at: Tick,
        queue: &mut RequestQueue,
        timer: &mut LatencyTimer,
        sched: &mut S,
        event: F,
    ) -> Delivery
    where
        S: Schedule<E>,
        F: FnOnce(SlotId) -> E,
    {
        let id = pkt.id;
        let slot = timer.reserve();
        match queue.push(PendingRequest { pkt, slot }) {
            Ok(()) => {
                timer.start(slot, sched, ready_at, event);
                debug!(pkt = %id, ready_at, depth = queue.len(), "request admitted");
                Delivery::Accepted
            }
            Err(rejected) => {
                timer.release(rejected.slot);
                self.state.pending_retry = true;
                debug!(pkt = %id, "request queue full, retry owed");
                Delivery::Rejected(rejected.pkt)
            }
        }
    }

    /// Sends the head of the response queue to the requester.
    pub fn forward_response<R: AcceptsResponses>(
        &mut self,
        queue: &mut ResponseQueue,
        requester: &mut R,
        now: Tick,
    ) -> bool {
        if self.state.blocked {
            trace!("requester blocked, waiting for retry");
            return false;
        }
        let Some(id) = queue.front().map(|pkt| pkt.id) else {
            return false;
        };
        let sent = queue.offer_front(|pkt| requester.recv_timing_resp(pkt, now).into_result());
        if sent {
            self.state.blocked = false;
            debug!(pkt = %id, "response accepted by requester");
        } else {
            self.on_send_rejected();
            debug!(pkt = %id, "response rejected by requester");
        }
        sent
    }

    /// The requester can take responses again. The next periodic drain resends.
    pub fn on_requester_unblocked(&mut self) {
        self.state.blocked = false;
    }

    /// The requester refused a response: it stays at the head and is resent verbatim
    /// once the requester unblocks.
    pub fn on_send_rejected(&mut self) {
        self.state.blocked = true;
    }

    /// Consumes the owed retry, if any.
    pub fn take_retry(&mut self) -> bool {
        std::mem::take(&mut self.state.pending_retry)
    }
}

/// Downstream endpoint: requests out, responses in.
#[derive(Debug, Default)]
pub struct ResponseChannel {
    state: ChannelState,
}

impl ResponseChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Sends the head of the request queue to memory if its latency has elapsed. A later
    /// entry never overtakes the head, even when it is ready first.
    pub fn forward_request<M: AcceptsRequests>(
        &mut self,
        queue: &mut RequestQueue,
        timer: &mut LatencyTimer,
        memory: &mut M,
        now: Tick,
    ) -> bool {
        if self.state.blocked {
            trace!("memory blocked, waiting for retry");
            return false;
        }
        let Some(head) = queue.front() else {
            return false;
        };
        if !timer.is_ready(head.slot) {
            return false;
        }
        let (id, slot) = (head.pkt.id, head.slot);
        let sent = queue.offer_front(|pending| {
            let slot = pending.slot;
            memory
                .recv_timing_req(pending.pkt, now)
                .into_result()
                .map_err(|pkt| PendingRequest { pkt, slot })
        });
        if sent {
            timer.release(slot);
            debug!(pkt = %id, "request accepted by memory");
        } else {
            self.state.blocked = true;
            debug!(pkt = %id, "request rejected by memory");
        }
        sent
    }

    /// Admits a response from memory. A full queue hands it back and records the owed
    /// retry; an admitted response clears it.
    pub fn receive_response(&mut self, pkt: Packet, queue: &mut ResponseQueue) -> Delivery {
        let id = pkt.id;
        match queue.push(pkt) {
            Ok(()) => {
                self.state.pending_retry = false;
                debug!(pkt = %id, depth = queue.len(), "response admitted");
                Delivery::Accepted
            }
            Err(pkt) => {
                self.state.pending_retry = true;
                debug!(pkt = %id, "response queue full, retry owed");
                Delivery::Rejected(pkt)
            }
        }
    }

    /// Memory can take requests again. Unlike the upstream side, the head is re-attempted
    /// immediately rather than on the next periodic drain.
    pub fn on_memory_unblocked<M: AcceptsRequests>(
        &mut self,
        queue: &mut RequestQueue,
        timer: &mut LatencyTimer,
        memory: &mut M,
        now: Tick,
    ) -> bool {
        self.state.blocked = false;
        self.forward_request(queue, timer, memory, now)
    }

    /// Consumes the owed retry, if any.
    pub fn take_retry(&mut self) -> bool {
        std::mem::take(&mut self.state.pending_retry)
    }
}
