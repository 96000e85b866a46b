//! Port capabilities: how packets and retry notifications cross component boundaries.
//!
//! A request travels requester -> intermediary -> memory and the response comes back the
//! same way. Every hop uses the same contract: the receiver either takes ownership of the
//! packet or hands it back, and a receiver that hands a packet back owes the sender a
//! retry notification once it can accept again.

use crate::error::Result;
use crate::event::{Schedule, Tick};
use crate::packet::{AddrRange, Packet};
use tracing::debug;

/// Outcome of offering a packet to a peer.
#[must_use]
#[derive(Debug, PartialEq)]
pub enum Delivery {
    Accepted,
    /// The peer could not take the packet; ownership returns to the sender.
    Rejected(Packet),
}

impl Delivery {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Delivery::Accepted)
    }

    pub(crate) fn into_result(self) -> std::result::Result<(), Packet> {
        match self {
            Delivery::Accepted => Ok(()),
            Delivery::Rejected(pkt) => Err(pkt),
        }
    }
}

impl From<std::result::Result<(), Packet>> for Delivery {
    fn from(res: std::result::Result<(), Packet>) -> Self {
        match res {
            Ok(()) => Delivery::Accepted,
            Err(pkt) => Delivery::Rejected(pkt),
        }
    }
}

/// A component that receives requests: the memory side of a link.
pub trait AcceptsRequests {
    fn recv_timing_req(&mut self, pkt: Packet, now: Tick) -> Delivery;

    /// The sender is ready for a response this component previously failed to deliver.
    fn recv_resp_retry(&mut self);

    /// Address ranges served by this component.
    fn addr_ranges(&self) -> Vec<AddrRange>;

    /// Zero-time debug access; updates or reads `pkt` in place.
    fn recv_functional(&mut self, pkt: &mut Packet);

    /// Immediate access; turns `pkt` into its response and returns the modeled latency.
    fn recv_atomic(&mut self, pkt: &mut Packet) -> Tick;
}

/// A component that receives responses: the requester side of a link.
pub trait AcceptsResponses {
    fn recv_timing_resp(&mut self, pkt: Packet, now: Tick) -> Delivery;

    /// The receiver is ready for a request it previously rejected.
    fn recv_req_retry(&mut self);

    /// The address ranges reachable through this link changed.
    fn recv_range_change(&mut self);
}

/// A component inserted between a requester and memory.
///
/// The intermediary owns both peers and is driven from outside: the requester's packets
/// arrive through [`recv_timing_req`](Self::recv_timing_req), memory's through
/// [`recv_timing_resp`](Self::recv_timing_resp), and the component's own timed work
/// through [`process`](Self::process).
pub trait Interposer {
    type Requester: AcceptsResponses;
    type Memory: AcceptsRequests;
    type Event;

    fn name(&self) -> &'static str;

    fn startup<S: Schedule<Self::Event>>(&mut self, sched: &mut S);

    /// Cancels any self-rescheduling work so the event queue can drain.
    fn shutdown<S: Schedule<Self::Event>>(&mut self, sched: &mut S);

    fn process<S: Schedule<Self::Event>>(&mut self, event: Self::Event, sched: &mut S)
        -> Result<()>;

    /// Request from the requester. Fatal errors are model defects; backpressure is
    /// `Ok(Delivery::Rejected)`.
    fn recv_timing_req<S: Schedule<Self::Event>>(
        &mut self,
        pkt: Packet,
        sched: &mut S,
    ) -> Result<Delivery>;

    /// Response from memory.
    fn recv_timing_resp<S: Schedule<Self::Event>>(&mut self, pkt: Packet, sched: &mut S)
        -> Delivery;

    /// The requester can take responses again.
    fn recv_resp_retry<S: Schedule<Self::Event>>(&mut self, sched: &mut S);

    /// Memory can take requests again.
    fn recv_req_retry<S: Schedule<Self::Event>>(&mut self, sched: &mut S);

    fn requester(&self) -> &Self::Requester;
    fn requester_mut(&mut self) -> &mut Self::Requester;
    fn memory(&self) -> &Self::Memory;
    fn memory_mut(&mut self) -> &mut Self::Memory;

    /// Ranges are whatever memory serves.
    fn addr_ranges(&self) -> Vec<AddrRange> {
        debug!(component = self.name(), "address ranges requested");
        self.memory().addr_ranges()
    }

    fn recv_range_change(&mut self) {
        debug!(component = self.name(), "relaying range change");
        self.requester_mut().recv_range_change();
    }

    fn recv_functional(&mut self, pkt: &mut Packet) {
        self.memory_mut().recv_functional(pkt);
    }

    fn recv_atomic(&mut self, pkt: &mut Packet) -> Tick {
        debug!(component = self.name(), pkt = %pkt.id, "atomic access");
        self.memory_mut().recv_atomic(pkt)
    }
}
