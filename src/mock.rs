//! Scripted peers for unit tests.

use crate::event::{EventQueue, Tick};
use crate::packet::{AddrRange, Packet};
use crate::port::{AcceptsRequests, AcceptsResponses, Delivery, Interposer};

/// Requester that records everything and accepts responses while `accepting` is set.
#[derive(Debug)]
pub struct MockRequester {
    pub accepting: bool,
    pub offers: u32,
    pub received: Vec<(Tick, Packet)>,
    pub req_retries: u32,
    pub range_changes: u32,
}

impl MockRequester {
    pub fn new() -> Self {
        Self {
            accepting: true,
            offers: 0,
            received: Vec::new(),
            req_retries: 0,
            range_changes: 0,
        }
    }
}

impl AcceptsResponses for MockRequester {
    fn recv_timing_resp(&mut self, pkt: Packet, now: Tick) -> Delivery {
        self.offers += 1;
        if !self.accepting {
            return Delivery::Rejected(pkt);
        }
        self.received.push((now, pkt));
        Delivery::Accepted
    }

    fn recv_req_retry(&mut self) {
        self.req_retries += 1;
    }

    fn recv_range_change(&mut self) {
        self.range_changes += 1;
    }
}

/// Memory that records everything and accepts requests while `accepting` is set.
#[derive(Debug)]
pub struct MockMemory {
    pub accepting: bool,
    pub offers: u32,
    pub received: Vec<(Tick, Packet)>,
    pub resp_retries: u32,
    pub functional: u32,
    pub atomic_latency: Tick,
    pub ranges: Vec<AddrRange>,
}

impl MockMemory {
    pub fn new() -> Self {
        Self {
            accepting: true,
            offers: 0,
            received: Vec::new(),
            resp_retries: 0,
            functional: 0,
            atomic_latency: 30,
            ranges: vec![AddrRange::new(0, 1 << 32)],
        }
    }

    pub fn received_ids(&self) -> Vec<u64> {
        self.received.iter().map(|(_, p)| p.id.0).collect()
    }
}

impl AcceptsRequests for MockMemory {
    fn recv_timing_req(&mut self, pkt: Packet, now: Tick) -> Delivery {
        self.offers += 1;
        if !self.accepting {
            return Delivery::Rejected(pkt);
        }
        self.received.push((now, pkt));
        Delivery::Accepted
    }

    fn recv_resp_retry(&mut self) {
        self.resp_retries += 1;
    }

    fn addr_ranges(&self) -> Vec<AddrRange> {
        self.ranges.clone()
    }

    fn recv_functional(&mut self, _pkt: &mut Packet) {
        self.functional += 1;
    }

    fn recv_atomic(&mut self, pkt: &mut Packet) -> Tick {
        pkt.make_response();
        self.atomic_latency
    }
}

/// Processes every event of `component` due at or before `until`, then moves time there.
pub fn run_until<C: Interposer>(component: &mut C, events: &mut EventQueue<C::Event>, until: Tick) {
    while let Some((_, event)) = events.pop_until(until) {
        component
            .process(event, events)
            .expect("component event failed");
    }
    events.advance_to(until);
}
