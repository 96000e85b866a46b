//! Zero-latency pass-through: relays every packet and retry straight to the other side.
//! Used as the baseline the secure module's slowdown is measured against.

use crate::error::Result;
use crate::event::{Schedule, Tick};
use crate::packet::Packet;
use crate::port::{AcceptsRequests, AcceptsResponses, Delivery, Interposer};
use std::convert::Infallible;
use tracing::trace;

pub struct PassThrough<R, M> {
    requester: R,
    memory: M,
}

impl<R: AcceptsResponses, M: AcceptsRequests> PassThrough<R, M> {
    pub fn new(requester: R, memory: M) -> Self {
        Self { requester, memory }
    }
}

impl<R: AcceptsResponses, M: AcceptsRequests> Interposer for PassThrough<R, M> {
    type Requester = R;
    type Memory = M;
    type Event = Infallible;

    fn name(&self) -> &'static str {
        "pass_through"
    }

    fn startup<S: Schedule<Infallible>>(&mut self, _sched: &mut S) {}

    fn shutdown<S: Schedule<Infallible>>(&mut self, _sched: &mut S) {}

    fn process<S: Schedule<Infallible>>(&mut self, event: Infallible, _sched: &mut S) -> Result<()> {
        match event {}
    }

    fn recv_timing_req<S: Schedule<Infallible>>(
        &mut self,
        pkt: Packet,
        sched: &mut S,
    ) -> Result<Delivery> {
        trace!(pkt = %pkt.id, "pass request");
        Ok(self.memory.recv_timing_req(pkt, sched.now()))
    }

    fn recv_timing_resp<S: Schedule<Infallible>>(&mut self, pkt: Packet, sched: &mut S) -> Delivery {
        trace!(pkt = %pkt.id, "pass response");
        let now: Tick = sched.now();
        self.requester.recv_timing_resp(pkt, now)
    }

    fn recv_resp_retry<S: Schedule<Infallible>>(&mut self, _sched: &mut S) {
        self.memory.recv_resp_retry();
    }

    fn recv_req_retry<S: Schedule<Infallible>>(&mut self, _sched: &mut S) {
        self.requester.recv_req_retry();
    }

    fn requester(&self) -> &R {
        &self.requester
    }

    fn requester_mut(&mut self) -> &mut R {
        &mut self.requester
    }

    fn memory(&self) -> &M {
        &self.memory
    }

    fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventQueue;
    use crate::mock::{MockMemory, MockRequester};

    #[test]
    fn relays_both_directions_in_the_same_tick() {
        let mut pipe = PassThrough::new(MockRequester::new(), MockMemory::new());
        let mut ev: EventQueue<Infallible> = EventQueue::new();
        ev.advance_to(7);

        assert!(pipe.recv_timing_req(Packet::read(1, 0, 7), &mut ev).unwrap().is_accepted());
        assert_eq!(pipe.memory().received[0].0, 7);

        let mut resp = Packet::read(1, 0, 7);
        assert!(resp.make_response());
        assert!(pipe.recv_timing_resp(resp, &mut ev).is_accepted());
        assert_eq!(pipe.requester().received[0].0, 7);
        assert!(ev.is_empty());
    }

    #[test]
    fn rejections_and_retries_pass_through() {
        let mut pipe = PassThrough::new(MockRequester::new(), MockMemory::new());
        let mut ev: EventQueue<Infallible> = EventQueue::new();
        pipe.memory_mut().accepting = false;
        let pkt = Packet::write(2, 0x80, 0);
        assert_eq!(
            pipe.recv_timing_req(pkt.clone(), &mut ev).unwrap(),
            Delivery::Rejected(pkt)
        );

        pipe.recv_req_retry(&mut ev);
        pipe.recv_resp_retry(&mut ev);
        assert_eq!(pipe.requester().req_retries, 1);
        assert_eq!(pipe.memory().resp_retries, 1);
        assert_eq!(pipe.addr_ranges(), pipe.memory().ranges);
    }
}
