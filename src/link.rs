//! Fixed-latency link: every packet is delayed by the same number of cycles in either
//! direction. It has no request buffering, so a memory rejection is a configuration defect.

use crate::error::{Result, SimError};
use crate::event::{clock_edge, Cycles, Schedule, Tick};
use crate::packet::Packet;
use crate::port::{AcceptsRequests, AcceptsResponses, Delivery, Interposer};
use serde::Deserialize;
use std::collections::VecDeque;
use tracing::{debug, trace};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Cycles added in each direction.
    pub latency: Cycles,
    /// Ticks per clock cycle.
    pub clock_period: Tick,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            latency: 1,
            clock_period: 1,
        }
    }
}

impl LinkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.clock_period == 0 {
            return Err(SimError::InvalidConfig(
                "link clock period must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum LinkEvent {
    DeliverRequest(Packet),
    DeliverResponse(Packet),
}

pub struct FixedLatencyLink<R, M> {
    config: LinkConfig,
    /// Responses the requester refused, in arrival order.
    stalled: VecDeque<Packet>,
    resp_blocked: bool,
    requester: R,
    memory: M,
}

impl<R: AcceptsResponses, M: AcceptsRequests> FixedLatencyLink<R, M> {
    pub fn new(config: LinkConfig, requester: R, memory: M) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            stalled: VecDeque::new(),
            resp_blocked: false,
            requester,
            memory,
        })
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Responses waiting for the requester's retry.
    pub fn stalled(&self) -> usize {
        self.stalled.len()
    }

    fn arrival(&self, now: Tick) -> Tick {
        clock_edge(now, self.config.latency, self.config.clock_period)
    }

    fn deliver_response(&mut self, pkt: Packet, now: Tick) {
        if self.resp_blocked {
            self.stalled.push_back(pkt);
            return;
        }
        if let Delivery::Rejected(pkt) = self.requester.recv_timing_resp(pkt, now) {
            debug!(pkt = %pkt.id, "requester refused response, stalling");
            self.resp_blocked = true;
            self.stalled.push_back(pkt);
        }
    }
}

impl<R: AcceptsResponses, M: AcceptsRequests> Interposer for FixedLatencyLink<R, M> {
    type Requester = R;
    type Memory = M;
    type Event = LinkEvent;

    fn name(&self) -> &'static str {
        "fixed_latency_link"
    }

    fn startup<S: Schedule<LinkEvent>>(&mut self, _sched: &mut S) {}

    fn shutdown<S: Schedule<LinkEvent>>(&mut self, _sched: &mut S) {}

    fn process<S: Schedule<LinkEvent>>(&mut self, event: LinkEvent, sched: &mut S) -> Result<()> {
        let now = sched.now();
        match event {
            LinkEvent::DeliverRequest(pkt) => {
                trace!(pkt = %pkt.id, tick = now, "request leaves link");
                if let Delivery::Rejected(pkt) = self.memory.recv_timing_req(pkt, now) {
                    return Err(SimError::RequestRejected {
                        component: self.name(),
                        addr: pkt.addr,
                    });
                }
            }
            LinkEvent::DeliverResponse(pkt) => {
                trace!(pkt = %pkt.id, tick = now, "response leaves link");
                self.deliver_response(pkt, now);
            }
        }
        Ok(())
    }

    fn recv_timing_req<S: Schedule<LinkEvent>>(
        &mut self,
        pkt: Packet,
        sched: &mut S,
    ) -> Result<Delivery> {
        let at = self.arrival(sched.now());
        sched.schedule(at, LinkEvent::DeliverRequest(pkt));
        Ok(Delivery::Accepted)
    }

    fn recv_timing_resp<S: Schedule<LinkEvent>>(&mut self, pkt: Packet, sched: &mut S) -> Delivery {
        let at = self.arrival(sched.now());
        sched.schedule(at, LinkEvent::DeliverResponse(pkt));
        Delivery::Accepted
    }

    fn recv_resp_retry<S: Schedule<LinkEvent>>(&mut self, sched: &mut S) {
        let now = sched.now();
        self.resp_blocked = false;
        while let Some(pkt) = self.stalled.pop_front() {
            if let Delivery::Rejected(pkt) = self.requester.recv_timing_resp(pkt, now) {
                self.resp_blocked = true;
                self.stalled.push_front(pkt);
                break;
            }
        }
    }

    fn recv_req_retry<S: Schedule<LinkEvent>>(&mut self, _sched: &mut S) {
        debug!("request retry ignored, link never holds requests");
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
    use crate::mock::{run_until, MockMemory, MockRequester};
    use crate::packet::Addr;

    type Link = FixedLatencyLink<MockRequester, MockMemory>;

    fn link(latency: Cycles, clock_period: Tick) -> (Link, EventQueue<LinkEvent>) {
        let cfg = LinkConfig {
            latency,
            clock_period,
        };
        let l = FixedLatencyLink::new(cfg, MockRequester::new(), MockMemory::new()).unwrap();
        (l, EventQueue::new())
    }

    #[test]
    fn delays_both_directions() {
        let (mut l, mut ev) = link(3, 1);
        assert!(l.recv_timing_req(Packet::read(1, 0, 0), &mut ev).unwrap().is_accepted());
        run_until(&mut l, &mut ev, 2);
        assert!(l.memory().received.is_empty());
        run_until(&mut l, &mut ev, 3);
        assert_eq!(l.memory().received[0].0, 3);

        let mut resp = Packet::read(1, 0, 0);
        assert!(resp.make_response());
        assert!(l.recv_timing_resp(resp, &mut ev).is_accepted());
        run_until(&mut l, &mut ev, 6);
        assert_eq!(l.requester().received[0].0, 6);
    }

    #[test]
    fn aligns_to_clock_edge() {
        let (mut l, mut ev) = link(1, 10);
        ev.advance_to(4);
        assert!(l.recv_timing_req(Packet::write(1, 0, 4), &mut ev).unwrap().is_accepted());
        run_until(&mut l, &mut ev, 30);
        assert_eq!(l.memory().received[0].0, 20);
    }

    #[test]
    fn memory_rejection_is_fatal() {
        let (mut l, mut ev) = link(1, 1);
        l.memory_mut().accepting = false;
        assert!(l.recv_timing_req(Packet::read(1, 0x80, 0), &mut ev).unwrap().is_accepted());
        let (_, event) = ev.pop().unwrap();
        let err = l.process(event, &mut ev).unwrap_err();
        assert!(matches!(
            err,
            SimError::RequestRejected { component: "fixed_latency_link", addr } if addr == Addr(0x80)
        ));
    }

    #[test]
    fn refused_responses_stall_until_retry() {
        let (mut l, mut ev) = link(1, 1);
        l.requester_mut().accepting = false;
        for id in 1..=2 {
            let mut resp = Packet::read(id, 0, 0);
            assert!(resp.make_response());
            assert!(l.recv_timing_resp(resp, &mut ev).is_accepted());
        }
        run_until(&mut l, &mut ev, 5);
        assert_eq!(l.stalled(), 2);
        assert_eq!(l.requester().offers, 1, "second response queued behind the first");

        l.requester_mut().accepting = true;
        l.recv_resp_retry(&mut ev);
        assert_eq!(l.stalled(), 0);
        let ids: Vec<u64> = l.requester().received.iter().map(|(_, p)| p.id.0).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn zero_period_rejected() {
        let cfg = LinkConfig {
            latency: 1,
            clock_period: 0,
        };
        assert!(FixedLatencyLink::new(cfg, MockRequester::new(), MockMemory::new()).is_err());
    }
}
