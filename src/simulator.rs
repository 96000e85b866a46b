//! Event-driven system harness: a traffic generator and a memory wired through one
//! intermediary, stepped by a shared event queue.

use crate::error::{Result, SimError};
use crate::event::{EventQueue, PeriodicTask, Priority, Tick};
use crate::memory::SimpleMemory;
use crate::metrics::RunMetrics;
use crate::port::{Delivery, Interposer};
use crate::workload::TrafficGenerator;
use tracing::{debug, info};

/// Events on the system queue: the intermediary's own work plus the harness clock that
/// drives both peers.
#[derive(Debug)]
pub enum SimEvent<E> {
    Component(E),
    Clock,
}

impl<E> From<E> for SimEvent<E> {
    fn from(event: E) -> Self {
        SimEvent::Component(event)
    }
}

pub struct System<C: Interposer> {
    component: C,
    events: EventQueue<SimEvent<C::Event>>,
    clock: PeriodicTask,
    finished_at: Option<Tick>,
}

impl<C> System<C>
where
    C: Interposer<Requester = TrafficGenerator, Memory = SimpleMemory>,
{
    pub fn new(mut component: C) -> Self {
        let mut events: EventQueue<SimEvent<C::Event>> = EventQueue::new();
        let mut clock = PeriodicTask::new(Priority::EXTERNAL);
        component.startup(&mut events);
        clock.arm(&mut events, 0, SimEvent::<C::Event>::Clock);
        Self {
            component,
            events,
            clock,
            finished_at: None,
        }
    }

    pub fn component(&self) -> &C {
        &self.component
    }

    pub fn now(&self) -> Tick {
        self.events.now()
    }

    /// Runs until every response has reached the requester. Fails with `Stalled` if that
    /// has not happened by `max_ticks`.
    pub fn run_to_completion(&mut self, max_ticks: Tick) -> Result<RunMetrics> {
        while let Some((_, event)) = self.events.pop_until(max_ticks) {
            match event {
                SimEvent::Component(event) => self.component.process(event, &mut self.events)?,
                SimEvent::Clock => self.on_clock()?,
            }
        }
        let Some(total_ticks) = self.finished_at else {
            return Err(SimError::Stalled {
                tick: self.events.now(),
            });
        };
        let mut metrics = RunMetrics::from_requester(
            self.component.name(),
            total_ticks,
            self.component.requester().stats(),
        );
        metrics.memory_rejections = self.component.memory().stats().rejections;
        info!(
            component = metrics.component,
            ticks = total_ticks,
            responses = metrics.responses_received,
            "run complete"
        );
        Ok(metrics)
    }

    fn on_clock(&mut self) -> Result<()> {
        self.clock.fired();
        let now = self.events.now();

        if let Some(resp) = self.component.memory_mut().pop_ready(now) {
            if let Delivery::Rejected(resp) = self.component.recv_timing_resp(resp, &mut self.events) {
                self.component.memory_mut().on_response_rejected(resp, now);
            }
        }
        if self.component.memory_mut().take_retry_owed() {
            debug!(tick = now, "memory has room again");
            self.component.recv_req_retry(&mut self.events);
        }
        if let Some(pkt) = self.component.requester_mut().next_request(now) {
            match self.component.recv_timing_req(pkt, &mut self.events)? {
                Delivery::Accepted => self.component.requester_mut().on_accepted(),
                Delivery::Rejected(pkt) => self.component.requester_mut().on_rejected(pkt),
            }
        }

        if self.component.requester().is_done() {
            self.finished_at = Some(now);
            self.component.shutdown(&mut self.events);
        } else {
            self.clock
                .arm(&mut self.events, now + 1, SimEvent::<C::Event>::Clock);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{FixedLatencyLink, LinkConfig};
    use crate::memory::MemoryConfig;
    use crate::pipe::PassThrough;
    use crate::secure_module::{SecureModule, SecureModuleConfig};
    use crate::workload::WorkloadConfig;

    fn workload(num_requests: usize) -> TrafficGenerator {
        TrafficGenerator::new(WorkloadConfig {
            num_requests,
            ..WorkloadConfig::default()
        })
    }

    fn memory(latency: Tick) -> SimpleMemory {
        SimpleMemory::new(MemoryConfig {
            access_latency_ticks: latency,
            ..MemoryConfig::default()
        })
    }

    #[test]
    fn pass_through_single_request_round_trip() {
        let mut sys = System::new(PassThrough::new(workload(1), memory(10)));
        let m = sys.run_to_completion(1_000).unwrap();
        assert_eq!(m.component, "pass_through");
        assert_eq!(m.total_ticks, 10);
        assert_eq!(m.max_round_trip_ticks, 10);
        assert_eq!(m.responses_received, 1);
    }

    #[test]
    fn secure_module_adds_issue_and_response_latency() {
        let cfg = SecureModuleConfig {
            mem_issue_latency: 0,
            read_issue_latency: 1,
            ..SecureModuleConfig::default()
        };
        let module = SecureModule::new(cfg, workload(1), memory(10)).unwrap();
        let mut sys = System::new(module);
        let m = sys.run_to_completion(1_000).unwrap();
        // forwarded at 2, response ready at 12, leaves the response queue at 13
        assert_eq!(m.total_ticks, 13);
        assert_eq!(sys.component().stats().read_reqs(), 1);
        assert!(!sys.component().is_running());
    }

    #[test]
    fn link_adds_latency_both_ways() {
        let cfg = LinkConfig {
            latency: 2,
            clock_period: 1,
        };
        let link = FixedLatencyLink::new(cfg, workload(1), memory(10)).unwrap();
        let m = System::new(link).run_to_completion(1_000).unwrap();
        assert_eq!(m.total_ticks, 14);
    }

    #[test]
    fn secure_module_is_slower_than_baseline() {
        let base = System::new(PassThrough::new(workload(50), memory(20)))
            .run_to_completion(100_000)
            .unwrap();
        let module =
            SecureModule::new(SecureModuleConfig::default(), workload(50), memory(20)).unwrap();
        let secure = System::new(module).run_to_completion(100_000).unwrap();
        assert_eq!(secure.responses_received, 50);
        assert!(secure.total_ticks > base.total_ticks);
        assert!(secure.slowdown_percent(base.total_ticks) > 0.0);
    }

    #[test]
    fn backpressure_from_small_queues_still_completes() {
        let cfg = SecureModuleConfig {
            request_queue_size: 1,
            response_queue_size: 1,
            ..SecureModuleConfig::default()
        };
        let mem = SimpleMemory::new(MemoryConfig {
            access_latency_ticks: 5,
            max_outstanding: 1,
            ..MemoryConfig::default()
        });
        let module = SecureModule::new(cfg, workload(20), mem).unwrap();
        let mut sys = System::new(module);
        let m = sys.run_to_completion(10_000).unwrap();
        assert_eq!(m.responses_received, 20);
        assert!(m.request_rejections > 0);
        assert!(m.memory_rejections > 0);
        assert_eq!(sys.component().status().request_queue_len, 0);
    }

    #[test]
    fn tick_budget_exhaustion_is_stalled() {
        let mut sys = System::new(PassThrough::new(workload(5), memory(100)));
        let err = sys.run_to_completion(50).unwrap_err();
        assert!(matches!(err, SimError::Stalled { tick: 50 }));
    }
}
