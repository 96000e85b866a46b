//! Secure memory intermediary: holds every request for a command-dependent security-check
//! latency in a bounded queue before it may reach memory, and buffers responses on the
//! way back. Both directions use the retry protocol of [`crate::port`].
//!
//! ```text
//!  requester --recv_timing_req--> [RequestChannel] -> request queue --(ready head)--+
//!                                                                                   v
//!  requester <--forward_response-- response queue <- [ResponseChannel] <--> memory
//! ```
//!
//! A periodic driver runs once per clock edge, after that edge's latency completions:
//! it tries one request drain, then one response drain, then sends at most one owed retry
//! to each peer.

use crate::channel::{ChannelState, RequestChannel, RequestQueue, ResponseChannel, ResponseQueue};
use crate::error::{Result, SimError};
use crate::event::{clock_edge, Cycles, PeriodicTask, Priority, Schedule, Tick};
use crate::latency::{LatencyTimer, SlotId};
use crate::metrics::SecureModuleStats;
use crate::packet::{CommandKind, Packet};
use crate::port::{AcceptsRequests, AcceptsResponses, Delivery, Interposer};
use serde::Deserialize;
use tracing::{debug, trace};

/// Configuration for the secure module. Immutable after construction.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SecureModuleConfig {
    /// Request queue capacity (entries).
    pub request_queue_size: usize,
    /// Response queue capacity (entries).
    pub response_queue_size: usize,
    /// Cycles common to every request before it may issue to memory.
    pub mem_issue_latency: Cycles,
    /// Additional cycles for reads (tag verification).
    pub read_issue_latency: Cycles,
    /// Additional cycles for writes (tag calculation).
    pub write_issue_latency: Cycles,
    /// Ticks per clock cycle.
    pub clock_period: Tick,
}

impl Default for SecureModuleConfig {
    fn default() -> Self {
        Self {
            request_queue_size: 16,
            response_queue_size: 16,
            mem_issue_latency: 1,
            read_issue_latency: 2,
            write_issue_latency: 2,
            clock_period: 1,
        }
    }
}

impl SecureModuleConfig {
    pub fn validate(&self) -> Result<()> {
        if self.request_queue_size == 0 || self.response_queue_size == 0 {
            return Err(SimError::InvalidConfig(
                "secure module queue sizes must be non-zero".into(),
            ));
        }
        if self.clock_period == 0 {
            return Err(SimError::InvalidConfig(
                "secure module clock period must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Cycles a request of `kind` waits before it may issue. `None` for commands the
    /// module has no latency policy for.
    pub fn issue_cycles(&self, kind: CommandKind) -> Option<Cycles> {
        let extra = match kind {
            CommandKind::Read => self.read_issue_latency,
            CommandKind::Write => self.write_issue_latency,
            CommandKind::Other => return None,
        };
        Some(self.mem_issue_latency + extra + 1)
    }
}

/// Timed work of the secure module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecureEvent {
    /// Per-cycle driver.
    Cycle,
    /// The security check for the request holding this slot has finished.
    LatencyElapsed(SlotId),
}

/// Snapshot of the module's queues and flow-control flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModuleStatus {
    pub request_queue_len: usize,
    pub response_queue_len: usize,
    /// Upstream (requester-facing) flags.
    pub cpu_side: ChannelState,
    /// Downstream (memory-facing) flags.
    pub mem_side: ChannelState,
}

pub struct SecureModule<R, M> {
    config: SecureModuleConfig,
    cpu_side: RequestChannel,
    mem_side: ResponseChannel,
    request_queue: RequestQueue,
    response_queue: ResponseQueue,
    timer: LatencyTimer,
    driver: PeriodicTask,
    stats: SecureModuleStats,
    requester: R,
    memory: M,
}

impl<R: AcceptsResponses, M: AcceptsRequests> SecureModule<R, M> {
    pub fn new(config: SecureModuleConfig, requester: R, memory: M) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            request_queue: RequestQueue::new(config.request_queue_size),
            response_queue: ResponseQueue::new(config.response_queue_size),
            config,
            cpu_side: RequestChannel::new(),
            mem_side: ResponseChannel::new(),
            timer: LatencyTimer::new(),
            driver: PeriodicTask::new(Priority::CLOCK),
            stats: SecureModuleStats::default(),
            requester,
            memory,
        })
    }

    pub fn config(&self) -> &SecureModuleConfig {
        &self.config
    }

    pub fn stats(&self) -> &SecureModuleStats {
        &self.stats
    }

    pub fn status(&self) -> ModuleStatus {
        ModuleStatus {
            request_queue_len: self.request_queue.len(),
            response_queue_len: self.response_queue.len(),
            cpu_side: self.cpu_side.state(),
            mem_side: self.mem_side.state(),
        }
    }

    /// Whether the periodic driver is armed.
    pub fn is_running(&self) -> bool {
        self.driver.is_running()
    }

    /// Stops the periodic driver. Pending latency completions still fire.
    pub fn stop<S: Schedule<SecureEvent>>(&mut self, sched: &mut S) {
        if let Some(pending) = self.driver.stop() {
            sched.deschedule(pending);
            debug!(tick = sched.now(), "secure module driver stopped");
        }
    }

    fn request_head_ready(&self) -> bool {
        self.request_queue
            .front()
            .map_or(false, |head| self.timer.is_ready(head.slot))
    }

    fn cycle<S: Schedule<SecureEvent>>(&mut self, sched: &mut S) {
        self.driver.fired();
        let now = sched.now();
        trace!(
            tick = now,
            requests = self.request_queue.len(),
            responses = self.response_queue.len(),
            pending_request_retry = self.cpu_side.state().pending_retry,
            pending_response_retry = self.mem_side.state().pending_retry,
            "cycle"
        );

        if self.request_head_ready() {
            self.mem_side.forward_request(
                &mut self.request_queue,
                &mut self.timer,
                &mut self.memory,
                now,
            );
        }
        if !self.response_queue.is_empty() {
            self.cpu_side
                .forward_response(&mut self.response_queue, &mut self.requester, now);
        }
        if self.cpu_side.take_retry() {
            debug!(tick = now, "sending request retry to requester");
            self.requester.recv_req_retry();
        }
        if self.mem_side.take_retry() {
            debug!(tick = now, "sending response retry to memory");
            self.memory.recv_resp_retry();
        }

        let next = clock_edge(now, 1, self.config.clock_period);
        self.driver.arm(sched, next, SecureEvent::Cycle);
    }
}

impl<R: AcceptsResponses, M: AcceptsRequests> Interposer for SecureModule<R, M> {
    type Requester = R;
    type Memory = M;
    type Event = SecureEvent;

    fn name(&self) -> &'static str {
        "secure_module"
    }

    fn startup<S: Schedule<SecureEvent>>(&mut self, sched: &mut S) {
        let first = clock_edge(sched.now(), 1, self.config.clock_period);
        debug!(first, "secure module startup");
        self.driver.arm(sched, first, SecureEvent::Cycle);
    }

    fn shutdown<S: Schedule<SecureEvent>>(&mut self, sched: &mut S) {
        self.stop(sched);
    }

    fn process<S: Schedule<SecureEvent>>(&mut self, event: SecureEvent, sched: &mut S) -> Result<()> {
        match event {
            SecureEvent::Cycle => self.cycle(sched),
            SecureEvent::LatencyElapsed(slot) => {
                if self.timer.complete(slot) {
                    trace!(tick = sched.now(), "security check complete");
                }
            }
        }
        Ok(())
    }

    fn recv_timing_req<S: Schedule<SecureEvent>>(
        &mut self,
        pkt: Packet,
        sched: &mut S,
    ) -> Result<Delivery> {
        let kind = pkt.cmd.kind();
        let Some(cycles) = self.config.issue_cycles(kind) else {
            return Err(SimError::UnclassifiedCommand {
                cmd: pkt.cmd.name(),
                addr: pkt.addr,
            });
        };
        debug!(pkt = %pkt.id, cmd = %pkt.cmd, addr = %pkt.addr, "request received");
        let ready_at = clock_edge(sched.now(), cycles, self.config.clock_period);
        let delivery = self.cpu_side.receive_request(
            pkt,
            ready_at,
            &mut self.request_queue,
            &mut self.timer,
            sched,
            SecureEvent::LatencyElapsed,
        );
        if delivery.is_accepted() {
            self.stats.record(kind);
        }
        Ok(delivery)
    }

    fn recv_timing_resp<S: Schedule<SecureEvent>>(&mut self, pkt: Packet, _sched: &mut S) -> Delivery {
        debug!(pkt = %pkt.id, addr = %pkt.addr, "response received");
        self.mem_side.receive_response(pkt, &mut self.response_queue)
    }

    fn recv_resp_retry<S: Schedule<SecureEvent>>(&mut self, sched: &mut S) {
        debug!(tick = sched.now(), "requester unblocked");
        self.cpu_side.on_requester_unblocked();
    }

    fn recv_req_retry<S: Schedule<SecureEvent>>(&mut self, sched: &mut S) {
        let now = sched.now();
        debug!(tick = now, "memory unblocked");
        self.mem_side.on_memory_unblocked(
            &mut self.request_queue,
            &mut self.timer,
            &mut self.memory,
            now,
        );
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
