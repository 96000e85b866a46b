//! Downstream memory model with configurable access latency (modeling DRAM).

use crate::error::{Result, SimError};
use crate::event::Tick;
use crate::packet::{AddrRange, Packet};
use crate::port::{AcceptsRequests, Delivery};
use serde::Deserialize;
use std::collections::VecDeque;
use tracing::debug;

/// Configuration for the memory model.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Ticks from accepting a request to its response being ready.
    pub access_latency_ticks: Tick,
    /// Requests in service at once; further requests are rejected.
    pub max_outstanding: usize,
    /// Size of the single address range served, starting at 0.
    pub size_bytes: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            access_latency_ticks: 40,
            max_outstanding: 8,
            size_bytes: 4 << 30,
        }
    }
}

impl MemoryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_outstanding == 0 {
            return Err(SimError::InvalidConfig(
                "memory max_outstanding must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Default, Debug)]
pub struct MemoryStats {
    pub accesses: u64,
    pub rejections: u64,
}

/// Memory subsystem. Models latency and occupancy only; data is not stored.
pub struct SimpleMemory {
    config: MemoryConfig,
    /// Responses in service, ordered by ready tick.
    in_service: VecDeque<(Tick, Packet)>,
    /// The upstream port refused a response; wait for its retry.
    resp_blocked: bool,
    /// A request was rejected; the sender expects a retry once there is room.
    retry_owed: bool,
    stats: MemoryStats,
}

impl SimpleMemory {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            in_service: VecDeque::new(),
            resp_blocked: false,
            retry_owed: false,
            stats: MemoryStats::default(),
        }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn stats(&self) -> &MemoryStats {
        &self.stats
    }

    pub fn outstanding(&self) -> usize {
        self.in_service.len()
    }

    /// Takes the oldest response if it is due and the upstream port is not blocked.
    pub fn pop_ready(&mut self, now: Tick) -> Option<Packet> {
        if self.resp_blocked {
            return None;
        }
        match self.in_service.front() {
            Some((ready_at, _)) if *ready_at <= now => self.in_service.pop_front().map(|(_, p)| p),
            _ => None,
        }
    }

    /// The upstream port refused `pkt`: keep it first in line until a response retry.
    pub fn on_response_rejected(&mut self, pkt: Packet, now: Tick) {
        debug!(pkt = %pkt.id, "memory response refused, waiting for retry");
        self.resp_blocked = true;
        self.in_service.push_front((now, pkt));
    }

    /// Consumes an owed request retry once there is room to honor it.
    pub fn take_retry_owed(&mut self) -> bool {
        if self.retry_owed && self.in_service.len() < self.config.max_outstanding {
            self.retry_owed = false;
            return true;
        }
        false
    }
}

impl AcceptsRequests for SimpleMemory {
    fn recv_timing_req(&mut self, mut pkt: Packet, now: Tick) -> Delivery {
        if self.in_service.len() >= self.config.max_outstanding {
            self.retry_owed = true;
            self.stats.rejections += 1;
            return Delivery::Rejected(pkt);
        }
        self.stats.accesses += 1;
        if pkt.make_response() {
            self.in_service
                .push_back((now + self.config.access_latency_ticks, pkt));
        }
        Delivery::Accepted
    }

    fn recv_resp_retry(&mut self) {
        self.resp_blocked = false;
    }

    fn addr_ranges(&self) -> Vec<AddrRange> {
        vec![AddrRange::new(0, self.config.size_bytes)]
    }

    fn recv_functional(&mut self, pkt: &mut Packet) {
        pkt.make_response();
    }

    fn recv_atomic(&mut self, pkt: &mut Packet) -> Tick {
        self.stats.accesses += 1;
        pkt.make_response();
        self.config.access_latency_ticks
    }
}
