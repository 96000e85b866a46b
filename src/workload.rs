//! Requester model: a traffic generator issuing read/write requests and tracking latency.

use crate::error::{Result, SimError};
use crate::event::Tick;
use crate::metrics::RequesterStats;
use crate::packet::Packet;
use crate::port::{AcceptsResponses, Delivery};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tracing::debug;

/// Address pattern of generated requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccessPattern {
    /// Consecutive lines.
    Sequential,
    /// Fixed byte stride between consecutive requests.
    Strided { stride: u64 },
    /// Uniform over the working set; the seed makes runs reproducible.
    Random { seed: u64 },
}

/// Configuration for the traffic generator.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    pub num_requests: usize,
    /// Fraction of requests that are reads (0.0..=1.0); the rest are writes.
    pub read_fraction: f64,
    pub access_pattern: AccessPattern,
    /// Line size (bytes): access size and stride for sequential.
    pub line_size: u64,
    /// Cap on distinct lines touched. 0 = no cap.
    pub working_set_lines: u64,
    /// Requests awaiting a response before issue pauses.
    pub max_outstanding: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            num_requests: 1000,
            read_fraction: 0.7,
            access_pattern: AccessPattern::Sequential,
            line_size: 64,
            working_set_lines: 0,
            max_outstanding: 8,
        }
    }
}

impl WorkloadConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.read_fraction) {
            return Err(SimError::InvalidConfig(format!(
                "read_fraction {} outside 0..=1",
                self.read_fraction
            )));
        }
        if self.line_size == 0 {
            return Err(SimError::InvalidConfig("line_size must be non-zero".into()));
        }
        if self.max_outstanding == 0 {
            return Err(SimError::InvalidConfig(
                "workload max_outstanding must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Issues at most one request per tick. A rejected request is held and reissued
/// after the receiver's retry notification.
pub struct TrafficGenerator {
    config: WorkloadConfig,
    rng: StdRng,
    /// Next request index.
    index: u64,
    /// Request handed back by the receiver, reissued first.
    held: Option<Packet>,
    waiting_retry: bool,
    stats: RequesterStats,
}

impl TrafficGenerator {
    pub fn new(config: WorkloadConfig) -> Self {
        let seed = match config.access_pattern {
            AccessPattern::Random { seed } => seed,
            _ => 0,
        };
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
            index: 0,
            held: None,
            waiting_retry: false,
            stats: RequesterStats::default(),
        }
    }

    /// The next request to offer at `now`, if any. `None` while waiting for a retry.
    pub fn next_request(&mut self, now: Tick) -> Option<Packet> {
        if self.waiting_retry {
            return None;
        }
        if let Some(pkt) = self.held.take() {
            return Some(pkt);
        }
        if self.index >= self.config.num_requests as u64
            || self.outstanding() >= self.config.max_outstanding
        {
            return None;
        }
        let idx = self.index;
        self.index += 1;
        let addr = self.next_address(idx);
        let frac = (self.config.read_fraction * 100.0).round() as u64;
        let pkt = if idx % 100 < frac.min(100) {
            Packet::read(idx, addr, now)
        } else {
            Packet::write(idx, addr, now)
        };
        Some(pkt)
    }

    pub fn on_accepted(&mut self) {
        self.stats.issued += 1;
    }

    pub fn on_rejected(&mut self, pkt: Packet) {
        debug!(pkt = %pkt.id, "request rejected, waiting for retry");
        self.stats.rejected += 1;
        self.held = Some(pkt);
        self.waiting_retry = true;
    }

    /// All requests issued and every response received.
    pub fn is_done(&self) -> bool {
        self.stats.responses >= self.config.num_requests as u64
    }

    pub fn is_waiting_retry(&self) -> bool {
        self.waiting_retry
    }

    pub fn outstanding(&self) -> u64 {
        self.stats.issued.saturating_sub(self.stats.responses)
    }

    pub fn stats(&self) -> &RequesterStats {
        &self.stats
    }

    pub fn config(&self) -> &WorkloadConfig {
        &self.config
    }

    fn next_address(&mut self, idx: u64) -> u64 {
        let line = self.config.line_size;
        let cap = self.config.working_set_lines;
        match self.config.access_pattern {
            AccessPattern::Sequential => {
                let line_idx = if cap > 0 { idx % cap } else { idx };
                line_idx.wrapping_mul(line)
            }
            AccessPattern::Strided { stride } => {
                let addr = idx.wrapping_mul(stride);
                if cap > 0 {
                    addr % (cap * line)
                } else {
                    addr
                }
            }
            AccessPattern::Random { .. } => {
                let lines = if cap > 0 { cap } else { 1 << 20 };
                self.rng.gen_range(0..lines) * line
            }
        }
    }
}

impl AcceptsResponses for TrafficGenerator {
    fn recv_timing_resp(&mut self, pkt: Packet, now: Tick) -> Delivery {
        let round_trip = now.saturating_sub(pkt.created_at);
        debug!(pkt = %pkt.id, round_trip, "response received");
        self.stats.record_response(round_trip);
        Delivery::Accepted
    }

    fn recv_req_retry(&mut self) {
        self.stats.retries_received += 1;
        self.waiting_retry = false;
    }

    fn recv_range_change(&mut self) {
        self.stats.range_changes += 1;
    }
}
