//! Metrics collection: module counters, requester-side latency, and run summaries.

use crate::event::Tick;
use crate::packet::CommandKind;

/// Counters exposed by the secure module. Monotonically increasing, read-only outside
/// the crate.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct SecureModuleStats {
    read_reqs: u64,
    write_reqs: u64,
}

impl SecureModuleStats {
    /// Number of read requests admitted.
    pub fn read_reqs(&self) -> u64 {
        self.read_reqs
    }

    /// Number of write requests admitted.
    pub fn write_reqs(&self) -> u64 {
        self.write_reqs
    }

    pub fn total(&self) -> u64 {
        self.read_reqs + self.write_reqs
    }

    pub(crate) fn record(&mut self, kind: CommandKind) {
        match kind {
            CommandKind::Read => self.read_reqs += 1,
            CommandKind::Write => self.write_reqs += 1,
            CommandKind::Other => {}
        }
    }
}

/// What the requester observed.
#[derive(Clone, Copy, Default, Debug)]
pub struct RequesterStats {
    pub issued: u64,
    pub rejected: u64,
    pub responses: u64,
    pub total_round_trip: Tick,
    pub max_round_trip: Tick,
    pub retries_received: u64,
    pub range_changes: u64,
}

impl RequesterStats {
    pub fn record_response(&mut self, round_trip: Tick) {
        self.responses += 1;
        self.total_round_trip += round_trip;
        self.max_round_trip = self.max_round_trip.max(round_trip);
    }
}

/// Summary of one run through a [`System`](crate::simulator::System).
#[derive(Clone, Default, Debug)]
pub struct RunMetrics {
    /// Intermediary under test.
    pub component: &'static str,
    /// Tick at which the last response reached the requester.
    pub total_ticks: Tick,
    pub requests_issued: u64,
    /// Requests the intermediary handed back to the requester.
    pub request_rejections: u64,
    pub responses_received: u64,
    pub total_round_trip_ticks: Tick,
    pub max_round_trip_ticks: Tick,
    /// Requests memory handed back to the intermediary.
    pub memory_rejections: u64,
}

impl RunMetrics {
    pub fn from_requester(component: &'static str, total_ticks: Tick, stats: &RequesterStats) -> Self {
        Self {
            component,
            total_ticks,
            requests_issued: stats.issued,
            request_rejections: stats.rejected,
            responses_received: stats.responses,
            total_round_trip_ticks: stats.total_round_trip,
            max_round_trip_ticks: stats.max_round_trip,
            memory_rejections: 0,
        }
    }

    pub fn avg_round_trip(&self) -> f64 {
        if self.responses_received == 0 {
            return 0.0;
        }
        self.total_round_trip_ticks as f64 / self.responses_received as f64
    }

    /// Slowdown = (actual_ticks - baseline_ticks) / baseline_ticks, or 0 if the baseline
    /// is 0 or not slower.
    pub fn slowdown_vs(&self, baseline_ticks: Tick) -> f64 {
        if baseline_ticks == 0 || self.total_ticks <= baseline_ticks {
            return 0.0;
        }
        (self.total_ticks - baseline_ticks) as f64 / baseline_ticks as f64
    }

    /// Percentage slowdown (0..100+).
    pub fn slowdown_percent(&self, baseline_ticks: Tick) -> f64 {
        self.slowdown_vs(baseline_ticks) * 100.0
    }
}
