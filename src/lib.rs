//! Secure memory intermediary simulator: latency-gated request queueing, retry-based flow
//! control, and baseline interconnects to measure it against.

pub mod channel;
pub mod config;
pub mod error;
pub mod event;
pub mod latency;
pub mod link;
pub mod memory;
pub mod metrics;
pub mod packet;
pub mod pipe;
pub mod port;
pub mod queue;
pub mod secure_module;
pub mod simulator;
pub mod workload;

#[cfg(test)]
mod mock;
