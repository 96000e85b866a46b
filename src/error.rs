//! Error types for the simulator.
//!
//! Backpressure is not an error: a full queue or a busy peer is reported through
//! [`Delivery::Rejected`](crate::port::Delivery). Only defects that leave the model with
//! no safe way to continue are surfaced here.

use crate::packet::Addr;
use crate::event::Tick;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    /// A request whose command is neither a read nor a write reached a latency classifier.
    #[error("unclassifiable command {cmd} for addr {addr}")]
    UnclassifiedCommand { cmd: &'static str, addr: Addr },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A peer rejected a packet on a path that has no retry protocol.
    #[error("{component}: downstream rejected request for addr {addr}")]
    RequestRejected { component: &'static str, addr: Addr },

    /// The run exhausted its tick budget before all responses returned.
    #[error("simulation stalled at tick {tick}")]
    Stalled { tick: Tick },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
