#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! In-process collection pipeline for `metrod-agent` (pollers, fan-in,
//! batching, bounded parallel delivery).

/// Public API for the agent engine crate.
pub mod api;

/// Delivery backends for metric batches.
pub mod transport;

mod dispatch;
mod engine;
mod pipeline;
mod poller;
mod stats;

pub use api::{AgentConfig, AgentHandle, start_agent};
pub use transport::{HttpSender, Transport, TransportError};
