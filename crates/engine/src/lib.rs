//! Sender/Generator/Receiver session engine.
//!
//! This crate owns the agreed per-session parameters
//! ([`SessionConfig`]), the accumulated transfer counters
//! ([`Statistics`]), the filesystem seam the three state machines transfer
//! through ([`FsOps`]), and the state machines themselves: [`sender`]
//! services delta requests against the local tree, [`generator`] decides
//! which files need one, and [`receiver`] applies what comes back.
//!
//! The three are wired together over a real duplex channel and index codec
//! by [`pipeline`], run inline on the calling thread per the concurrency
//! model's common case, connected by bounded `crossbeam-channel` queues
//! ([`queues`]) for payloads with no wire codec yet; [`CancellationToken`]
//! lets one task unwind the others without a shared `Result`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod cancellation;
mod config;
mod error;
mod fsops;
pub mod generator;
pub mod pipeline;
pub mod queues;
pub mod receiver;
pub mod sender;
mod stats;
mod transport;

pub use cancellation::CancellationToken;
pub use config::{ConfigError, DeletePolicy, PreservationFlags, SessionConfig, SessionConfigBuilder};
pub use error::SessionError;
pub use fsops::{AtomicWrite, FileAttributes, FsOps};
pub use pipeline::{ControlEvent, ControlLog, Pipeline, PipelineDelta};
pub use stats::{FinalStatistics, Statistics};
