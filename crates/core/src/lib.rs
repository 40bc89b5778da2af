//! Public session API, unified error type and exit-code mapping.
//!
//! This crate is the thin seam a transport or CLI collaborator calls
//! through: [`handshake`] runs the version/checksum-seed exchange,
//! [`session::run_local_sync`] drives a whole transfer against the
//! Sender/Generator/Receiver state machines in [`engine`], and [`error`]
//! plus [`exit_code`] give every failure one exit code to report.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod exit_code;
pub mod handshake;
pub mod session;

pub use error::Error;
pub use exit_code::{ExitCode, HasExitCode};
pub use handshake::Role;
pub use session::{run_local_sync, SessionOutcome};
