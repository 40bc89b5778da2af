//! The unified error type a session-level caller sees, and the
//! [`HasExitCode`] mapping for every constituent crate's error enum.

use crate::exit_code::{ExitCode, HasExitCode};

/// Top-level error returned by [`crate::session`] operations.
///
/// Wraps each constituent crate's own error type rather than re-deriving
/// their variants, so `source()` chains stay intact end-to-end.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A failure raised by the Sender/Generator/Receiver session engine.
    #[error(transparent)]
    Session(#[from] engine::SessionError),

    /// The version/checksum-seed handshake failed before a session began.
    #[error(transparent)]
    Negotiation(#[from] protocol::NegotiationError),

    /// I/O on the underlying transport, outside of an active session (for
    /// example while exchanging the handshake bytes).
    #[error("transport I/O failed: {0}")]
    Transport(#[from] std::io::Error),
}

impl HasExitCode for Error {
    fn exit_code(&self) -> ExitCode {
        match self {
            Self::Session(source) => source.exit_code(),
            Self::Negotiation(_) => ExitCode::StartClient,
            Self::Transport(source) => ExitCode::from_io_error(source),
        }
    }
}

impl HasExitCode for engine::SessionError {
    fn exit_code(&self) -> ExitCode {
        match self {
            Self::Protocol(_) => ExitCode::Protocol,
            Self::Negotiation(_) => ExitCode::StartClient,
            Self::Channel(_) => ExitCode::SocketIo,
            Self::ChannelEof => ExitCode::StreamIo,
            Self::Security(_) => ExitCode::FileSelect,
            Self::FileSystem { .. } => ExitCode::FileIo,
            Self::Matching(_) | Self::Signature(_) | Self::FileList(_) | Self::FileListCodec(_) => ExitCode::StreamIo,
            Self::Filter(_) | Self::Config(_) => ExitCode::Syntax,
            Self::Interrupted => ExitCode::Signal,
        }
    }
}
