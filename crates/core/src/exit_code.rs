//! Exit codes matching upstream rsync's `errcode.h`, and the trait every
//! constituent crate's error type implements so [`crate::error::Error`] can
//! derive its own exit code without re-deriving the mapping.

use std::fmt;

/// Exit codes returned by an rsync session, mirroring upstream's
/// `errcode.h` numbering exactly so a CLI collaborator's process exit
/// status matches rsync's for the same failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ExitCode {
    /// Successful completion (`RERR_OK`).
    Ok = 0,
    /// Syntax or usage error (`RERR_SYNTAX`).
    Syntax = 1,
    /// Protocol incompatibility (`RERR_PROTOCOL`).
    Protocol = 2,
    /// Errors selecting input/output files or directories (`RERR_FILESELECT`).
    FileSelect = 3,
    /// Requested action not supported (`RERR_UNSUPPORTED`).
    Unsupported = 4,
    /// Error starting the client-server protocol (`RERR_STARTCLIENT`).
    StartClient = 5,
    /// Error in socket I/O (`RERR_SOCKETIO`).
    SocketIo = 10,
    /// Error in file I/O (`RERR_FILEIO`).
    FileIo = 11,
    /// Error in the rsync protocol data stream (`RERR_STREAMIO`).
    StreamIo = 12,
    /// Errors with program diagnostics (`RERR_MESSAGEIO`).
    MessageIo = 13,
    /// Error in IPC code (`RERR_IPC`).
    Ipc = 14,
    /// Received SIGINT, SIGTERM or SIGHUP (`RERR_SIGNAL`).
    Signal = 20,
    /// Error allocating core memory buffers (`RERR_MALLOC`).
    Malloc = 22,
    /// Partial transfer due to error (`RERR_PARTIAL`); the most common
    /// non-zero code, returned when some files could not be transferred.
    PartialTransfer = 23,
    /// File(s) vanished on the sender side (`RERR_VANISHED`).
    Vanished = 24,
    /// Skipped some deletes due to a delete limit (`RERR_DEL_LIMIT`).
    DeleteLimit = 25,
    /// Timeout in data send/receive (`RERR_TIMEOUT`).
    Timeout = 30,
    /// Timeout waiting for a daemon connection (`RERR_CONTIMEOUT`).
    ConnectionTimeout = 35,
}

impl ExitCode {
    /// The numeric exit code value.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// A human-readable description, matching upstream's `log.c` wording.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Ok => "success",
            Self::Syntax => "syntax or usage error",
            Self::Protocol => "protocol incompatibility",
            Self::FileSelect => "errors selecting input/output files, dirs",
            Self::Unsupported => "requested action not supported",
            Self::StartClient => "error starting client-server protocol",
            Self::SocketIo => "error in socket IO",
            Self::FileIo => "error in file IO",
            Self::StreamIo => "error in rsync protocol data stream",
            Self::MessageIo => "errors with program diagnostics",
            Self::Ipc => "error in IPC code",
            Self::Signal => "received SIGINT, SIGTERM, or SIGHUP",
            Self::Malloc => "error allocating core memory buffers",
            Self::PartialTransfer => "partial transfer",
            Self::Vanished => "some files vanished before they could be transferred",
            Self::DeleteLimit => "max delete limit stopped deletions",
            Self::Timeout => "timeout in data send/receive",
            Self::ConnectionTimeout => "timeout waiting for daemon connection",
        }
    }

    /// Whether this represents a successful exit.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Whether this is a fatal error that should stop the transfer, as
    /// opposed to a partial-transfer condition the session otherwise
    /// recovered from.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(
            self,
            Self::Protocol
                | Self::StartClient
                | Self::SocketIo
                | Self::StreamIo
                | Self::Ipc
                | Self::Malloc
                | Self::Timeout
                | Self::ConnectionTimeout
        )
    }

    /// Maps a [`std::io::Error`] to the exit code a CLI collaborator should
    /// report for it.
    #[must_use]
    pub fn from_io_error(error: &std::io::Error) -> Self {
        use std::io::ErrorKind;

        match error.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied | ErrorKind::AlreadyExists => Self::FileSelect,
            ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::AddrInUse
            | ErrorKind::AddrNotAvailable
            | ErrorKind::NotConnected => Self::SocketIo,
            ErrorKind::TimedOut => Self::Timeout,
            ErrorKind::UnexpectedEof | ErrorKind::InvalidData => Self::StreamIo,
            ErrorKind::Interrupted => Self::Signal,
            _ => Self::FileIo,
        }
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.as_i32()
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        let value = code.as_i32().clamp(0, 255) as u8;
        Self::from(value)
    }
}

/// Implemented by every constituent crate's error type (and by
/// [`crate::error::Error`] itself) so exit-code selection is derived once,
/// at the point each error variant is defined, rather than re-matched by
/// every caller.
pub trait HasExitCode {
    /// The exit code this value maps to.
    fn exit_code(&self) -> ExitCode;
}
