//! The engine's unified error taxonomy.
//!
//! Every fallible engine operation funnels into [`SessionError`] so the
//! three state machines can share one recovery policy: which errors abort
//! the whole session versus which ones are logged and skipped for a single
//! file.

use std::io;

use crate::config::ConfigError;

/// What went wrong during a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A peer sent a malformed or out-of-sequence protocol message.
    #[error("protocol error: {0}")]
    Protocol(#[from] protocol::EnvelopeError),

    /// The version/seed handshake failed.
    #[error("negotiation error: {0}")]
    Negotiation(#[from] protocol::NegotiationError),

    /// An inter-task channel was disconnected unexpectedly.
    #[error("channel error: {0}")]
    Channel(String),

    /// An inter-task channel's sender was dropped while a receiver still
    /// expected more items.
    #[error("channel closed before End-of-stream")]
    ChannelEof,

    /// A path escaped the destination root, or otherwise violated a
    /// filesystem-safety invariant.
    #[error("security error: {0}")]
    Security(String),

    /// A filesystem operation failed in a way that is not recoverable for
    /// the affected file.
    #[error("filesystem error for {path}: {source}")]
    FileSystem {
        /// The path the failing operation targeted.
        path: std::path::PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Signature generation or delta matching failed.
    #[error("matching error: {0}")]
    Matching(#[from] matching::DeltaError),

    /// Signature layout or generation failed.
    #[error("signature error: {0}")]
    Signature(#[from] signature::SignatureError),

    /// File-list traversal or codec failed.
    #[error("file list error: {0}")]
    FileList(#[from] flist::FileListError),

    /// File-list wire codec failed.
    #[error("file list codec error: {0}")]
    FileListCodec(#[from] flist::FileListCodecError),

    /// Filter rule compilation failed.
    #[error("filter error: {0}")]
    Filter(#[from] filters::FilterError),

    /// The session configuration was invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The session was cancelled cooperatively, e.g. by a signal handler.
    #[error("session was cancelled")]
    Interrupted,
}

impl<T> From<crossbeam_channel::SendError<T>> for SessionError {
    fn from(_: crossbeam_channel::SendError<T>) -> Self {
        Self::Channel("send on a disconnected channel".to_owned())
    }
}

impl From<crossbeam_channel::RecvError> for SessionError {
    fn from(_: crossbeam_channel::RecvError) -> Self {
        Self::ChannelEof
    }
}

impl SessionError {
    /// Builds a [`SessionError::FileSystem`] for the given path.
    #[must_use]
    pub fn file_system(path: impl Into<std::path::PathBuf>, source: io::Error) -> Self {
        Self::FileSystem {
            path: path.into(),
            source,
        }
    }

    /// Whether this error should abort the whole session rather than just
    /// being logged and the affected file skipped.
    ///
    /// Per-file I/O failures and a peer's `ErrorXfer` report are
    /// recoverable; everything that leaves the duplex channel or the
    /// protocol state machine out of sync is fatal.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::FileSystem { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filesystem_errors_are_not_fatal() {
        let err = SessionError::file_system("a.txt", io::Error::from(io::ErrorKind::NotFound));
        assert!(!err.is_fatal());
    }

    #[test]
    fn protocol_errors_are_fatal() {
        let err = SessionError::from(protocol::EnvelopeError::TruncatedHeader);
        assert!(err.is_fatal());
    }
}
