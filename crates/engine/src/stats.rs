//! Running and final transfer statistics.

use std::time::Duration;

/// Accumulated counters for one session, reported to the client once the
/// final phase completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    /// Encoded size of the file list exchanged during the handshake.
    pub file_list_size: u64,
    /// Sum of every selected file's size, before delta-compression.
    pub total_file_size: u64,
    /// Bytes sent as literal data (no basis-block match found).
    pub literal_bytes: u64,
    /// Bytes reconstructed from basis-block matches.
    pub matched_bytes: u64,
    /// Total bytes read from the wire.
    pub bytes_read: u64,
    /// Total bytes written to the wire.
    pub bytes_written: u64,
    /// Number of files actually transferred (at least one literal byte or a
    /// full re-send).
    pub files_transferred: u64,
    /// Number of destination entries removed by a delete sweep.
    pub files_deleted: u64,
    /// Number of files that needed a `PHASE_REDO` second attempt after a
    /// whole-file digest mismatch, and succeeded on it.
    pub files_redone: u64,
}

impl Statistics {
    /// An all-zero counter set, as at session start.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            file_list_size: 0,
            total_file_size: 0,
            literal_bytes: 0,
            matched_bytes: 0,
            bytes_read: 0,
            bytes_written: 0,
            files_transferred: 0,
            files_deleted: 0,
            files_redone: 0,
        }
    }

    /// Folds another counter set into this one, field by field.
    pub fn merge(&mut self, other: &Self) {
        self.file_list_size += other.file_list_size;
        self.total_file_size += other.total_file_size;
        self.literal_bytes += other.literal_bytes;
        self.matched_bytes += other.matched_bytes;
        self.bytes_read += other.bytes_read;
        self.bytes_written += other.bytes_written;
        self.files_transferred += other.files_transferred;
        self.files_deleted += other.files_deleted;
        self.files_redone += other.files_redone;
    }

    /// Fraction of transferred bytes that were literal rather than matched,
    /// `0.0` when nothing was transferred.
    #[must_use]
    pub fn literal_ratio(&self) -> f64 {
        let total = self.literal_bytes + self.matched_bytes;
        if total == 0 {
            0.0
        } else {
            self.literal_bytes as f64 / total as f64
        }
    }
}

/// A finished [`Statistics`] snapshot plus the wall-clock time it took to
/// produce it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalStatistics {
    /// The accumulated counters.
    pub totals: Statistics,
    /// How long the session ran from handshake to its final phase.
    pub elapsed: Duration,
}
