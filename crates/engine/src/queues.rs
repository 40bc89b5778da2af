//! Bounded MPSC queues connecting the Sender, Generator and Receiver tasks.
//!
//! Each queue is a `crossbeam-channel` bounded channel rather than an
//! unbounded one: an unbounded generator-to-receiver queue would let a slow
//! disk turn into unbounded memory growth on the faster side of the pairing.

use flist::FileEntry;
use matching::DeltaToken;

/// Default channel capacity for the index and delta-token queues, chosen to
/// keep a handful of in-flight files buffered without materially growing
/// peak memory use.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// A request from the Generator to the Sender: "produce a delta for this
/// file index against this signature."
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// The file list index being requested.
    pub index: u64,
    /// The peer's block signature for that file, to generate a delta
    /// against. `None` requests a whole-file literal send (no basis exists).
    pub signature: Option<signature::Signature>,
}

/// One complete file's worth of delta tokens, tagged with its file-list
/// index so the Receiver can apply it against the matching basis file.
#[derive(Debug, Clone)]
pub struct IndexedDelta {
    /// The file list index this delta reconstructs.
    pub index: u64,
    /// The token stream, in wire order.
    pub tokens: Vec<DeltaToken>,
    /// The seeded whole-file digest the Receiver verifies against.
    pub digest: Vec<u8>,
}

/// A file-list entry queued for the Receiver's next phase, paired with
/// whether it still needs writing or was already satisfied by the basis
/// file as-is.
#[derive(Debug, Clone)]
pub struct QueuedEntry {
    /// The file list index.
    pub index: u64,
    /// The entry's metadata.
    pub entry: FileEntry,
}

/// Creates a bounded sender/receiver pair sized at [`DEFAULT_QUEUE_CAPACITY`].
#[must_use]
pub fn bounded_pair<T>() -> (crossbeam_channel::Sender<T>, crossbeam_channel::Receiver<T>) {
    crossbeam_channel::bounded(DEFAULT_QUEUE_CAPACITY)
}
