//! File list generation, traversal and wire codec.
//!
//! [`walk`] enumerates a local directory tree into [`FileListEntry`] values;
//! [`list`] holds a [`FileList`] of [`FileEntry`] once the tree has been
//! flattened and indexed; [`codec`] encodes/decodes those entries for the
//! wire.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
mod entry;
mod list;
mod walk;

pub use codec::{read_io_error_count, write_io_error_count, FileListCodec, FileListCodecError};
pub use entry::{FileEntry, FileKind, Identity};
pub use list::{FileList, Segment};
pub use walk::{FileListBuilder, FileListEntry, FileListError, FileListWalker, FileSelection};
