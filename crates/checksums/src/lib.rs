#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Rolling and strong checksum primitives used by the delta-transfer engine.
//!
//! - [`rolling`] implements rsync's Adler-like weak checksum (`rsum`), used to
//!   slide a window across the source file while searching for basis-block
//!   matches.
//! - [`strong`] exposes the MD4/MD5 strong digests used to confirm a rolling
//!   match and to verify the whole reconstructed file.
//!
//! Both the per-block strong digest and the whole-file digest are seeded with
//! the session's 4-byte checksum seed (see [`strong::Seeded`]), matching the
//! wire contract described by the protocol handshake.

mod rolling;
pub mod strong;

pub use rolling::{RollingChecksum, RollingDigest, RollingError, RollingSliceError, CHAR_OFFSET};
