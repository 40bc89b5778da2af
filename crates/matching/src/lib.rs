//! Sender-side rolling/strong block matcher and delta-token stream.
//!
//! [`generate_delta`] scans a source file against a peer's
//! [`signature::Signature`] and returns the [`DeltaToken`] sequence that
//! reconstructs it on the other side: basis-block references where the
//! rolling and strong checksums agree, literal runs everywhere else.
//! [`encode_token`]/[`decode_token`] put that sequence on the wire.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod lookup;
mod matcher;
mod token;

pub use matcher::{generate_delta, generate_delta_with_chunk_cap, whole_file_digest, DeltaError, DEFAULT_LITERAL_CHUNK_CAP};
pub use token::{decode_token, encode_end, encode_token, DeltaCodecError, DeltaToken};
