//! File signature layout and generation.
//!
//! A signature is the checksum header plus one rolling/strong digest pair
//! per basis block, computed by the receiving side and sent to the peer so
//! it can find which parts of its own copy already match.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod generate;
mod layout;
pub mod parallel;

pub use generate::{generate_file_signature, BlockSum, Signature, SignatureAlgorithm, SignatureError};
pub use layout::{
    calculate_signature_layout, SignatureLayout, SignatureLayoutError, SignatureLayoutParams,
    DEFAULT_BLOCK_LENGTH, MAX_BLOCK_LENGTH, MAX_DIGEST_LENGTH, MIN_DIGEST_LENGTH,
};
