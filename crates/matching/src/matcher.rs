//! Sliding-window block matcher: scans a source file against a basis
//! file's signature and emits the resulting [`DeltaToken`] stream.

use std::io::{self, Read};

use checksums::strong::{Md4, Md5, Seeded, StrongDigest};
use checksums::RollingChecksum;
use signature::{Signature, SignatureAlgorithm, SignatureLayout};

use crate::lookup::BlockLookup;
use crate::token::DeltaToken;

/// Literal runs are flushed once they reach this many bytes, bounding how
/// much unmatched data the matcher holds in memory before emitting a token.
pub const DEFAULT_LITERAL_CHUNK_CAP: usize = 8192;

/// Error produced while generating a delta against a basis signature.
#[derive(Debug, thiserror::Error)]
pub enum DeltaError {
    /// The source reader failed.
    #[error("failed to read source data: {0}")]
    Io(#[from] io::Error),
    /// Maintaining the rolling checksum over the sliding window failed.
    #[error("rolling checksum error: {0}")]
    Rolling(#[from] checksums::RollingError),
}

/// Scans `reader` against `signature` and returns the delta-token stream
/// that reconstructs it from the basis file, using the default literal
/// chunk cap ([`DEFAULT_LITERAL_CHUNK_CAP`]).
///
/// # Errors
///
/// Returns [`DeltaError`] if `reader` fails or the rolling checksum state
/// becomes inconsistent.
pub fn generate_delta<R: Read>(
    reader: R,
    signature: &Signature,
    layout: SignatureLayout,
    seed: [u8; 4],
    algorithm: SignatureAlgorithm,
) -> Result<Vec<DeltaToken>, DeltaError> {
    generate_delta_with_chunk_cap(reader, signature, layout, seed, algorithm, DEFAULT_LITERAL_CHUNK_CAP)
}

/// Like [`generate_delta`], but with an explicit literal chunk cap.
///
/// # Errors
///
/// Returns [`DeltaError`] if `reader` fails or the rolling checksum state
/// becomes inconsistent.
pub fn generate_delta_with_chunk_cap<R: Read>(
    mut reader: R,
    signature: &Signature,
    layout: SignatureLayout,
    seed: [u8; 4],
    algorithm: SignatureAlgorithm,
    chunk_cap: usize,
) -> Result<Vec<DeltaToken>, DeltaError> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;

    let block_length = layout.block_length().get() as usize;
    let lookup = BlockLookup::build(signature.blocks());
    let mut tokens = Vec::new();

    let mut pos = 0usize;
    let mut literal_start = 0usize;
    let mut rolling = RollingChecksum::new();
    let mut rolling_valid = false;

    while pos + block_length <= data.len() {
        let window = &data[pos..pos + block_length];
        if !rolling_valid {
            rolling.update_from_block(window);
            rolling_valid = true;
        }

        let matched = lookup.find_match(rolling.value(), window, |candidate| {
            digest_window(candidate, algorithm, seed)
        });

        if let Some(block_index) = matched {
            flush_literal(&mut tokens, &data[literal_start..pos], chunk_cap);
            tokens.push(DeltaToken::Match { block_index });
            pos += block_length;
            literal_start = pos;
            rolling_valid = false;
        } else if pos + block_length == data.len() {
            // No further byte to slide in; stop scanning full windows and
            // let the trailing-tail check below have the final say.
            break;
        } else {
            let outgoing = data[pos];
            let incoming = data[pos + block_length];
            rolling.roll(outgoing, incoming)?;
            pos += 1;
        }
    }

    let tail = &data[pos..];
    if !tail.is_empty() {
        let mut tail_rolling = RollingChecksum::new();
        tail_rolling.update_from_block(tail);
        if let Some(block_index) = lookup.find_match(tail_rolling.value(), tail, |candidate| {
            digest_window(candidate, algorithm, seed)
        }) {
            flush_literal(&mut tokens, &data[literal_start..pos], chunk_cap);
            tokens.push(DeltaToken::Match { block_index });
            literal_start = data.len();
        }
    }

    flush_literal(&mut tokens, &data[literal_start..], chunk_cap);

    Ok(tokens)
}

fn digest_window(window: &[u8], algorithm: SignatureAlgorithm, seed: [u8; 4]) -> Vec<u8> {
    match algorithm {
        SignatureAlgorithm::Md4 => Seeded::<Md4>::digest(seed, window).as_ref().to_vec(),
        SignatureAlgorithm::Md5 => Seeded::<Md5>::digest(seed, window).as_ref().to_vec(),
    }
}

fn flush_literal(tokens: &mut Vec<DeltaToken>, bytes: &[u8], chunk_cap: usize) {
    if bytes.is_empty() {
        return;
    }
    for chunk in bytes.chunks(chunk_cap.max(1)) {
        tokens.push(DeltaToken::Literal(chunk.to_vec()));
    }
}

/// Computes the trailing whole-file digest the Sender appends after a
/// file's delta stream, seeded the same way each block's strong digest is.
#[must_use]
pub fn whole_file_digest(data: &[u8], seed: [u8; 4], algorithm: SignatureAlgorithm) -> Vec<u8> {
    digest_window(data, algorithm, seed)
}
