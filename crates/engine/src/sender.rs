//! The Sender: walks `HANDSHAKE → SEND_FILE_LIST → PHASE_TRANSFER →
//! PHASE_REDO → PHASE_DONE → STATISTICS → EXIT`, producing a delta for
//! every index the Generator requests.

use flist::{FileEntry, FileList};
use matching::{generate_delta, whole_file_digest};
use signature::{SignatureAlgorithm, SignatureLayoutParams};
use std::io::Read;
use std::num::{NonZeroU32, NonZeroU8};

use crate::error::SessionError;
use crate::fsops::FsOps;
use crate::queues::{IndexedDelta, TransferRequest};
use crate::stats::Statistics;

/// Produces the delta for one requested file, reading its current content
/// from `fs` at the path recorded in `list`.
///
/// Returns `None` if the requested index no longer exists in the list (the
/// Generator and Sender disagreeing on this is a protocol bug upstream of
/// this call, not a recoverable per-file condition, so callers should treat
/// a `None` as fatal).
///
/// # Errors
///
/// Returns [`SessionError`] if the source file cannot be read or the delta
/// matcher fails.
pub fn service_request<S: FsOps>(
    fs: &S,
    list: &FileList,
    request: &TransferRequest,
    seed: [u8; 4],
) -> Result<Option<(IndexedDelta, Statistics)>, SessionError> {
    let Some(entry) = list.entry(request.index) else {
        return Ok(None);
    };

    let path = std::path::PathBuf::from(String::from_utf8_lossy(entry.path()).into_owned());
    let mut reader = fs
        .open_read(&path)
        .map_err(|source| SessionError::file_system(&path, source))?;

    let mut data = Vec::new();
    reader
        .read_to_end(&mut data)
        .map_err(|source| SessionError::file_system(&path, source))?;

    let (tokens, literal_bytes, matched_bytes) = match &request.signature {
        Some(signature) => {
            let layout = signature_layout_for(entry, signature)?;
            let tokens = generate_delta(
                std::io::Cursor::new(data.clone()),
                signature,
                layout,
                seed,
                SignatureAlgorithm::Md5,
            )
            .map_err(SessionError::from)?;
            tally(&tokens, Some(signature))
        }
        None => (vec![matching::DeltaToken::Literal(data.clone())], data.len() as u64, 0),
    };

    let digest = whole_file_digest(&data, seed, SignatureAlgorithm::Md5);

    let stats = Statistics {
        literal_bytes,
        matched_bytes,
        bytes_read: data.len() as u64,
        files_transferred: 1,
        ..Statistics::new()
    };

    Ok(Some((
        IndexedDelta {
            index: request.index,
            tokens,
            digest,
        },
        stats,
    )))
}

fn signature_layout_for(
    entry: &FileEntry,
    signature: &signature::Signature,
) -> Result<signature::SignatureLayout, SessionError> {
    let block_length = signature
        .blocks()
        .first()
        .map_or(signature::DEFAULT_BLOCK_LENGTH, signature::BlockSum::len);
    signature::calculate_signature_layout(SignatureLayoutParams::new(
        entry.size(),
        NonZeroU32::new(block_length.max(1)),
        NonZeroU8::new(16).expect("16 is non-zero"),
    ))
    .map_err(|_| SessionError::Security("invalid signature layout".to_owned()))
}

fn tally(
    tokens: &[matching::DeltaToken],
    signature: Option<&signature::Signature>,
) -> (Vec<matching::DeltaToken>, u64, u64) {
    let mut literal = 0u64;
    let mut matched = 0u64;
    for token in tokens {
        match token {
            matching::DeltaToken::Literal(bytes) => literal += bytes.len() as u64,
            matching::DeltaToken::Match { block_index } => {
                matched += signature
                    .and_then(|sig| sig.blocks().get(*block_index as usize))
                    .map_or(0, |block| u64::from(block.len()));
            }
        }
    }
    (tokens.to_vec(), literal, matched)
}
