//! The Receiver: `AWAIT_INDEX → READ_HEADER → APPLY_DELTA → VERIFY_DIGEST →
//! FINALISE` for each incoming indexed delta.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use flist::FileEntry;
use matching::DeltaToken;
use signature::Signature;

use crate::error::SessionError;
use crate::fsops::{AtomicWrite, FileAttributes, FsOps};
use crate::queues::IndexedDelta;
use crate::stats::Statistics;

/// Error produced while applying one file's delta.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// A match token referenced a basis block past the end of the basis
    /// signature the Receiver built.
    #[error("delta referenced out-of-range basis block {0}")]
    BlockOutOfRange(u64),
    /// The reconstructed content's whole-file digest did not match the one
    /// the Sender appended.
    #[error("whole-file digest mismatch after applying delta")]
    DigestMismatch,
    /// A filesystem operation failed.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Tracks cross-file Receiver state: which destination paths have already
/// been finalised in this session, so a duplicate file-list entry is
/// detected rather than silently overwriting the first copy.
#[derive(Debug, Default)]
pub struct ReceiverState {
    finalised: HashSet<PathBuf>,
}

impl ReceiverState {
    /// Starts tracking a fresh session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one indexed delta against `entry`'s destination path,
    /// reconstructing its content from `basis` (the blocks the Generator
    /// built the request's signature from) plus the delta's literal runs,
    /// verifying the whole-file digest before committing.
    ///
    /// Reuses the pre-existing destination copy as the basis source read
    /// for [`DeltaToken::Match`] blocks; callers that requested a
    /// whole-file literal send (no signature, no basis) pass an empty
    /// `basis`.
    ///
    /// If `entry`'s destination path was already finalised earlier in this
    /// session, the duplicate is logged and skipped rather than applied
    /// twice, matching how a malformed or adversarial file list is expected
    /// to be tolerated without corrupting the first copy. A path is only
    /// marked finalised once it is actually written, so a failed attempt
    /// (out-of-range block, digest mismatch) leaves it open for a caller to
    /// retry with a fresh delta.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError`] if a match token is out of range, the
    /// reconstructed digest does not match, or the destination cannot be
    /// written.
    pub fn apply<S: FsOps>(
        &mut self,
        fs: &S,
        destination_root: &Path,
        entry: &FileEntry,
        delta: &IndexedDelta,
        basis: Option<(&Signature, &[u8])>,
        preservation: crate::config::PreservationFlags,
        seed: [u8; 4],
    ) -> Result<Statistics, ApplyError> {
        let rel_path = PathBuf::from(String::from_utf8_lossy(entry.path()).into_owned());
        let dest_path = destination_root.join(&rel_path);

        if self.finalised.contains(&dest_path) {
            logging::log_warning!(
                "engine::receiver",
                "duplicate file list entry for {} skipped",
                dest_path.display()
            );
            return Ok(Statistics::new());
        }

        let mut content = Vec::with_capacity(entry.size() as usize);
        for token in &delta.tokens {
            match token {
                DeltaToken::Literal(bytes) => content.extend_from_slice(bytes),
                DeltaToken::Match { block_index } => {
                    let (signature, basis_bytes) = basis.ok_or(ApplyError::BlockOutOfRange(*block_index))?;
                    let block_length = signature
                        .blocks()
                        .first()
                        .map_or(0, |block| block.len() as usize);
                    let block = signature
                        .blocks()
                        .get(*block_index as usize)
                        .ok_or(ApplyError::BlockOutOfRange(*block_index))?;
                    let start = *block_index as usize * block_length;
                    let end = start + block.len() as usize;
                    let slice = basis_bytes
                        .get(start..end)
                        .ok_or(ApplyError::BlockOutOfRange(*block_index))?;
                    content.extend_from_slice(slice);
                }
            }
        }

        let digest = matching::whole_file_digest(&content, seed, signature::SignatureAlgorithm::Md5);
        if digest != delta.digest {
            return Err(ApplyError::DigestMismatch);
        }

        let mut writer = fs.open_write(&dest_path).map_err(|source| SessionError::file_system(&dest_path, source))?;
        std::io::Write::write_all(&mut writer, &content).map_err(|source| SessionError::file_system(&dest_path, source))?;
        Box::new(writer)
            .commit(&dest_path)
            .map_err(|source| SessionError::file_system(&dest_path, source))?;

        fs.set_attributes(&dest_path, FileAttributes::from_entry(entry, preservation))
            .map_err(|source| SessionError::file_system(&dest_path, source))?;

        self.finalised.insert(dest_path);

        Ok(Statistics {
            bytes_written: content.len() as u64,
            files_transferred: 1,
            ..Statistics::new()
        })
    }
}
