//! The Generator: walks `RECV_FILE_LIST → PHASE_TRANSFER(request) →
//! PHASE_REDO → PHASE_DONE`, deciding which files actually need a delta and
//! building the basis signature each request carries.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use filters::FilterSet;
use flist::{FileEntry, FileKind};
use signature::{calculate_signature_layout, generate_file_signature, SignatureAlgorithm, SignatureLayoutParams};
use std::num::{NonZeroU32, NonZeroU8};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::fsops::FsOps;
use crate::queues::TransferRequest;

/// Whether `entry`'s current destination copy can be trusted as-is without
/// requesting a delta, per the quick-check rule: same size and mtime, and
/// the session does not force re-checking with `ignore_times`.
#[must_use]
pub fn quick_check_passes(entry: &FileEntry, destination_stat: Option<(u64, i64)>, ignore_times: bool) -> bool {
    if ignore_times {
        return false;
    }
    matches!(destination_stat, Some((size, mtime)) if size == entry.size() && mtime == entry.mtime())
}

/// Decides whether `entry` needs a [`TransferRequest`], and builds one
/// carrying a basis signature read from the current destination copy (if
/// any). Directories, symlinks, devices and specials never carry a body and
/// are applied directly by the Receiver without going through the
/// Sender/Generator delta path.
///
/// # Errors
///
/// Returns [`SessionError`] if the destination copy cannot be read or its
/// signature cannot be generated.
pub fn plan_request<S: FsOps>(
    fs: &S,
    config: &SessionConfig,
    index: u64,
    entry: &FileEntry,
) -> Result<Option<TransferRequest>, SessionError> {
    if entry.kind() != FileKind::Regular {
        return Ok(None);
    }

    let rel_path = PathBuf::from(String::from_utf8_lossy(entry.path()).into_owned());
    let dest_path = config.destination().join(&rel_path);

    let destination_stat = fs
        .stat(&dest_path)
        .map_err(|source| SessionError::file_system(&dest_path, source))?;

    if quick_check_passes(entry, destination_stat, config.ignore_times()) {
        return Ok(None);
    }

    let signature = match destination_stat {
        Some(_) => Some(build_signature(fs, &dest_path, entry.size())?),
        None => None,
    };

    Ok(Some(TransferRequest { index, signature }))
}

fn build_signature<S: FsOps>(fs: &S, path: &Path, len: u64) -> Result<signature::Signature, SessionError> {
    let layout = calculate_signature_layout(SignatureLayoutParams::new(
        len,
        NonZeroU32::new(signature::DEFAULT_BLOCK_LENGTH),
        NonZeroU8::new(16).expect("16 is non-zero"),
    ))
    .map_err(|_| SessionError::Security("invalid signature layout".to_owned()))?;

    let reader = fs.open_read(path).map_err(|source| SessionError::file_system(path, source))?;
    generate_file_signature(reader, layout, SignatureAlgorithm::Md5, [0; 4]).map_err(SessionError::from)
}

/// Selects which destination paths a `--delete`-style sweep may remove:
/// every path in `destination_paths` that is neither present in the
/// incoming file list nor protected by `filters`.
#[must_use]
pub fn plan_deletions<'a>(
    destination_paths: &'a [(PathBuf, bool)],
    incoming: &HashSet<PathBuf>,
    filters: &FilterSet,
) -> Vec<&'a Path> {
    destination_paths
        .iter()
        .filter(|(path, _)| !incoming.contains(path))
        .filter(|(path, is_dir)| filters.allows_deletion(path, *is_dir))
        .map(|(path, _)| path.as_path())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::fsops::fake::InMemoryFs;
    use filters::FilterRule;

    fn config() -> SessionConfig {
        SessionConfig::builder([0; 4], PathBuf::from("/dest")).build().unwrap()
    }

    #[test]
    fn directories_never_produce_a_request() {
        let fs = InMemoryFs::default();
        let entry = FileEntry::new(b"sub".to_vec(), 0o040_755, 0, 0);
        assert!(plan_request(&fs, &config(), 0, &entry).unwrap().is_none());
    }

    #[test]
    fn missing_destination_requests_a_whole_file_send() {
        let fs = InMemoryFs::default();
        let entry = FileEntry::new(b"a.txt".to_vec(), 0o100_644, 5, 100);
        let request = plan_request(&fs, &config(), 0, &entry).unwrap().unwrap();
        assert!(request.signature.is_none());
    }

    #[test]
    fn matching_size_and_mtime_skips_the_request() {
        let fs = InMemoryFs::default();
        fs.files.borrow_mut().insert(PathBuf::from("/dest/a.txt"), vec![0u8; 5]);
        fs.attributes.borrow_mut().insert(
            PathBuf::from("/dest/a.txt"),
            crate::fsops::FileAttributes {
                mtime: Some(100),
                ..Default::default()
            },
        );
        let entry = FileEntry::new(b"a.txt".to_vec(), 0o100_644, 5, 100);
        assert!(plan_request(&fs, &config(), 0, &entry).unwrap().is_none());
    }

    #[test]
    fn ignore_times_forces_a_request_even_on_a_quick_check_match() {
        let fs = InMemoryFs::default();
        fs.files.borrow_mut().insert(PathBuf::from("/dest/a.txt"), vec![0u8; 5]);
        fs.attributes.borrow_mut().insert(
            PathBuf::from("/dest/a.txt"),
            crate::fsops::FileAttributes {
                mtime: Some(100),
                ..Default::default()
            },
        );
        let entry = FileEntry::new(b"a.txt".to_vec(), 0o100_644, 5, 100);
        let config = SessionConfig::builder([0; 4], PathBuf::from("/dest"))
            .ignore_times(true)
            .build()
            .unwrap();
        assert!(plan_request(&fs, &config, 0, &entry).unwrap().is_some());
    }

    #[test]
    fn deletion_sweep_skips_paths_still_in_the_incoming_list() {
        let filters = FilterSet::from_rules(Vec::<FilterRule>::new()).unwrap();
        let destination = vec![(PathBuf::from("a.txt"), false), (PathBuf::from("stale.txt"), false)];
        let mut incoming = HashSet::new();
        incoming.insert(PathBuf::from("a.txt"));

        let doomed = plan_deletions(&destination, &incoming, &filters);
        assert_eq!(doomed, vec![Path::new("stale.txt")]);
    }

    #[test]
    fn protect_rule_saves_a_stale_path_from_deletion() {
        let filters = FilterSet::from_rules([FilterRule::protect("stale.txt")]).unwrap();
        let destination = vec![(PathBuf::from("stale.txt"), false)];
        let incoming = HashSet::new();

        assert!(plan_deletions(&destination, &incoming, &filters).is_empty());
    }
}
