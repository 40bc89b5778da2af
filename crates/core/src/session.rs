//! The public session API: ties the handshake, the file list, and the
//! Sender/Generator/Receiver state machines from [`engine`] into one call a
//! caller makes per transfer.
//!
//! [`run_local_sync`] drives the "common case" execution path called out in
//! the concurrency model: a single in-process Generator+Receiver pairing
//! and a Sender, scheduled inline on the calling thread rather than as
//! separate OS tasks. The three still communicate only through
//! [`engine::Pipeline`], which threads every index, delta and control
//! message through a real [`protocol::Channel`] and
//! [`protocol::IndexCodec`] pair rather than a bare function call.

use std::collections::HashSet;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Instant;

use engine::receiver::ApplyError;
use engine::{
    generator, receiver, CancellationToken, ControlEvent, ControlLog, DeletePolicy, FileAttributes, FsOps, Pipeline, PipelineDelta,
    SessionConfig, SessionError, Statistics,
};
use filters::FilterSet;
use flist::{FileEntry, FileKind, FileList};

use crate::error::Error;
use crate::exit_code::ExitCode;

/// The result of running a session to completion: the accumulated transfer
/// counters plus the exit code a CLI collaborator should report.
#[derive(Debug)]
pub struct SessionOutcome {
    /// Byte and file counters for the whole session.
    pub statistics: engine::FinalStatistics,
    /// The exit code to report, derived from whether every file transferred
    /// and deleted cleanly.
    pub exit_code: ExitCode,
    /// Every control message observed on either side of the pipeline, in
    /// the order each side received it: `NO_SEND`/`REDO` reports, deletion
    /// and I/O-error notices, and the final statistics acknowledgement.
    pub events: Vec<ControlEvent>,
}

/// Runs a full sync of `list` from `source` to `destination`, in-process.
///
/// For each entry: directories, symlinks, devices and specials are applied
/// directly; regular files go through the Generator (quick-check plus basis
/// signature), Sender (delta generation) and Receiver (delta application)
/// sequence. If `config`'s delete policy is enabled, `existing_destination_paths`
/// (every path currently under the destination root, already joined with
/// `config.destination()`, paired with whether it is a directory — a real
/// `FsOps` implementation gets this from its own tree walk) is swept for
/// entries absent from `list` and not protected by `filters`.
///
/// Per-file filesystem errors are logged and skipped, folding the affected
/// file into a final [`ExitCode::PartialTransfer`] rather than aborting the
/// session; every other error kind aborts immediately.
///
/// # Errors
///
/// Returns [`Error`] if a non-recoverable error occurs: a protocol,
/// negotiation, channel, security, matching, signature, file-list, filter or
/// configuration failure, or cooperative cancellation via `cancellation`.
pub fn run_local_sync<Src, Dst>(
    config: &SessionConfig,
    cancellation: &CancellationToken,
    source: &Src,
    destination: &Dst,
    list: &FileList,
    existing_destination_paths: &[(PathBuf, bool)],
    filters: &FilterSet,
) -> Result<SessionOutcome, Error>
where
    Src: FsOps,
    Dst: FsOps,
{
    let started = Instant::now();
    let mut totals = Statistics {
        total_file_size: list.total_bytes(),
        ..Statistics::new()
    };
    let mut receiver_state = receiver::ReceiverState::new();
    let mut files_failed: u64 = 0;
    let mut incoming_paths = HashSet::new();

    let gen_log: ControlLog = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let sender_log: ControlLog = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let mut pipeline = Pipeline::new(gen_log.clone(), sender_log.clone());

    for segment in list.segments() {
        for (index, entry) in segment.iter() {
            if cancellation.is_cancelled() {
                return Err(Error::Session(SessionError::Interrupted));
            }

            let rel_path = PathBuf::from(String::from_utf8_lossy(entry.path()).into_owned());
            let dest_path = config.destination().join(&rel_path);

            if !filters.allows(&rel_path, entry.kind() == FileKind::Directory) {
                continue;
            }
            incoming_paths.insert(dest_path.clone());

            match apply_one(config, source, destination, list, &mut receiver_state, &mut pipeline, index, entry, &dest_path) {
                Ok(stats) => totals.merge(&stats),
                Err(err) if !err.is_fatal() => {
                    logging::log_warning!("core::session", "skipping {}: {err}", dest_path.display());
                    pipeline.emit_error_xfer(&dest_path).map_err(Error::Session)?;
                    files_failed += 1;
                }
                Err(err) => return Err(Error::Session(err)),
            }
        }
    }

    if config.delete_policy() == DeletePolicy::Enabled {
        for path in generator::plan_deletions(existing_destination_paths, &incoming_paths, filters) {
            match destination.remove(path) {
                Ok(()) => {
                    totals.files_deleted += 1;
                    pipeline.emit_deleted(path).map_err(Error::Session)?;
                }
                Err(source) => {
                    logging::log_warning!("core::session", "failed to delete {}: {source}", path.display());
                    pipeline.emit_io_error(path).map_err(Error::Session)?;
                    files_failed += 1;
                }
            }
        }
    }

    pipeline.finish().map_err(Error::Session)?;

    let exit_code = if files_failed > 0 { ExitCode::PartialTransfer } else { ExitCode::Ok };

    let mut events = gen_log.borrow().clone();
    events.extend(sender_log.borrow().iter().cloned());

    Ok(SessionOutcome {
        statistics: engine::FinalStatistics {
            totals,
            elapsed: started.elapsed(),
        },
        exit_code,
        events,
    })
}

#[allow(clippy::too_many_arguments)]
fn apply_one<Src: FsOps, Dst: FsOps>(
    config: &SessionConfig,
    source: &Src,
    destination: &Dst,
    list: &FileList,
    receiver_state: &mut receiver::ReceiverState,
    pipeline: &mut Pipeline,
    index: u64,
    entry: &FileEntry,
    dest_path: &Path,
) -> Result<Statistics, SessionError> {
    match entry.kind() {
        FileKind::Directory => {
            destination
                .make_directory(dest_path)
                .map_err(|source| SessionError::file_system(dest_path, source))?;
            apply_attributes(destination, dest_path, entry, config)?;
            Ok(Statistics::new())
        }
        FileKind::Symlink => {
            let target = entry.link_target().unwrap_or(&[]);
            destination
                .make_symlink(dest_path, target)
                .map_err(|source| SessionError::file_system(dest_path, source))?;
            apply_attributes(destination, dest_path, entry, config)?;
            Ok(Statistics {
                bytes_written: target.len() as u64,
                ..Statistics::new()
            })
        }
        FileKind::Device => {
            let (major, minor) = entry.device().unwrap_or((0, 0));
            destination
                .make_device(dest_path, FileKind::Device, major, minor)
                .map_err(|source| SessionError::file_system(dest_path, source))?;
            apply_attributes(destination, dest_path, entry, config)?;
            Ok(Statistics::new())
        }
        FileKind::Special => {
            destination
                .make_device(dest_path, FileKind::Special, 0, 0)
                .map_err(|source| SessionError::file_system(dest_path, source))?;
            apply_attributes(destination, dest_path, entry, config)?;
            Ok(Statistics::new())
        }
        FileKind::Regular => transfer_regular(config, source, destination, list, receiver_state, pipeline, index, entry, dest_path),
    }
}

#[allow(clippy::too_many_arguments)]
fn transfer_regular<Src: FsOps, Dst: FsOps>(
    config: &SessionConfig,
    source: &Src,
    destination: &Dst,
    list: &FileList,
    receiver_state: &mut receiver::ReceiverState,
    pipeline: &mut Pipeline,
    index: u64,
    entry: &FileEntry,
    dest_path: &Path,
) -> Result<Statistics, SessionError> {
    let Some(request) = generator::plan_request(destination, config, index, entry)? else {
        return Ok(Statistics::new());
    };

    let basis_bytes = match &request.signature {
        Some(_) => Some(read_whole(destination, dest_path)?),
        None => None,
    };
    let basis = match (&request.signature, &basis_bytes) {
        (Some(signature), Some(bytes)) => Some((signature, bytes.as_slice())),
        _ => None,
    };

    let (delta, sender_stats) = match pipeline.transfer_one(source, list, &request, config.checksum_seed())? {
        PipelineDelta::NoSend => return Ok(Statistics::new()),
        PipelineDelta::Delta(delta, stats) => (delta, stats),
    };

    let apply_result = receiver_state.apply(destination, config.destination(), entry, &delta, basis, config.preservation(), config.checksum_seed());

    let mut apply_stats = match apply_result {
        Ok(stats) => stats,
        Err(ApplyError::DigestMismatch) => {
            logging::log_warning!("core::session", "digest mismatch for {}, requesting a second attempt", dest_path.display());
            pipeline.request_redo(request.index)?;

            let retry_basis_bytes = match &request.signature {
                Some(_) => Some(read_whole(destination, dest_path)?),
                None => None,
            };
            let retry_basis = match (&request.signature, &retry_basis_bytes) {
                (Some(signature), Some(bytes)) => Some((signature, bytes.as_slice())),
                _ => None,
            };

            let (retry_delta, retry_sender_stats) = match pipeline.transfer_one(source, list, &request, config.checksum_seed())? {
                PipelineDelta::NoSend => return Ok(Statistics::new()),
                PipelineDelta::Delta(delta, stats) => (delta, stats),
            };

            let mut retry_stats = receiver_state
                .apply(destination, config.destination(), entry, &retry_delta, retry_basis, config.preservation(), config.checksum_seed())
                .map_err(|err| match err {
                    ApplyError::Session(source) => source,
                    other => SessionError::file_system(dest_path, io::Error::new(io::ErrorKind::InvalidData, other.to_string())),
                })?;
            retry_stats.files_transferred = 0;
            retry_stats.files_redone = 1;

            let mut combined = sender_stats;
            combined.merge(&retry_sender_stats);
            combined.merge(&retry_stats);
            return Ok(combined);
        }
        Err(other) => {
            return Err(match other {
                ApplyError::Session(source) => source,
                other => SessionError::file_system(dest_path, io::Error::new(io::ErrorKind::InvalidData, other.to_string())),
            })
        }
    };
    apply_stats.files_transferred = 0;

    let mut combined = sender_stats;
    combined.merge(&apply_stats);
    Ok(combined)
}

fn apply_attributes<D: FsOps>(destination: &D, path: &Path, entry: &FileEntry, config: &SessionConfig) -> Result<(), SessionError> {
    destination
        .set_attributes(path, FileAttributes::from_entry(entry, config.preservation()))
        .map_err(|source| SessionError::file_system(path, source))
}

fn read_whole<D: FsOps>(destination: &D, path: &Path) -> Result<Vec<u8>, SessionError> {
    let mut reader = destination.open_read(path).map_err(|source| SessionError::file_system(path, source))?;
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).map_err(|source| SessionError::file_system(path, source))?;
    Ok(buf)
}
