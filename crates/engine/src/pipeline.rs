//! Wires Sender, Generator and Receiver together over a real duplex channel
//! and index codec instead of collapsing them into a single function call.
//!
//! [`Pipeline`] owns the two channel endpoints (one per logical peer) and
//! their independent [`protocol::IndexCodec`] encoder state for the life of
//! a session. [`Pipeline::transfer_one`] drives one file index through
//! `PHASE_TRANSFER`: the index is encoded and sent to the Sender side,
//! serviced there against the source tree, and the resulting delta tokens
//! and whole-file digest are encoded back onto the wire and decoded again
//! on the Generator/Receiver side before being handed to
//! [`crate::receiver::ReceiverState::apply`]. `NO_SEND` and `REDO` are real
//! [`protocol::MessageCode`] frames threaded through the same channel pair,
//! not side-channel bookkeeping.
//!
//! Both endpoints run on the calling thread: this is the inline scheduling
//! the concurrency model calls out as the common case, so the loopback
//! transport underneath ([`crate::transport::loopback_pair`]) does not need
//! to be `Send`.

use std::cell::RefCell;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use flist::FileList;
use matching::{decode_token, encode_end, encode_token};
use protocol::{Channel, IndexCodec, MessageCode, MessageHandler};

use crate::error::SessionError;
use crate::fsops::FsOps;
use crate::queues::{bounded_pair, IndexedDelta, TransferRequest};
use crate::sender;
use crate::stats::Statistics;
use crate::transport::{loopback_pair, LoopbackHalf};

/// A control-plane event recorded while running the pipeline: something one
/// side told the other outside the index/delta data path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    /// The sender could not open the source file for this index; no delta
    /// was produced.
    NoSend {
        /// The affected file list index.
        index: u64,
    },
    /// The receiver rejected a reconstructed file (whole-file digest
    /// mismatch) and asked for a second attempt.
    Redo {
        /// The affected file list index.
        index: u64,
    },
    /// A destination entry was removed by the delete sweep.
    Deleted {
        /// The removed path.
        path: PathBuf,
    },
    /// A non-fatal filesystem error was reported for a path.
    IoError {
        /// The affected path.
        path: PathBuf,
    },
    /// A per-file transfer attempt failed and was skipped rather than
    /// aborting the session.
    ErrorXfer {
        /// The affected path.
        path: PathBuf,
    },
    /// The sender reported final statistics at session end.
    Stats {
        /// Size of the reported statistics payload, in bytes.
        payload_len: usize,
    },
}

/// A shared log of [`ControlEvent`]s a [`ControlHandler`] appends to as they
/// arrive.
pub type ControlLog = Rc<RefCell<Vec<ControlEvent>>>;

/// Decodes control frames into [`ControlEvent`]s and appends them to a
/// shared log.
struct ControlHandler {
    log: ControlLog,
}

impl MessageHandler for ControlHandler {
    fn handle_message(&mut self, code: MessageCode, payload: &[u8]) -> io::Result<()> {
        let event = match code {
            MessageCode::NoSend => ControlEvent::NoSend { index: read_index(payload)? },
            MessageCode::Redo => ControlEvent::Redo { index: read_index(payload)? },
            MessageCode::Deleted => ControlEvent::Deleted { path: path_from_payload(payload) },
            MessageCode::IoError => ControlEvent::IoError { path: path_from_payload(payload) },
            MessageCode::ErrorXfer => ControlEvent::ErrorXfer { path: path_from_payload(payload) },
            MessageCode::Stats => ControlEvent::Stats { payload_len: payload.len() },
            _ => return Ok(()),
        };
        self.log.borrow_mut().push(event);
        Ok(())
    }
}

fn read_index(payload: &[u8]) -> io::Result<u64> {
    let bytes: [u8; 8] = payload
        .try_into()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "malformed index payload"))?;
    Ok(u64::from_le_bytes(bytes))
}

fn path_from_payload(payload: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(payload).into_owned())
}

fn channel_io(err: io::Error) -> SessionError {
    SessionError::Channel(err.to_string())
}

/// What happened when [`Pipeline::transfer_one`] ran one file index through
/// `PHASE_TRANSFER`.
pub enum PipelineDelta {
    /// The sender emitted `NO_SEND`; nothing was transferred for this index.
    NoSend,
    /// A delta was produced, sent, and decoded back off the wire.
    Delta(IndexedDelta, Statistics),
}

/// Connects a Generator/Receiver endpoint to a Sender endpoint over a
/// loopback duplex channel, for the life of one session.
pub struct Pipeline {
    gen_channel: Channel<LoopbackHalf, ControlHandler>,
    sender_channel: Channel<LoopbackHalf, ControlHandler>,
    gen_codec: IndexCodec,
    sender_codec: IndexCodec,
    request_tx: crossbeam_channel::Sender<TransferRequest>,
    request_rx: crossbeam_channel::Receiver<TransferRequest>,
}

impl Pipeline {
    /// Starts a fresh pipeline, recording control events observed on the
    /// Generator/Receiver side into `gen_log` and on the Sender side into
    /// `sender_log`.
    #[must_use]
    pub fn new(gen_log: ControlLog, sender_log: ControlLog) -> Self {
        let (gen_half, sender_half) = loopback_pair();
        let (request_tx, request_rx) = bounded_pair();
        Self {
            gen_channel: Channel::new(gen_half, ControlHandler { log: gen_log }),
            sender_channel: Channel::new(sender_half, ControlHandler { log: sender_log }),
            gen_codec: IndexCodec::new(),
            sender_codec: IndexCodec::new(),
            request_tx,
            request_rx,
        }
    }

    /// Runs one file index through `PHASE_TRANSFER`: writes the index and
    /// hands the request to the sender step over a bounded queue (no wire
    /// codec exists yet for a [`signature::Signature`]), services it against
    /// `source`, then encodes the resulting tokens and digest onto the wire
    /// and decodes them back before returning them to the caller for
    /// application.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the channel desyncs, the index overflows
    /// the wire's 32-bit range, or the sender step fails fatally. A source
    /// file the sender cannot open is not an error here: it surfaces as
    /// [`PipelineDelta::NoSend`] after emitting a real `NO_SEND` frame.
    pub fn transfer_one<Src: FsOps>(
        &mut self,
        source: &Src,
        list: &FileList,
        request: &TransferRequest,
        seed: [u8; 4],
    ) -> Result<PipelineDelta, SessionError> {
        let wire_index =
            i32::try_from(request.index).map_err(|_| SessionError::Channel(format!("index {} exceeds wire range", request.index)))?;

        let mut idx_buf = Vec::new();
        self.gen_codec.write_ndx(&mut idx_buf, wire_index).map_err(channel_io)?;
        self.gen_channel.put_bytes(&idx_buf).map_err(channel_io)?;
        self.gen_channel.flush().map_err(channel_io)?;

        self.request_tx.send(request.clone())?;

        let peer_index = self
            .sender_codec
            .read_ndx(&mut self.sender_channel.read_adapter())
            .map_err(channel_io)?;
        let queued = self.request_rx.recv()?;
        debug_assert_eq!(peer_index, wire_index);
        debug_assert_eq!(queued.index, request.index);

        match sender::service_request(source, list, &queued, seed) {
            Ok(Some((delta, stats))) => {
                let mut wire = Vec::new();
                for token in &delta.tokens {
                    encode_token(&mut wire, token).map_err(|err| SessionError::Channel(err.to_string()))?;
                }
                encode_end(&mut wire);
                wire.extend_from_slice(&(delta.digest.len() as u32).to_le_bytes());
                wire.extend_from_slice(&delta.digest);
                self.sender_channel.put_bytes(&wire).map_err(channel_io)?;
                self.sender_channel.flush().map_err(channel_io)?;

                let mut tokens = Vec::new();
                {
                    let mut reader = self.gen_channel.read_adapter();
                    while let Some(token) = decode_token(&mut reader).map_err(|err| SessionError::Channel(err.to_string()))? {
                        tokens.push(token);
                    }
                }
                let digest_len_bytes = self.gen_channel.get_bytes(4).map_err(channel_io)?;
                let digest_len = u32::from_le_bytes(digest_len_bytes.try_into().expect("requested exactly 4 bytes")) as usize;
                let digest = self.gen_channel.get_bytes(digest_len).map_err(channel_io)?;

                Ok(PipelineDelta::Delta(
                    IndexedDelta {
                        index: request.index,
                        tokens,
                        digest,
                    },
                    stats,
                ))
            }
            Ok(None) => Err(SessionError::Channel(format!("sender has no file list entry for index {}", request.index))),
            Err(SessionError::FileSystem { path, .. }) => {
                let mut payload = Vec::new();
                payload.extend_from_slice(&request.index.to_le_bytes());
                self.sender_channel.put_message(MessageCode::NoSend, &payload).map_err(channel_io)?;
                self.gen_channel.pump().map_err(channel_io)?;
                logging::log_warning!("engine::pipeline", "no data sent for index {}: source unreadable at {}", request.index, path.display());
                Ok(PipelineDelta::NoSend)
            }
            Err(other) => Err(other),
        }
    }

    /// Asks for a second `PHASE_REDO` attempt at `index`, after the receiver
    /// rejected the first reconstruction on a whole-file digest mismatch.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the channel fails.
    pub fn request_redo(&mut self, index: u64) -> Result<(), SessionError> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&index.to_le_bytes());
        self.gen_channel.put_message(MessageCode::Redo, &payload).map_err(channel_io)?;
        self.sender_channel.pump().map_err(channel_io)?;
        Ok(())
    }

    /// Reports a destination path removed by the delete sweep.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the channel fails.
    pub fn emit_deleted(&mut self, path: &Path) -> Result<(), SessionError> {
        self.gen_channel
            .put_message(MessageCode::Deleted, path.to_string_lossy().as_bytes())
            .map_err(channel_io)?;
        self.sender_channel.pump().map_err(channel_io)
    }

    /// Reports a non-fatal filesystem error for a path.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the channel fails.
    pub fn emit_io_error(&mut self, path: &Path) -> Result<(), SessionError> {
        self.gen_channel
            .put_message(MessageCode::IoError, path.to_string_lossy().as_bytes())
            .map_err(channel_io)?;
        self.sender_channel.pump().map_err(channel_io)
    }

    /// Reports that a per-file transfer attempt failed and was skipped.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the channel fails.
    pub fn emit_error_xfer(&mut self, path: &Path) -> Result<(), SessionError> {
        self.gen_channel
            .put_message(MessageCode::ErrorXfer, path.to_string_lossy().as_bytes())
            .map_err(channel_io)?;
        self.sender_channel.pump().map_err(channel_io)
    }

    /// Closes out `PHASE_DONE`: sends `NDX_DONE`, waits for the sender to
    /// acknowledge it, and has the sender report final statistics back.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the channel fails or the sender's
    /// acknowledgement does not match `NDX_DONE`.
    pub fn finish(&mut self) -> Result<(), SessionError> {
        let mut buf = Vec::new();
        self.gen_codec.write_ndx_done(&mut buf).map_err(channel_io)?;
        self.gen_channel.put_bytes(&buf).map_err(channel_io)?;
        self.gen_channel.flush().map_err(channel_io)?;

        let done = self
            .sender_codec
            .read_ndx(&mut self.sender_channel.read_adapter())
            .map_err(channel_io)?;
        if done != protocol::NDX_DONE {
            return Err(SessionError::Channel(format!("expected NDX_DONE, got {done}")));
        }

        self.sender_channel.put_message(MessageCode::Stats, &[]).map_err(channel_io)?;
        self.gen_channel.pump().map_err(channel_io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsops::fake::InMemoryFs;
    use flist::FileEntry;
    use std::path::PathBuf;

    fn list_with(path: &str, data: &[u8]) -> FileList {
        let mut list = FileList::new();
        let seg = list.push_segment(None);
        list.segment_mut(seg)
            .unwrap()
            .insert(0, FileEntry::new(path.as_bytes().to_vec(), 0o100_644, data.len() as u64, 0));
        list
    }

    fn logs() -> (ControlLog, ControlLog) {
        (Rc::new(RefCell::new(Vec::new())), Rc::new(RefCell::new(Vec::new())))
    }

    #[test]
    fn a_whole_file_request_round_trips_its_delta_through_the_wire() {
        let fs = InMemoryFs::default();
        fs.files.borrow_mut().insert(PathBuf::from("a.txt"), b"hello world".to_vec());
        let list = list_with("a.txt", b"hello world");
        let (gen_log, sender_log) = logs();
        let mut pipeline = Pipeline::new(gen_log, sender_log);

        let request = TransferRequest { index: 0, signature: None };
        let outcome = pipeline.transfer_one(&fs, &list, &request, [0; 4]).unwrap();

        match outcome {
            PipelineDelta::Delta(delta, stats) => {
                assert_eq!(delta.tokens, vec![matching::DeltaToken::Literal(b"hello world".to_vec())]);
                assert_eq!(stats.literal_bytes, 11);
            }
            PipelineDelta::NoSend => panic!("expected a delta"),
        }
    }

    #[test]
    fn an_unopenable_source_emits_no_send_and_is_observed_on_both_logs() {
        let fs = InMemoryFs::default();
        let list = list_with("missing.txt", b"");
        let (gen_log, sender_log) = logs();
        let mut pipeline = Pipeline::new(gen_log.clone(), sender_log.clone());

        let request = TransferRequest { index: 0, signature: None };
        let outcome = pipeline.transfer_one(&fs, &list, &request, [0; 4]).unwrap();

        assert!(matches!(outcome, PipelineDelta::NoSend));
        assert_eq!(gen_log.borrow().as_slice(), &[ControlEvent::NoSend { index: 0 }]);
    }

    #[test]
    fn redo_is_recorded_on_the_sender_side_log() {
        let (gen_log, sender_log) = logs();
        let mut pipeline = Pipeline::new(gen_log, sender_log.clone());

        pipeline.request_redo(3).unwrap();

        assert_eq!(sender_log.borrow().as_slice(), &[ControlEvent::Redo { index: 3 }]);
    }

    #[test]
    fn deleted_and_io_error_are_recorded_on_the_sender_side_log() {
        let (gen_log, sender_log) = logs();
        let mut pipeline = Pipeline::new(gen_log, sender_log.clone());

        pipeline.emit_deleted(Path::new("/dest/stale.txt")).unwrap();
        pipeline.emit_io_error(Path::new("/dest/broken.txt")).unwrap();

        assert_eq!(
            sender_log.borrow().as_slice(),
            &[
                ControlEvent::Deleted { path: PathBuf::from("/dest/stale.txt") },
                ControlEvent::IoError { path: PathBuf::from("/dest/broken.txt") },
            ]
        );
    }

    #[test]
    fn error_xfer_is_recorded_on_the_sender_side_log() {
        let (gen_log, sender_log) = logs();
        let mut pipeline = Pipeline::new(gen_log, sender_log.clone());

        pipeline.emit_error_xfer(Path::new("/dest/flaky.txt")).unwrap();

        assert_eq!(
            sender_log.borrow().as_slice(),
            &[ControlEvent::ErrorXfer { path: PathBuf::from("/dest/flaky.txt") }]
        );
    }

    #[test]
    fn finish_drains_a_final_stats_message() {
        let (gen_log, sender_log) = logs();
        let mut pipeline = Pipeline::new(gen_log.clone(), sender_log);

        pipeline.finish().unwrap();

        assert!(matches!(gen_log.borrow().as_slice(), [ControlEvent::Stats { .. }]));
    }
}
