//! The duplex channel: a buffering, flush-disciplined multiplexer on top of
//! [`crate::multiplex`]'s one-shot frame I/O.
//!
//! Where [`crate::multiplex::send_msg`]/[`crate::multiplex::recv_msg`] write
//! or read exactly one tagged frame, [`Channel`] is the stateful object each
//! of Sender, Generator and Receiver actually holds for the life of a
//! session: outbound primitive writes batch into a single `DATA` frame until
//! the buffer runs low, and inbound reads transparently dispatch any control
//! frame interleaved in the stream to a [`MessageHandler`] before resuming
//! payload delivery.

use std::io::{self, Read, Write};

use crate::envelope::{EnvelopeError, MessageCode, MessageHeader, HEADER_LEN, MAX_PAYLOAD_LENGTH};
use crate::multiplex::{envelope_to_io, read_payload, write_all_frame};

/// Output buffer capacity. Matches the teacher's default multiplexed I/O
/// buffer size; large enough that most primitive writes never force a
/// flush.
pub const OUT_BUFFER_CAPACITY: usize = 4096;

/// Smallest frame the outbound buffer must always have room for: a 4-byte
/// header plus at least one payload byte.
const MIN_FRAME_LEN: usize = HEADER_LEN + 1;

/// Errors raised by [`Channel`] operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The stream ended while a primitive's payload was only partially read.
    #[error("duplex channel ended mid-payload")]
    Eof,
    /// A lower-level I/O fault, not specific to framing.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// A frame's header or length was malformed.
    #[error(transparent)]
    Protocol(#[from] EnvelopeError),
}

impl From<ChannelError> for io::Error {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Io(err) => err,
            ChannelError::Eof => io::Error::new(io::ErrorKind::UnexpectedEof, err.to_string()),
            ChannelError::Protocol(err) => envelope_to_io(err),
        }
    }
}

/// Receives control messages delivered out of band while the channel's
/// reader is pulled for payload bytes.
///
/// Invoked synchronously and in wire order: a handler that itself blocks
/// (e.g. waiting on another task) stalls payload delivery until it returns.
pub trait MessageHandler {
    /// Handles one non-`DATA` frame.
    ///
    /// # Errors
    ///
    /// Returning an error aborts the in-flight `get_*` call with
    /// [`ChannelError::Io`].
    fn handle_message(&mut self, code: MessageCode, payload: &[u8]) -> io::Result<()>;
}

/// A [`MessageHandler`] that ignores every message; useful for a half of a
/// session that never expects control traffic (e.g. a test harness driving
/// only the data path).
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMessageHandler;

impl MessageHandler for NullMessageHandler {
    fn handle_message(&mut self, _code: MessageCode, _payload: &[u8]) -> io::Result<()> {
        Ok(())
    }
}

/// A buffering, framed duplex channel over a byte stream `S`, delivering
/// non-`DATA` control frames to a registered [`MessageHandler`] `H`.
///
/// `out` always reserves its first [`HEADER_LEN`] bytes for a tag that is
/// filled in only once the buffered payload is known to be `DATA` (on
/// flush) or once a control message needs to interleave (on
/// [`Self::put_message`]); untagged bytes in between are plain payload
/// accumulating toward the next flush.
pub struct Channel<S, H> {
    stream: S,
    handler: H,
    out: Vec<u8>,
    in_buf: Vec<u8>,
    in_pos: usize,
}

impl<S, H> Channel<S, H>
where
    S: Read + Write,
    H: MessageHandler,
{
    /// Wraps `stream`, dispatching any control frame encountered on reads to
    /// `handler`.
    pub fn new(stream: S, handler: H) -> Self {
        let mut out = Vec::with_capacity(OUT_BUFFER_CAPACITY);
        out.extend_from_slice(&[0u8; HEADER_LEN]);
        Self {
            stream,
            handler,
            out,
            in_buf: Vec::new(),
            in_pos: 0,
        }
    }

    /// Bytes of `DATA` payload currently buffered, not yet flushed.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.out.len() - HEADER_LEN
    }

    fn remaining_capacity(&self) -> usize {
        OUT_BUFFER_CAPACITY.saturating_sub(self.out.len())
    }

    fn ensure_room(&mut self, additional: usize) -> io::Result<()> {
        if self.remaining_capacity() < additional.max(1) && self.remaining_capacity() < MIN_FRAME_LEN {
            self.flush()?;
        }
        Ok(())
    }

    /// Appends a single byte to the outbound buffer, flushing first if the
    /// buffer cannot hold another minimum-sized frame afterwards.
    pub fn put_byte(&mut self, value: u8) -> io::Result<()> {
        self.ensure_room(1)?;
        self.out.push(value);
        Ok(())
    }

    /// Appends a single ASCII/Latin-1 character. Wire-identical to
    /// [`Self::put_byte`]; kept distinct to mirror the primitives the
    /// protocol names separately.
    pub fn put_char(&mut self, value: u8) -> io::Result<()> {
        self.put_byte(value)
    }

    /// Appends a little-endian 32-bit integer.
    pub fn put_int(&mut self, value: i32) -> io::Result<()> {
        self.put_bytes(&value.to_le_bytes())
    }

    /// Appends raw bytes, flushing first if they would not fit in the
    /// remaining buffer capacity.
    pub fn put_bytes(&mut self, src: &[u8]) -> io::Result<()> {
        if src.len() > OUT_BUFFER_CAPACITY - HEADER_LEN {
            // Larger than the buffer could ever hold even empty: flush
            // whatever is pending, then write the chunk directly as its own
            // DATA frame rather than growing the buffer unbounded.
            self.flush()?;
            let header = MessageHeader::new(MessageCode::Data, src.len() as u32).map_err(envelope_to_io)?;
            write_all_frame(&mut self.stream, &header.encode())?;
            write_all_frame(&mut self.stream, src)?;
            return Ok(());
        }
        self.ensure_room(src.len())?;
        if self.remaining_capacity() < src.len() {
            self.flush()?;
        }
        self.out.extend_from_slice(src);
        Ok(())
    }

    /// Sends a control message, interleaving it with any buffered `DATA`
    /// payload without reordering either stream.
    ///
    /// If buffered payload is already pending, it is tagged and flushed as
    /// its own `DATA` frame first; the message is then written as a second,
    /// immediately flushed frame so a peer waiting on it is never starved by
    /// later buffering.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::OversizedPayload`] via [`io::Error`] if
    /// `payload` exceeds [`MAX_PAYLOAD_LENGTH`].
    pub fn put_message(&mut self, code: MessageCode, payload: &[u8]) -> io::Result<()> {
        if payload.len() as u64 > u64::from(MAX_PAYLOAD_LENGTH) {
            return Err(envelope_to_io(EnvelopeError::OversizedPayload(payload.len() as u32)));
        }
        if self.buffered_len() > 0 {
            self.flush()?;
        }
        let header = MessageHeader::new(code, payload.len() as u32).map_err(envelope_to_io)?;
        write_all_frame(&mut self.stream, &header.encode())?;
        write_all_frame(&mut self.stream, payload)?;
        self.stream.flush()
    }

    /// Flushes any buffered payload as a single `DATA` frame. A no-op if
    /// nothing is buffered.
    pub fn flush(&mut self) -> io::Result<()> {
        let payload_len = self.buffered_len();
        if payload_len == 0 {
            self.out.truncate(HEADER_LEN);
            return Ok(());
        }
        let header = MessageHeader::new(MessageCode::Data, payload_len as u32).map_err(envelope_to_io)?;
        header.encode_into_slice(&mut self.out[..HEADER_LEN]).map_err(envelope_to_io)?;
        write_all_frame(&mut self.stream, &self.out)?;
        self.stream.flush()?;
        self.out.truncate(HEADER_LEN);
        Ok(())
    }

    fn fill_in_buf(&mut self) -> io::Result<()> {
        loop {
            let mut header_bytes = [0u8; HEADER_LEN];
            read_payload(&mut self.stream, &mut header_bytes, HEADER_LEN)?;
            let header = MessageHeader::decode(&header_bytes).map_err(envelope_to_io)?;
            let mut payload = vec![0u8; header.payload_len_usize()];
            read_payload(&mut self.stream, &mut payload, payload.len())?;

            if header.code() == MessageCode::Data {
                self.in_buf = payload;
                self.in_pos = 0;
                return Ok(());
            }
            self.handler.handle_message(header.code(), &payload)?;
        }
    }

    fn get_exact(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            if self.in_pos >= self.in_buf.len() {
                self.fill_in_buf()?;
                continue;
            }
            let take = (n - out.len()).min(self.in_buf.len() - self.in_pos);
            out.extend_from_slice(&self.in_buf[self.in_pos..self.in_pos + take]);
            self.in_pos += take;
        }
        Ok(out)
    }

    /// Reads a single byte, dispatching any interleaved control frame first.
    pub fn get_byte(&mut self) -> io::Result<u8> {
        Ok(self.get_exact(1)?[0])
    }

    /// Reads a single character. Wire-identical to [`Self::get_byte`].
    pub fn get_char(&mut self) -> io::Result<u8> {
        self.get_byte()
    }

    /// Reads a little-endian 32-bit integer.
    pub fn get_int(&mut self) -> io::Result<i32> {
        let bytes = self.get_exact(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads exactly `n` payload bytes, blocking across as many `DATA`
    /// frames as needed.
    pub fn get_bytes(&mut self, n: usize) -> io::Result<Vec<u8>> {
        self.get_exact(n)
    }

    /// Reads and processes exactly one frame: a control frame is dispatched
    /// to the handler immediately, a `DATA` frame is buffered for the next
    /// `get_*` call. Used to deterministically drain a message a peer is
    /// known to have just sent, without also requesting payload bytes.
    pub fn pump(&mut self) -> io::Result<()> {
        let mut header_bytes = [0u8; HEADER_LEN];
        read_payload(&mut self.stream, &mut header_bytes, HEADER_LEN)?;
        let header = MessageHeader::decode(&header_bytes).map_err(envelope_to_io)?;
        let mut payload = vec![0u8; header.payload_len_usize()];
        read_payload(&mut self.stream, &mut payload, payload.len())?;
        if header.code() == MessageCode::Data {
            self.in_buf = payload;
            self.in_pos = 0;
        } else {
            self.handler.handle_message(header.code(), &payload)?;
        }
        Ok(())
    }

    /// Borrows this channel as a [`std::io::Read`] adapter, so a
    /// `Read`-generic decoder (e.g. [`crate::IndexCodec`] or
    /// [`matching`-style token decoders](https://docs.rs/matching)) can
    /// consume payload bytes through it, transparently dispatching any
    /// interleaved control frame along the way.
    pub fn read_adapter(&mut self) -> ChannelReader<'_, S, H> {
        ChannelReader { channel: self }
    }

    /// Consumes the channel, returning the underlying stream and handler.
    pub fn into_inner(self) -> (S, H) {
        (self.stream, self.handler)
    }
}

/// Adapts [`Channel::get_bytes`] to [`std::io::Read`], returned by
/// [`Channel::read_adapter`].
pub struct ChannelReader<'a, S, H> {
    channel: &'a mut Channel<S, H>,
}

impl<S, H> Read for ChannelReader<'_, S, H>
where
    S: Read + Write,
    H: MessageHandler,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let bytes = self.channel.get_bytes(buf.len())?;
        buf[..bytes.len()].copy_from_slice(&bytes);
        Ok(bytes.len())
    }
}
