//! The multiplexed duplex channel: framing helpers layered on top of
//! [`crate::envelope`] for reading and writing tagged messages over any
//! `Read`/`Write` transport.

use std::io::{self, IoSlice, Read, Write};

use crate::envelope::{EnvelopeError, HEADER_LEN, MAX_PAYLOAD_LENGTH, MessageCode, MessageHeader};

pub(crate) fn envelope_to_io(err: EnvelopeError) -> io::Error {
    let kind = match err {
        EnvelopeError::OversizedPayload(_) => io::ErrorKind::InvalidInput,
        EnvelopeError::InvalidTag(_) | EnvelopeError::UnknownMessageCode(_) => {
            io::ErrorKind::InvalidData
        }
        EnvelopeError::TruncatedHeader { .. } => io::ErrorKind::UnexpectedEof,
    };
    io::Error::new(kind, err)
}

/// Writes `buf` in full, retrying on `Interrupted` and reporting a
/// zero-length write as [`io::ErrorKind::WriteZero`].
pub(crate) fn write_all_frame<W: Write + ?Sized>(writer: &mut W, mut buf: &[u8]) -> io::Result<()> {
    while !buf.is_empty() {
        match writer.write(buf) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "failed to write multiplexed message",
                ));
            }
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// A decoded multiplexed message: a code plus its owned payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFrame {
    code: MessageCode,
    payload: Vec<u8>,
}

impl MessageFrame {
    /// Builds a frame, rejecting payloads beyond [`MAX_PAYLOAD_LENGTH`].
    pub fn new(code: MessageCode, payload: Vec<u8>) -> io::Result<Self> {
        MessageHeader::new(code, payload.len() as u32).map_err(envelope_to_io)?;
        Ok(Self { code, payload })
    }

    #[must_use]
    pub fn code(&self) -> MessageCode {
        self.code
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.payload
    }

    #[must_use]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    #[must_use]
    pub fn into_parts(self) -> (MessageCode, Vec<u8>) {
        (self.code, self.payload)
    }

    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Recomputes this frame's header from its current payload length.
    pub fn header(&self) -> io::Result<MessageHeader> {
        MessageHeader::new(self.code, self.payload.len() as u32).map_err(envelope_to_io)
    }

    /// Writes this frame's header and payload to `writer`.
    pub fn encode_into_writer<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        send_frame(writer, self)
    }

    /// Appends this frame's encoded bytes to `out`.
    pub fn encode_into_vec(&self, out: &mut Vec<u8>) -> io::Result<()> {
        let header = self.header()?;
        out.extend_from_slice(&header.encode());
        out.extend_from_slice(&self.payload);
        Ok(())
    }

    /// Decodes one frame from the start of `data`, returning it along with the
    /// unconsumed remainder of the slice.
    pub fn decode_from_slice(data: &[u8]) -> io::Result<(Self, &[u8])> {
        if data.len() < HEADER_LEN {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "multiplexed header truncated"));
        }
        let header = MessageHeader::decode(&data[..HEADER_LEN]).map_err(envelope_to_io)?;
        let payload_len = header.payload_len_usize();
        let rest = &data[HEADER_LEN..];
        if rest.len() < payload_len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "multiplexed payload truncated",
            ));
        }
        let (payload, remainder) = rest.split_at(payload_len);
        Ok((
            Self {
                code: header.code(),
                payload: payload.to_vec(),
            },
            remainder,
        ))
    }
}

impl TryFrom<&[u8]> for MessageFrame {
    type Error = io::Error;

    fn try_from(data: &[u8]) -> io::Result<Self> {
        let (frame, remainder) = Self::decode_from_slice(data)?;
        if !remainder.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "input slice contains {} trailing bytes after multiplexed frame",
                    remainder.len()
                ),
            ));
        }
        Ok(frame)
    }
}

impl TryFrom<(MessageCode, Vec<u8>)> for MessageFrame {
    type Error = io::Error;

    fn try_from((code, payload): (MessageCode, Vec<u8>)) -> io::Result<Self> {
        Self::new(code, payload)
    }
}

impl From<MessageFrame> for (MessageCode, Vec<u8>) {
    fn from(frame: MessageFrame) -> Self {
        frame.into_parts()
    }
}

impl AsRef<[u8]> for MessageFrame {
    fn as_ref(&self) -> &[u8] {
        &self.payload
    }
}

impl AsMut<[u8]> for MessageFrame {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.payload
    }
}

impl std::ops::Deref for MessageFrame {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.payload
    }
}

impl std::ops::DerefMut for MessageFrame {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.payload
    }
}

/// Writes `code`/`payload` as one multiplexed frame.
pub fn send_msg<W: Write>(writer: &mut W, code: MessageCode, payload: &[u8]) -> io::Result<()> {
    let header = MessageHeader::new(code, payload.len() as u32).map_err(envelope_to_io)?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(&header.encode());
    bytes.extend_from_slice(payload);
    write_all_frame(writer, &bytes)
}

/// Writes a pre-built [`MessageFrame`].
pub fn send_frame<W: Write>(writer: &mut W, frame: &MessageFrame) -> io::Result<()> {
    let header = frame.header()?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + frame.payload.len());
    bytes.extend_from_slice(&header.encode());
    bytes.extend_from_slice(&frame.payload);
    write_all_frame(writer, &bytes)
}

/// Writes several messages back to back using vectored I/O where the
/// underlying writer supports it.
pub fn send_msgs_vectored<W: Write>(writer: &mut W, messages: &[(MessageCode, &[u8])]) -> io::Result<()> {
    let mut headers = Vec::with_capacity(messages.len());
    for &(code, payload) in messages {
        let header = MessageHeader::new(code, payload.len() as u32).map_err(envelope_to_io)?;
        headers.push(header.encode());
    }

    let mut slices = Vec::with_capacity(messages.len() * 2);
    for (header, &(_, payload)) in headers.iter().zip(messages) {
        slices.push(IoSlice::new(header));
        slices.push(IoSlice::new(payload));
    }

    let mut remaining = &mut slices[..];
    while !remaining.is_empty() {
        match writer.write_vectored(remaining) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "failed to write multiplexed message",
                ));
            }
            Ok(n) => {
                IoSlice::advance_slices(&mut remaining, n);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Reads one multiplexed frame, allocating a fresh payload buffer.
pub fn recv_msg<R: Read>(reader: &mut R) -> io::Result<MessageFrame> {
    let mut header_bytes = [0u8; HEADER_LEN];
    reader.read_exact(&mut header_bytes)?;
    let header = MessageHeader::decode(&header_bytes).map_err(envelope_to_io)?;

    let payload_len = header.payload_len_usize();
    let mut payload = vec![0u8; payload_len];
    read_payload(reader, &mut payload, payload_len)?;

    Ok(MessageFrame {
        code: header.code(),
        payload,
    })
}

/// Reads one multiplexed frame's payload into `buf`, reusing its capacity,
/// and returns the frame's code.
pub fn recv_msg_into<R: Read>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<MessageCode> {
    let mut header_bytes = [0u8; HEADER_LEN];
    reader.read_exact(&mut header_bytes)?;
    let header = MessageHeader::decode(&header_bytes).map_err(envelope_to_io)?;

    let payload_len = header.payload_len_usize();
    buf.clear();
    buf.resize(payload_len, 0);
    read_payload(reader, buf, payload_len)?;

    Ok(header.code())
}

/// Fills `buf[..expected]` from `reader`, retrying on `Interrupted` and
/// truncating `buf` to the bytes actually received on short reads.
pub(crate) fn read_payload<R: Read>(reader: &mut R, buf: &mut [u8], expected: usize) -> io::Result<()> {
    let mut filled = 0;
    while filled < expected {
        match reader.read(&mut buf[filled..expected]) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "multiplexed payload truncated: expected {expected} bytes but received {filled}"
                    ),
                ));
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
