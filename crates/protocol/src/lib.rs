//! Wire protocol primitives: the multiplexed channel, the index codec and
//! the version/checksum-seed handshake.
//!
//! This crate has no notion of a session, a file list or a transfer; it
//! only knows how to put bytes on the wire and take them back off again in
//! the shapes the rest of the implementation needs.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod channel;
mod codec;
mod envelope;
mod multiplex;
mod negotiation;

pub use channel::{
    Channel, ChannelError, ChannelReader, MessageHandler, NullMessageHandler, OUT_BUFFER_CAPACITY,
};
pub use codec::{IndexCodec, NDX_DONE};
pub use envelope::{
    EnvelopeError, LogCode, LogCodeConversionError, LogCodeError, MessageCode,
    MessageCodeParseError, MessageHeader, HEADER_LEN, MAX_PAYLOAD_LENGTH, MPLEX_BASE,
    PAYLOAD_MASK,
};
pub use multiplex::{recv_msg, recv_msg_into, send_frame, send_msg, send_msgs_vectored, MessageFrame};
pub use negotiation::{
    negotiate_version, recv_checksum_seed, send_checksum_seed, NegotiationError, PROTOCOL_VERSION,
};
