//! Multiplexed message codes and the fixed-size frame header that tags every
//! write on the duplex channel with a code and payload length.
//!
//! The wire tag is a single little-endian `u32`: the top byte is
//! `MPLEX_BASE + code`, the lower three bytes are the payload length. `DATA`
//! (code `0`) carries the raw transfer stream; every other code carries a
//! control message.

use std::fmt;
use std::str::FromStr;

/// Offset added to a [`MessageCode`]'s numeric value to form the tag byte.
pub const MPLEX_BASE: u8 = 7;

/// Size in bytes of an encoded [`MessageHeader`].
pub const HEADER_LEN: usize = 4;

/// Largest payload length a single frame can carry (24 bits).
pub const MAX_PAYLOAD_LENGTH: u32 = 0x00FF_FFFF;

/// Mask applied to a decoded tag word to recover the payload length.
pub const PAYLOAD_MASK: u32 = 0x00FF_FFFF;

/// Multiplexed message code, matching the upstream rsync protocol's `MSG_*` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageCode {
    Data,
    ErrorXfer,
    Info,
    Error,
    Warning,
    ErrorSocket,
    Log,
    Client,
    ErrorUtf8,
    Redo,
    Stats,
    IoError,
    IoTimeout,
    NoOp,
    ErrorExit,
    Success,
    Deleted,
    NoSend,
}

impl MessageCode {
    /// All known codes, sorted by numeric value.
    pub const ALL: &'static [MessageCode] = &[
        MessageCode::Data,
        MessageCode::ErrorXfer,
        MessageCode::Info,
        MessageCode::Error,
        MessageCode::Warning,
        MessageCode::ErrorSocket,
        MessageCode::Log,
        MessageCode::Client,
        MessageCode::ErrorUtf8,
        MessageCode::Redo,
        MessageCode::Stats,
        MessageCode::IoError,
        MessageCode::IoTimeout,
        MessageCode::NoOp,
        MessageCode::ErrorExit,
        MessageCode::Success,
        MessageCode::Deleted,
        MessageCode::NoSend,
    ];

    /// `MSG_FLUSH` is a historical alias for `MSG_INFO`.
    pub const FLUSH: MessageCode = MessageCode::Info;

    /// Returns every known code, sorted by numeric value.
    #[must_use]
    pub const fn all() -> &'static [MessageCode] {
        Self::ALL
    }

    /// Numeric value of this code as transmitted on the wire.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            MessageCode::Data => 0,
            MessageCode::ErrorXfer => 1,
            MessageCode::Info => 2,
            MessageCode::Error => 3,
            MessageCode::Warning => 4,
            MessageCode::ErrorSocket => 5,
            MessageCode::Log => 6,
            MessageCode::Client => 7,
            MessageCode::ErrorUtf8 => 8,
            MessageCode::Redo => 9,
            MessageCode::Stats => 10,
            MessageCode::IoError => 22,
            MessageCode::IoTimeout => 33,
            MessageCode::NoOp => 42,
            MessageCode::ErrorExit => 86,
            MessageCode::Success => 100,
            MessageCode::Deleted => 101,
            MessageCode::NoSend => 102,
        }
    }

    /// Looks up a code by its numeric value, returning `None` for unknown values.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(MessageCode::Data),
            1 => Some(MessageCode::ErrorXfer),
            2 => Some(MessageCode::Info),
            3 => Some(MessageCode::Error),
            4 => Some(MessageCode::Warning),
            5 => Some(MessageCode::ErrorSocket),
            6 => Some(MessageCode::Log),
            7 => Some(MessageCode::Client),
            8 => Some(MessageCode::ErrorUtf8),
            9 => Some(MessageCode::Redo),
            10 => Some(MessageCode::Stats),
            22 => Some(MessageCode::IoError),
            33 => Some(MessageCode::IoTimeout),
            42 => Some(MessageCode::NoOp),
            86 => Some(MessageCode::ErrorExit),
            100 => Some(MessageCode::Success),
            101 => Some(MessageCode::Deleted),
            102 => Some(MessageCode::NoSend),
            _ => None,
        }
    }

    /// Identifier matching the upstream `MSG_*` macro name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            MessageCode::Data => "MSG_DATA",
            MessageCode::ErrorXfer => "MSG_ERROR_XFER",
            MessageCode::Info => "MSG_INFO",
            MessageCode::Error => "MSG_ERROR",
            MessageCode::Warning => "MSG_WARNING",
            MessageCode::ErrorSocket => "MSG_ERROR_SOCKET",
            MessageCode::Log => "MSG_LOG",
            MessageCode::Client => "MSG_CLIENT",
            MessageCode::ErrorUtf8 => "MSG_ERROR_UTF8",
            MessageCode::Redo => "MSG_REDO",
            MessageCode::Stats => "MSG_STATS",
            MessageCode::IoError => "MSG_IO_ERROR",
            MessageCode::IoTimeout => "MSG_IO_TIMEOUT",
            MessageCode::NoOp => "MSG_NOOP",
            MessageCode::ErrorExit => "MSG_ERROR_EXIT",
            MessageCode::Success => "MSG_SUCCESS",
            MessageCode::Deleted => "MSG_DELETED",
            MessageCode::NoSend => "MSG_NO_SEND",
        }
    }

    /// True for codes that carry logging/diagnostic text rather than transfer data.
    #[must_use]
    pub const fn is_logging(self) -> bool {
        matches!(
            self,
            MessageCode::ErrorXfer
                | MessageCode::Info
                | MessageCode::Error
                | MessageCode::Warning
                | MessageCode::ErrorSocket
                | MessageCode::ErrorUtf8
                | MessageCode::Log
                | MessageCode::Client
        )
    }

    /// Maps a logging code to its [`LogCode`] equivalent, if any.
    #[must_use]
    pub const fn log_code(self) -> Option<LogCode> {
        match self {
            MessageCode::ErrorXfer => Some(LogCode::ErrorXfer),
            MessageCode::Info => Some(LogCode::Info),
            MessageCode::Error => Some(LogCode::Error),
            MessageCode::Warning => Some(LogCode::Warning),
            MessageCode::ErrorSocket => Some(LogCode::ErrorSocket),
            MessageCode::Log => Some(LogCode::Log),
            MessageCode::Client => Some(LogCode::Client),
            MessageCode::ErrorUtf8 => Some(LogCode::ErrorUtf8),
            _ => None,
        }
    }

    /// Inverse of [`Self::log_code`]; `LogCode::None` has no multiplexed equivalent.
    #[must_use]
    pub const fn from_log_code(log: LogCode) -> Option<Self> {
        match log {
            LogCode::None => None,
            LogCode::ErrorXfer => Some(MessageCode::ErrorXfer),
            LogCode::Info => Some(MessageCode::Info),
            LogCode::Error => Some(MessageCode::Error),
            LogCode::Warning => Some(MessageCode::Warning),
            LogCode::ErrorSocket => Some(MessageCode::ErrorSocket),
            LogCode::Log => Some(MessageCode::Log),
            LogCode::Client => Some(MessageCode::Client),
            LogCode::ErrorUtf8 => Some(MessageCode::ErrorUtf8),
        }
    }
}

impl fmt::Display for MessageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<MessageCode> for u8 {
    fn from(code: MessageCode) -> Self {
        code.as_u8()
    }
}

/// Error returned when a string does not name a known [`MessageCode`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown multiplexed message code name: {0:?}")]
pub struct MessageCodeParseError(String);

impl MessageCodeParseError {
    /// The unrecognised name that was parsed.
    #[must_use]
    pub fn invalid_name(&self) -> &str {
        &self.0
    }
}

impl FromStr for MessageCode {
    type Err = MessageCodeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "MSG_FLUSH" {
            return Ok(MessageCode::Info);
        }
        for &code in MessageCode::ALL {
            if code.name() == s {
                return Ok(code);
            }
        }
        Err(MessageCodeParseError(s.to_string()))
    }
}

impl TryFrom<u8> for MessageCode {
    type Error = EnvelopeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        MessageCode::from_u8(value).ok_or(EnvelopeError::UnknownMessageCode(value))
    }
}

/// Logging severity code, matching upstream rsync's `F*` log-message classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogCode {
    None,
    ErrorXfer,
    Info,
    Error,
    Warning,
    ErrorSocket,
    Log,
    Client,
    ErrorUtf8,
}

impl LogCode {
    pub const ALL: &'static [LogCode] = &[
        LogCode::None,
        LogCode::ErrorXfer,
        LogCode::Info,
        LogCode::Error,
        LogCode::Warning,
        LogCode::ErrorSocket,
        LogCode::Log,
        LogCode::Client,
        LogCode::ErrorUtf8,
    ];

    #[must_use]
    pub const fn all() -> &'static [LogCode] {
        Self::ALL
    }

    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            LogCode::None => 0,
            LogCode::ErrorXfer => 1,
            LogCode::Info => 2,
            LogCode::Error => 3,
            LogCode::Warning => 4,
            LogCode::ErrorSocket => 5,
            LogCode::Log => 6,
            LogCode::Client => 7,
            LogCode::ErrorUtf8 => 8,
        }
    }

    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(LogCode::None),
            1 => Some(LogCode::ErrorXfer),
            2 => Some(LogCode::Info),
            3 => Some(LogCode::Error),
            4 => Some(LogCode::Warning),
            5 => Some(LogCode::ErrorSocket),
            6 => Some(LogCode::Log),
            7 => Some(LogCode::Client),
            8 => Some(LogCode::ErrorUtf8),
            _ => None,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            LogCode::None => "FNONE",
            LogCode::ErrorXfer => "FERROR_XFER",
            LogCode::Info => "FINFO",
            LogCode::Error => "FERROR",
            LogCode::Warning => "FWARNING",
            LogCode::ErrorSocket => "FERROR_SOCKET",
            LogCode::Log => "FLOG",
            LogCode::Client => "FCLIENT",
            LogCode::ErrorUtf8 => "FERROR_UTF8",
        }
    }
}

impl fmt::Display for LogCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a log code cannot be parsed or looked up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct LogCodeError {
    value: Option<u8>,
    name: Option<String>,
}

impl LogCodeError {
    /// The unrecognised numeric value, if this error came from [`TryFrom<u8>`].
    #[must_use]
    pub fn invalid_value(&self) -> Option<u8> {
        self.value
    }

    /// The unrecognised name, if this error came from [`FromStr`].
    #[must_use]
    pub fn invalid_name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl fmt::Display for LogCodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(value) = self.value {
            write!(f, "unknown log code value: {value}")
        } else {
            write!(f, "unknown log code name: {:?}", self.name.as_deref().unwrap_or_default())
        }
    }
}

impl FromStr for LogCode {
    type Err = LogCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        for &code in LogCode::ALL {
            if code.name() == s {
                return Ok(code);
            }
        }
        Err(LogCodeError {
            value: None,
            name: Some(s.to_string()),
        })
    }
}

impl TryFrom<u8> for LogCode {
    type Error = LogCodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        LogCode::from_u8(value).ok_or(LogCodeError {
            value: Some(value),
            name: None,
        })
    }
}

/// Error returned when converting between [`MessageCode`] and [`LogCode`] fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LogCodeConversionError {
    #[error("log code {0} has no multiplexed message equivalent")]
    NoMessageEquivalent(LogCode),
    #[error("message code {0} has no log code equivalent")]
    NoLogEquivalent(MessageCode),
}

impl LogCodeConversionError {
    /// The `LogCode` operand of the failed conversion, if any.
    #[must_use]
    pub const fn log_code(&self) -> Option<LogCode> {
        match self {
            LogCodeConversionError::NoMessageEquivalent(log) => Some(*log),
            LogCodeConversionError::NoLogEquivalent(_) => None,
        }
    }

    /// The `MessageCode` operand of the failed conversion, if any.
    #[must_use]
    pub const fn message_code(&self) -> Option<MessageCode> {
        match self {
            LogCodeConversionError::NoLogEquivalent(code) => Some(*code),
            LogCodeConversionError::NoMessageEquivalent(_) => None,
        }
    }
}

impl TryFrom<LogCode> for MessageCode {
    type Error = LogCodeConversionError;

    fn try_from(log: LogCode) -> Result<Self, Self::Error> {
        MessageCode::from_log_code(log).ok_or(LogCodeConversionError::NoMessageEquivalent(log))
    }
}

impl TryFrom<MessageCode> for LogCode {
    type Error = LogCodeConversionError;

    fn try_from(code: MessageCode) -> Result<Self, Self::Error> {
        code.log_code().ok_or(LogCodeConversionError::NoLogEquivalent(code))
    }
}

/// Error returned while encoding or decoding a [`MessageHeader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("multiplexed header contained invalid tag byte: {0}")]
    InvalidTag(u8),
    #[error("multiplexed header referenced unknown message code: {0}")]
    UnknownMessageCode(u8),
    #[error("multiplexed header truncated: expected {HEADER_LEN} bytes but received {actual}")]
    TruncatedHeader { actual: usize },
    #[error("multiplexed payload length {0} exceeds maximum {MAX_PAYLOAD_LENGTH}")]
    OversizedPayload(u32),
}

/// Fixed-size header tagging every multiplexed frame with a code and payload length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    code: MessageCode,
    payload_len: u32,
}

impl MessageHeader {
    /// Builds a header, rejecting payload lengths beyond [`MAX_PAYLOAD_LENGTH`].
    pub const fn new(code: MessageCode, payload_len: u32) -> Result<Self, EnvelopeError> {
        if payload_len > MAX_PAYLOAD_LENGTH {
            return Err(EnvelopeError::OversizedPayload(payload_len));
        }
        Ok(Self { code, payload_len })
    }

    #[must_use]
    pub const fn code(&self) -> MessageCode {
        self.code
    }

    #[must_use]
    pub const fn payload_len(&self) -> u32 {
        self.payload_len
    }

    #[must_use]
    pub fn payload_len_usize(&self) -> usize {
        debug_assert!(usize::BITS >= 24, "platform cannot represent a 24-bit payload length");
        self.payload_len as usize
    }

    /// Encodes the header into its little-endian tag word.
    #[must_use]
    pub const fn encode_raw(&self) -> u32 {
        let tag = (MPLEX_BASE as u32 + self.code.as_u8() as u32) << 24;
        tag | self.payload_len
    }

    /// Encodes the header into its little-endian byte representation.
    #[must_use]
    pub const fn encode(&self) -> [u8; HEADER_LEN] {
        self.encode_raw().to_le_bytes()
    }

    /// Encodes the header into the start of `buf`, leaving the tail untouched.
    pub fn encode_into_slice(&self, buf: &mut [u8]) -> Result<(), EnvelopeError> {
        if buf.len() < HEADER_LEN {
            return Err(EnvelopeError::TruncatedHeader { actual: buf.len() });
        }
        buf[..HEADER_LEN].copy_from_slice(&self.encode());
        Ok(())
    }

    /// Decodes a header from its raw little-endian tag word.
    pub const fn from_raw(raw: u32) -> Result<Self, EnvelopeError> {
        let tag_byte = (raw >> 24) as u8;
        if tag_byte < MPLEX_BASE {
            return Err(EnvelopeError::InvalidTag(tag_byte));
        }
        let code_byte = tag_byte - MPLEX_BASE;
        let code = match MessageCode::from_u8(code_byte) {
            Some(code) => code,
            None => return Err(EnvelopeError::UnknownMessageCode(code_byte)),
        };
        Ok(Self {
            code,
            payload_len: raw & PAYLOAD_MASK,
        })
    }

    /// Decodes a header from its little-endian byte representation.
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        if bytes.len() < HEADER_LEN {
            return Err(EnvelopeError::TruncatedHeader { actual: bytes.len() });
        }
        let raw = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        Self::from_raw(raw)
    }
}

impl TryFrom<[u8; HEADER_LEN]> for MessageHeader {
    type Error = EnvelopeError;

    fn try_from(bytes: [u8; HEADER_LEN]) -> Result<Self, Self::Error> {
        Self::decode(&bytes)
    }
}

impl TryFrom<&[u8]> for MessageHeader {
    type Error = EnvelopeError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::decode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn log_codes_are_hashable() {
        let mut set = HashSet::new();
        assert!(set.insert(LogCode::Info));
        assert!(!set.insert(LogCode::Info));
    }

    #[test]
    fn message_code_round_trips_through_try_from() {
        for &code in MessageCode::all() {
            let raw = code.as_u8();
            assert_eq!(MessageCode::try_from(raw), Ok(code));
            assert_eq!(MessageCode::from_u8(raw), Some(code));
        }
    }

    #[test]
    fn message_code_from_u8_rejects_gaps() {
        assert_eq!(MessageCode::from_u8(11), None);
        assert_eq!(MessageCode::from_u8(0xFF), None);
    }

    #[test]
    fn message_code_from_str_parses_names_and_flush_alias() {
        for &code in MessageCode::ALL {
            assert_eq!(code.name().parse::<MessageCode>(), Ok(code));
        }
        assert_eq!("MSG_FLUSH".parse::<MessageCode>(), Ok(MessageCode::Info));
        assert_eq!(MessageCode::FLUSH, MessageCode::Info);
    }

    #[test]
    fn message_code_from_str_rejects_unknown_names() {
        let err = "MSG_SOMETHING_ELSE".parse::<MessageCode>().unwrap_err();
        assert_eq!(err.invalid_name(), "MSG_SOMETHING_ELSE");
    }

    #[test]
    fn logging_classification_matches_upstream_set() {
        const LOGGING: &[MessageCode] = &[
            MessageCode::ErrorXfer,
            MessageCode::Info,
            MessageCode::Error,
            MessageCode::Warning,
            MessageCode::ErrorSocket,
            MessageCode::ErrorUtf8,
            MessageCode::Log,
            MessageCode::Client,
        ];
        for &code in MessageCode::ALL {
            assert_eq!(code.is_logging(), LOGGING.contains(&code));
        }
    }

    #[test]
    fn log_code_round_trips_and_rejects_gaps() {
        for &code in LogCode::all() {
            assert_eq!(LogCode::from_u8(code.as_u8()), Some(code));
            assert_eq!(code.name().parse::<LogCode>(), Ok(code));
        }
        assert_eq!(LogCode::from_u8(9), None);
        let err = LogCode::try_from(9).unwrap_err();
        assert_eq!(err.invalid_value(), Some(9));
        assert_eq!(err.to_string(), "unknown log code value: 9");
    }

    #[test]
    fn log_code_from_str_rejects_unknown_names() {
        let err = "FUNKNOWN".parse::<LogCode>().unwrap_err();
        assert_eq!(err.invalid_name(), Some("FUNKNOWN"));
        assert_eq!(err.invalid_value(), None);
    }

    #[test]
    fn conversions_between_message_code_and_log_code() {
        for &code in MessageCode::ALL {
            match code.log_code() {
                Some(log) => assert_eq!(LogCode::try_from(code), Ok(log)),
                None => {
                    let err = LogCode::try_from(code).unwrap_err();
                    assert_eq!(err, LogCodeConversionError::NoLogEquivalent(code));
                }
            }
        }
        for &log in LogCode::ALL {
            match log {
                LogCode::None => {
                    let err = MessageCode::try_from(log).unwrap_err();
                    assert_eq!(err, LogCodeConversionError::NoMessageEquivalent(log));
                }
                _ => {
                    let code = MessageCode::try_from(log).unwrap();
                    assert_eq!(code.log_code(), Some(log));
                }
            }
        }
    }

    #[test]
    fn header_round_trips() {
        let header = MessageHeader::new(MessageCode::Info, 123).unwrap();
        let encoded = header.encode();
        assert_eq!(MessageHeader::decode(&encoded).unwrap(), header);
        assert_eq!(MessageHeader::try_from(encoded).unwrap(), header);
        assert_eq!(MessageHeader::try_from(&encoded[..]).unwrap(), header);
    }

    #[test]
    fn header_new_is_const_evaluable() {
        const HEADER: MessageHeader = match MessageHeader::new(MessageCode::Info, 42) {
            Ok(header) => header,
            Err(_) => panic!("valid header must construct"),
        };
        assert_eq!(HEADER.code(), MessageCode::Info);
        assert_eq!(HEADER.payload_len(), 42);
    }

    #[test]
    fn header_rejects_oversized_payload() {
        let err = MessageHeader::new(MessageCode::Info, MAX_PAYLOAD_LENGTH + 1).unwrap_err();
        assert_eq!(err, EnvelopeError::OversizedPayload(MAX_PAYLOAD_LENGTH + 1));
    }

    #[test]
    fn decode_rejects_truncated_and_invalid_headers() {
        assert_eq!(
            MessageHeader::decode(&[0u8; 2]).unwrap_err(),
            EnvelopeError::TruncatedHeader { actual: 2 }
        );
        assert_eq!(
            MessageHeader::try_from([0u8; HEADER_LEN]).unwrap_err(),
            EnvelopeError::InvalidTag(0)
        );
    }

    #[test]
    fn decode_masks_payload_length_to_24_bits() {
        let tag = (u32::from(MPLEX_BASE) + u32::from(MessageCode::Info.as_u8())) << 24;
        let raw = tag | (MAX_PAYLOAD_LENGTH + 1);
        let header = MessageHeader::decode(&raw.to_le_bytes()).unwrap();
        assert_eq!(header.payload_len(), (MAX_PAYLOAD_LENGTH + 1) & PAYLOAD_MASK);
    }

    #[test]
    fn encode_into_slice_rejects_short_buffers() {
        let header = MessageHeader::new(MessageCode::Info, 7).unwrap();
        let mut buf = [0u8; HEADER_LEN - 1];
        let err = header.encode_into_slice(&mut buf).unwrap_err();
        assert_eq!(err, EnvelopeError::TruncatedHeader { actual: HEADER_LEN - 1 });
    }
}
