//! Delta tokens: the literal/match vocabulary the Sender emits against a
//! peer's block-sum list, and their wire encoding.

use std::io::{self, Read};

/// One step of a delta stream: either a run of bytes the peer doesn't
/// already have, or a reference to a basis block it does.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum DeltaToken {
    /// A run of bytes with no basis-block match, to be written verbatim.
    Literal(Vec<u8>),
    /// A basis block, by its ordinal position in the block-sum list.
    Match {
        /// Index of the matched block in the basis file's block-sum list.
        block_index: u64,
    },
}

/// Error produced while encoding or decoding a [`DeltaToken`] stream.
#[derive(Debug, thiserror::Error)]
pub enum DeltaCodecError {
    /// The underlying reader failed.
    #[error("failed to read delta token: {0}")]
    Io(#[from] io::Error),
    /// A literal token's declared length exceeded what the wire format can carry.
    #[error("literal token length {0} exceeds the protocol maximum")]
    LiteralTooLong(usize),
    /// A match token's block index exceeded what the wire format can carry.
    #[error("block index {0} exceeds the protocol maximum")]
    BlockIndexTooLarge(usize),
}

/// Encodes `token` onto the end of `buf` using the length-prefixed wire
/// form: a positive length introduces that many literal bytes, a negative
/// length `-block_index - 1` references a basis block.
///
/// # Errors
///
/// Returns [`DeltaCodecError::LiteralTooLong`] if a literal run is too long
/// to represent as a positive `i32` length.
pub fn encode_token(buf: &mut Vec<u8>, token: &DeltaToken) -> Result<(), DeltaCodecError> {
    match token {
        DeltaToken::Literal(bytes) => {
            let len = i32::try_from(bytes.len()).map_err(|_| DeltaCodecError::LiteralTooLong(bytes.len()))?;
            if len == 0 {
                return Ok(());
            }
            buf.extend_from_slice(&len.to_le_bytes());
            buf.extend_from_slice(bytes);
        }
        DeltaToken::Match { block_index } => {
            let idx = i64::try_from(*block_index).map_err(|_| DeltaCodecError::BlockIndexTooLarge(*block_index as usize))?;
            let encoded = i32::try_from(-(idx + 1)).map_err(|_| DeltaCodecError::BlockIndexTooLarge(*block_index as usize))?;
            buf.extend_from_slice(&encoded.to_le_bytes());
        }
    }
    Ok(())
}

/// Appends the `END` sentinel (a zero length prefix) terminating a token stream.
pub fn encode_end(buf: &mut Vec<u8>) {
    buf.extend_from_slice(&0i32.to_le_bytes());
}

/// Decodes the next token from `reader`.
///
/// Returns `Ok(None)` on the `END` sentinel.
///
/// # Errors
///
/// Returns [`DeltaCodecError::Io`] if the underlying reader fails or ends
/// mid-token.
pub fn decode_token<R: Read>(reader: &mut R) -> Result<Option<DeltaToken>, DeltaCodecError> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let len = i32::from_le_bytes(len_bytes);

    if len == 0 {
        return Ok(None);
    }

    if len > 0 {
        let mut literal = vec![0u8; len as usize];
        reader.read_exact(&mut literal)?;
        Ok(Some(DeltaToken::Literal(literal)))
    } else {
        let block_index = (-(i64::from(len)) - 1) as u64;
        Ok(Some(DeltaToken::Match { block_index }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn literal_round_trips() {
        let token = DeltaToken::Literal(b"hello".to_vec());
        let mut buf = Vec::new();
        encode_token(&mut buf, &token).unwrap();
        encode_end(&mut buf);

        let mut cursor = Cursor::new(buf);
        assert_eq!(decode_token(&mut cursor).unwrap(), Some(token));
        assert_eq!(decode_token(&mut cursor).unwrap(), None);
    }

    #[test]
    fn match_round_trips() {
        let token = DeltaToken::Match { block_index: 7 };
        let mut buf = Vec::new();
        encode_token(&mut buf, &token).unwrap();

        let mut cursor = Cursor::new(buf);
        assert_eq!(decode_token(&mut cursor).unwrap(), Some(token));
    }

    #[test]
    fn match_zero_encodes_as_minus_one() {
        let mut buf = Vec::new();
        encode_token(&mut buf, &DeltaToken::Match { block_index: 0 }).unwrap();
        assert_eq!(i32::from_le_bytes(buf.try_into().unwrap()), -1);
    }

    #[test]
    fn empty_literal_encodes_to_nothing() {
        let mut buf = Vec::new();
        encode_token(&mut buf, &DeltaToken::Literal(Vec::new())).unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn stream_of_tokens_round_trips_in_order() {
        let tokens = vec![
            DeltaToken::Literal(b"abc".to_vec()),
            DeltaToken::Match { block_index: 3 },
            DeltaToken::Literal(b"xyz".to_vec()),
        ];
        let mut buf = Vec::new();
        for token in &tokens {
            encode_token(&mut buf, token).unwrap();
        }
        encode_end(&mut buf);

        let mut cursor = Cursor::new(buf);
        let mut decoded = Vec::new();
        while let Some(token) = decode_token(&mut cursor).unwrap() {
            decoded.push(token);
        }
        assert_eq!(decoded, tokens);
    }

    #[test]
    fn truncated_literal_is_an_io_error() {
        let mut buf = Vec::new();
        encode_token(&mut buf, &DeltaToken::Literal(b"hello".to_vec())).unwrap();
        buf.truncate(buf.len() - 2);

        let mut cursor = Cursor::new(buf);
        assert!(matches!(decode_token(&mut cursor), Err(DeltaCodecError::Io(_))));
    }
}
