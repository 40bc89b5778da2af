//! Version handshake and checksum-seed exchange.
//!
//! This implementation targets protocol 30 exclusively: it always offers
//! [`PROTOCOL_VERSION`] and rejects any peer that reports an older version.
//! The daemon greeting (module selection, authentication challenge) is an
//! external collaborator's concern and is not modelled here.

use std::io::{self, Read, Write};

/// The only protocol version this implementation speaks.
pub const PROTOCOL_VERSION: u32 = 30;

/// Error raised while negotiating the protocol version or checksum seed.
#[derive(Debug, thiserror::Error)]
pub enum NegotiationError {
    #[error("peer offered protocol version {0}, but only {PROTOCOL_VERSION} is supported")]
    UnsupportedVersion(u32),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Performs the binary protocol-version exchange, writing our version and
/// reading the peer's, then returns the negotiated (i.e. our fixed) version.
///
/// Both sides write a 4-byte little-endian protocol version; the negotiated
/// version is the lower of the two, but since this implementation only
/// speaks protocol 30, any peer version below 30 is a hard negotiation
/// failure rather than a silent downgrade.
pub fn negotiate_version<S: Read + Write>(stream: &mut S) -> Result<u32, NegotiationError> {
    stream.write_all(&PROTOCOL_VERSION.to_le_bytes())?;
    stream.flush()?;

    let mut peer_bytes = [0u8; 4];
    stream.read_exact(&mut peer_bytes)?;
    let peer_version = u32::from_le_bytes(peer_bytes);

    if peer_version < PROTOCOL_VERSION {
        return Err(NegotiationError::UnsupportedVersion(peer_version));
    }
    Ok(PROTOCOL_VERSION)
}

/// Writes the server-generated 4-byte checksum seed.
pub fn send_checksum_seed<W: Write>(writer: &mut W, seed: [u8; 4]) -> io::Result<()> {
    writer.write_all(&seed)?;
    writer.flush()
}

/// Reads the server-generated 4-byte checksum seed.
pub fn recv_checksum_seed<R: Read>(reader: &mut R) -> io::Result<[u8; 4]> {
    let mut seed = [0u8; 4];
    reader.read_exact(&mut seed)?;
    Ok(seed)
}
