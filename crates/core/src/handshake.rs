//! The version/checksum-seed handshake (§6 steps 1-2), run before
//! [`crate::session::run_local_sync`] or an equivalent session call.
//!
//! Module selection, option negotiation and authentication (§6 steps 3-5)
//! are an external collaborator's concern (the daemon protocol greeting);
//! this only covers the two steps every transport needs regardless of
//! whether it talks to a daemon or a bare remote shell.

use std::io::{Read, Write};

use protocol::{negotiate_version, recv_checksum_seed, send_checksum_seed};

use crate::error::Error;

/// Which side of the handshake this process plays: the side that owns the
/// checksum seed (traditionally the server/daemon) or the side that
/// receives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Generates and sends the checksum seed.
    SeedSource,
    /// Receives the checksum seed from the peer.
    SeedSink,
}

/// Runs the version exchange followed by the checksum-seed exchange,
/// returning the negotiated protocol version and the session's checksum
/// seed.
///
/// `seed` is only sent when `role` is [`Role::SeedSource`]; callers playing
/// [`Role::SeedSink`] may pass any value, it is discarded in favour of
/// whatever the peer sends.
///
/// # Errors
///
/// Returns [`Error::Negotiation`] if the peer's protocol version is
/// unsupported, or [`Error::Transport`] if the handshake bytes cannot be
/// exchanged.
pub fn perform<S: Read + Write>(stream: &mut S, role: Role, seed: [u8; 4]) -> Result<(u32, [u8; 4]), Error> {
    let version = negotiate_version(stream)?;
    let seed = match role {
        Role::SeedSource => {
            send_checksum_seed(stream, seed)?;
            seed
        }
        Role::SeedSink => recv_checksum_seed(stream)?,
    };
    Ok((version, seed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct LoopbackPeer {
        outgoing: Cursor<Vec<u8>>,
        incoming: Cursor<Vec<u8>>,
    }

    impl Read for LoopbackPeer {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.incoming.read(buf)
        }
    }

    impl Write for LoopbackPeer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.outgoing.write(buf)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn peer_sending(bytes: Vec<u8>) -> LoopbackPeer {
        LoopbackPeer {
            outgoing: Cursor::new(Vec::new()),
            incoming: Cursor::new(bytes),
        }
    }

    #[test]
    fn seed_source_sends_its_own_seed() {
        let mut incoming = protocol::PROTOCOL_VERSION.to_le_bytes().to_vec();
        let mut peer = peer_sending(incoming.split_off(0));
        let (version, seed) = perform(&mut peer, Role::SeedSource, [9, 9, 9, 9]).unwrap();
        assert_eq!(version, protocol::PROTOCOL_VERSION);
        assert_eq!(seed, [9, 9, 9, 9]);
        assert_eq!(&peer.outgoing.into_inner()[4..8], &[9, 9, 9, 9]);
    }

    #[test]
    fn seed_sink_reads_the_peers_seed() {
        let mut incoming = protocol::PROTOCOL_VERSION.to_le_bytes().to_vec();
        incoming.extend_from_slice(&[1, 2, 3, 4]);
        let mut peer = peer_sending(incoming);
        let (_, seed) = perform(&mut peer, Role::SeedSink, [0; 4]).unwrap();
        assert_eq!(seed, [1, 2, 3, 4]);
    }
}
