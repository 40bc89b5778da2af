//! Wire encoding for file list entries: a flags byte, a name diffed against
//! the previous entry, and attribute fields each independently elided when
//! unchanged from the previous entry.

use std::io::{self, Read, Write};

use crate::entry::{FileEntry, FileKind, Identity};

const FLAG_SAME_NAME: u8 = 1 << 0;
const FLAG_NAME_LEN_IS_SHORT: u8 = 1 << 1;
const FLAG_MODE_SAME: u8 = 1 << 2;
const FLAG_RDEV_SAME: u8 = 1 << 3;
const FLAG_UID_SAME: u8 = 1 << 4;
const FLAG_GID_SAME: u8 = 1 << 5;
const FLAG_MTIME_SAME: u8 = 1 << 6;
const FLAG_EXTENDED: u8 = 1 << 7;

const FLAG2_HAS_XNAME: u8 = 1 << 0;
const FLAG2_TOP_DIR: u8 = 1 << 1;

/// The flags byte upstream forces when every other bit would naturally be
/// zero, to keep a real entry's flags byte distinguishable from the `0x00`
/// list terminator.
const FORCE_NONZERO_FLAG: u8 = FLAG2_TOP_DIR;

/// Error produced while encoding or decoding a file list entry.
#[derive(Debug, thiserror::Error)]
pub enum FileListCodecError {
    /// The underlying reader or writer failed.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// A name or symlink target exceeded what the wire format can carry.
    #[error("field of {len} bytes exceeds the wire format's maximum")]
    FieldTooLong {
        /// The offending field's length in bytes.
        len: usize,
    },
}

/// Streaming encoder/decoder for the file-list wire format.
///
/// Each successive entry is diffed against the one before it within the
/// same codec instance; encoder and decoder state must stay in lockstep,
/// exactly as with the index codec.
#[derive(Debug, Default)]
pub struct FileListCodec {
    previous: Option<FileEntry>,
}

impl FileListCodec {
    /// Creates a codec with no prior entry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes `entry` and appends the result to `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`FileListCodecError::FieldTooLong`] if the path or symlink
    /// target cannot be represented in the wire format.
    pub fn encode_entry(&mut self, buf: &mut Vec<u8>, entry: &FileEntry) -> Result<(), FileListCodecError> {
        let prev = self.previous.as_ref();

        let common_prefix = prev.map_or(0, |p| common_prefix_len(p.path(), entry.path())).min(255);
        let suffix = &entry.path()[common_prefix..];

        let mode_same = prev.is_some_and(|p| p.mode() == entry.mode());
        let uid_same = prev.is_some_and(|p| same_identity(p.uid(), entry.uid()));
        let gid_same = prev.is_some_and(|p| same_identity(p.gid(), entry.gid()));
        let mtime_same = prev.is_some_and(|p| p.mtime() == entry.mtime());
        let rdev_same = prev.is_some_and(|p| p.device() == entry.device());
        let name_len_is_short = suffix.len() < 256;
        let has_xname = entry.uid().is_some_and(|u| u.name().is_some())
            || entry.gid().is_some_and(|g| g.name().is_some());
        let top_dir = entry.kind() == FileKind::Directory;

        let mut flags1 = 0u8;
        if common_prefix > 0 {
            flags1 |= FLAG_SAME_NAME;
        }
        if name_len_is_short {
            flags1 |= FLAG_NAME_LEN_IS_SHORT;
        }
        if mode_same {
            flags1 |= FLAG_MODE_SAME;
        }
        if rdev_same {
            flags1 |= FLAG_RDEV_SAME;
        }
        if uid_same {
            flags1 |= FLAG_UID_SAME;
        }
        if gid_same {
            flags1 |= FLAG_GID_SAME;
        }
        if mtime_same {
            flags1 |= FLAG_MTIME_SAME;
        }

        let mut flags2 = 0u8;
        if has_xname {
            flags2 |= FLAG2_HAS_XNAME;
        }
        if top_dir {
            flags2 |= FLAG2_TOP_DIR;
        }

        if flags1 == 0 && flags2 == 0 {
            flags2 = FORCE_NONZERO_FLAG;
        }
        if flags2 != 0 {
            flags1 |= FLAG_EXTENDED;
        }

        buf.push(flags1);
        if flags1 & FLAG_EXTENDED != 0 {
            buf.push(flags2);
        }

        if common_prefix > 0 {
            buf.push(common_prefix as u8);
        }
        if name_len_is_short {
            buf.push(u8::try_from(suffix.len()).expect("checked by name_len_is_short"));
        } else {
            write_u32(buf, u32::try_from(suffix.len()).map_err(|_| FileListCodecError::FieldTooLong {
                len: suffix.len(),
            })?);
        }
        buf.extend_from_slice(suffix);

        write_size(buf, entry.size());

        if !mtime_same {
            write_i64(buf, entry.mtime());
        }
        if !mode_same {
            write_u32(buf, entry.mode());
        }

        if !uid_same {
            write_u32(buf, entry.uid().map_or(0, Identity::id));
        }
        if !gid_same {
            write_u32(buf, entry.gid().map_or(0, Identity::id));
        }
        if has_xname {
            write_identity_name(buf, entry.uid());
            write_identity_name(buf, entry.gid());
        }

        if entry.kind() == FileKind::Device && !rdev_same {
            let (major, minor) = entry.device().unwrap_or((0, 0));
            write_u32(buf, major);
            write_u32(buf, minor);
        }

        if entry.kind() == FileKind::Symlink {
            let target = entry.link_target().unwrap_or(&[]);
            write_u32(
                buf,
                u32::try_from(target.len()).map_err(|_| FileListCodecError::FieldTooLong { len: target.len() })?,
            );
            buf.extend_from_slice(target);
        }

        self.previous = Some(entry.clone());
        Ok(())
    }

    /// Writes the file-list terminator: a flags byte of `0x00`.
    pub fn encode_terminator(&mut self, buf: &mut Vec<u8>) {
        buf.push(0x00);
    }

    /// Decodes the next entry from `reader`, or `None` if the terminator was
    /// read.
    ///
    /// # Errors
    ///
    /// Returns [`FileListCodecError::Io`] on a malformed or truncated
    /// stream.
    pub fn decode_entry<R: Read>(&mut self, reader: &mut R) -> Result<Option<FileEntry>, FileListCodecError> {
        let flags1 = read_u8(reader)?;
        if flags1 == 0x00 {
            return Ok(None);
        }

        let flags2 = if flags1 & FLAG_EXTENDED != 0 {
            read_u8(reader)?
        } else {
            0
        };

        let common_prefix = if flags1 & FLAG_SAME_NAME != 0 {
            read_u8(reader)? as usize
        } else {
            0
        };

        let suffix_len = if flags1 & FLAG_NAME_LEN_IS_SHORT != 0 {
            read_u8(reader)? as usize
        } else {
            read_u32(reader)? as usize
        };
        let mut suffix = vec![0u8; suffix_len];
        reader.read_exact(&mut suffix)?;

        let mut path = self
            .previous
            .as_ref()
            .map(|p| p.path()[..common_prefix].to_vec())
            .unwrap_or_default();
        path.extend_from_slice(&suffix);

        let size = read_size(reader)?;

        let mtime = if flags1 & FLAG_MTIME_SAME != 0 {
            self.previous.as_ref().map_or(0, FileEntry::mtime)
        } else {
            read_i64(reader)?
        };

        let mode = if flags1 & FLAG_MODE_SAME != 0 {
            self.previous.as_ref().map_or(0, FileEntry::mode)
        } else {
            read_u32(reader)?
        };

        let uid = if flags1 & FLAG_UID_SAME != 0 {
            self.previous.as_ref().and_then(FileEntry::uid).cloned()
        } else {
            Some(Identity::new(read_u32(reader)?, None))
        };
        let gid = if flags1 & FLAG_GID_SAME != 0 {
            self.previous.as_ref().and_then(FileEntry::gid).cloned()
        } else {
            Some(Identity::new(read_u32(reader)?, None))
        };

        let (uid, gid) = if flags2 & FLAG2_HAS_XNAME != 0 {
            (
                read_identity_name(reader, uid)?,
                read_identity_name(reader, gid)?,
            )
        } else {
            (uid, gid)
        };

        let mut entry = FileEntry::new(path, mode, size, mtime);
        if let Some(uid) = uid {
            entry = entry.with_uid(uid);
        }
        if let Some(gid) = gid {
            entry = entry.with_gid(gid);
        }

        if FileKind::from_mode(mode) == FileKind::Device {
            let (major, minor) = if flags1 & FLAG_RDEV_SAME != 0 {
                self.previous.as_ref().and_then(FileEntry::device).unwrap_or((0, 0))
            } else {
                (read_u32(reader)?, read_u32(reader)?)
            };
            entry = entry.with_device(major, minor);
        }

        if FileKind::from_mode(mode) == FileKind::Symlink {
            let target_len = read_u32(reader)? as usize;
            let mut target = vec![0u8; target_len];
            reader.read_exact(&mut target)?;
            entry = entry.with_link_target(target);
        }

        self.previous = Some(entry.clone());
        Ok(Some(entry))
    }
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

fn same_identity(a: Option<&Identity>, b: Option<&Identity>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.id() == b.id(),
        (None, None) => true,
        _ => false,
    }
}

fn write_identity_name(buf: &mut Vec<u8>, identity: Option<&Identity>) {
    let name = identity.and_then(Identity::name).unwrap_or(&[]);
    buf.push(u8::try_from(name.len().min(255)).unwrap_or(255));
    buf.extend_from_slice(&name[..name.len().min(255)]);
}

fn read_identity_name<R: Read>(reader: &mut R, base: Option<Identity>) -> Result<Option<Identity>, FileListCodecError> {
    let name_len = read_u8(reader)? as usize;
    let mut name = vec![0u8; name_len];
    reader.read_exact(&mut name)?;
    Ok(base.map(|identity| {
        if name.is_empty() {
            identity
        } else {
            Identity::new(identity.id(), Some(name))
        }
    }))
}

/// Encodes a 64-bit size as 1, 5, or 9 bytes: values up to 253 fit a single
/// byte; `0xFE` prefixes a 4-byte little-endian value; `0xFF` prefixes an
/// 8-byte little-endian value.
fn write_size(buf: &mut Vec<u8>, value: u64) {
    if value < 0xFE {
        buf.push(value as u8);
    } else if value <= u64::from(u32::MAX) {
        buf.push(0xFE);
        buf.extend_from_slice(&(value as u32).to_le_bytes());
    } else {
        buf.push(0xFF);
        buf.extend_from_slice(&value.to_le_bytes());
    }
}

fn read_size<R: Read>(reader: &mut R) -> io::Result<u64> {
    let lead = read_u8(reader)?;
    match lead {
        0xFF => {
            let mut bytes = [0u8; 8];
            reader.read_exact(&mut bytes)?;
            Ok(u64::from_le_bytes(bytes))
        }
        0xFE => {
            let mut bytes = [0u8; 4];
            reader.read_exact(&mut bytes)?;
            Ok(u64::from(u32::from_le_bytes(bytes)))
        }
        _ => Ok(u64::from(lead)),
    }
}

fn write_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

fn write_i64(buf: &mut Vec<u8>, value: i64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn read_i64<R: Read>(reader: &mut R) -> io::Result<i64> {
    let mut bytes = [0u8; 8];
    reader.read_exact(&mut bytes)?;
    Ok(i64::from_le_bytes(bytes))
}

fn read_u8<R: Read>(reader: &mut R) -> io::Result<u8> {
    let mut byte = [0u8; 1];
    reader.read_exact(&mut byte)?;
    Ok(byte[0])
}

/// Writes the cumulative I/O error count that follows a file list.
pub fn write_io_error_count<W: Write>(writer: &mut W, count: i32) -> io::Result<()> {
    writer.write_all(&count.to_le_bytes())
}

/// Reads the cumulative I/O error count that follows a file list.
pub fn read_io_error_count<R: Read>(reader: &mut R) -> io::Result<i32> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;
    Ok(i32::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn file(path: &str, mode: u32, size: u64, mtime: i64) -> FileEntry {
        FileEntry::new(path.as_bytes().to_vec(), mode, size, mtime)
    }

    fn round_trip(entries: &[FileEntry]) -> Vec<FileEntry> {
        let mut encoder = FileListCodec::new();
        let mut buf = Vec::new();
        for entry in entries {
            encoder.encode_entry(&mut buf, entry).unwrap();
        }
        encoder.encode_terminator(&mut buf);

        let mut decoder = FileListCodec::new();
        let mut cursor = Cursor::new(buf);
        let mut decoded = Vec::new();
        while let Some(entry) = decoder.decode_entry(&mut cursor).unwrap() {
            decoded.push(entry);
        }
        decoded
    }

    #[test]
    fn round_trips_a_single_regular_file() {
        let entry = file("a.txt", 0o100_644, 123, 1_700_000_000);
        let decoded = round_trip(&[entry.clone()]);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].path(), entry.path());
        assert_eq!(decoded[0].size(), entry.size());
        assert_eq!(decoded[0].mtime(), entry.mtime());
        assert_eq!(decoded[0].mode(), entry.mode());
    }

    #[test]
    fn shared_prefix_is_diffed_against_previous_name() {
        let entries = vec![
            file("dir/alpha.txt", 0o100_644, 1, 10),
            file("dir/alphabet.txt", 0o100_644, 2, 10),
        ];
        let decoded = round_trip(&entries);
        assert_eq!(decoded[1].path(), b"dir/alphabet.txt");
    }

    #[test]
    fn unchanged_mode_and_mtime_are_not_retransmitted_but_still_decode() {
        let entries = vec![
            file("a.txt", 0o100_644, 10, 1_700_000_000),
            file("b.txt", 0o100_644, 20, 1_700_000_000),
        ];
        let decoded = round_trip(&entries);
        assert_eq!(decoded[1].mode(), 0o100_644);
        assert_eq!(decoded[1].mtime(), 1_700_000_000);
    }

    #[test]
    fn symlink_target_round_trips() {
        let entry = file("link", 0o120_777, 0, 0).with_link_target(b"/etc/hosts".to_vec());
        let decoded = round_trip(&[entry]);
        assert_eq!(decoded[0].link_target(), Some(&b"/etc/hosts"[..]));
    }

    #[test]
    fn device_major_minor_round_trips() {
        let entry = file("dev0", 0o020_000, 0, 0).with_device(8, 1);
        let decoded = round_trip(&[entry]);
        assert_eq!(decoded[0].device(), Some((8, 1)));
    }

    #[test]
    fn large_file_size_uses_extended_encoding() {
        let entry = file("huge.bin", 0o100_644, 1 << 40, 0);
        let decoded = round_trip(&[entry.clone()]);
        assert_eq!(decoded[0].size(), entry.size());
    }

    #[test]
    fn empty_list_decodes_to_no_entries() {
        let decoded = round_trip(&[]);
        assert!(decoded.is_empty());
    }

    #[test]
    fn identity_name_is_preserved_when_present() {
        let entry = file("a.txt", 0o100_644, 1, 10).with_uid(Identity::new(1000, Some(b"alice".to_vec())));
        let decoded = round_trip(&[entry]);
        assert_eq!(decoded[0].uid().unwrap().name(), Some(&b"alice"[..]));
    }

    #[test]
    fn io_error_count_round_trips() {
        let mut buf = Vec::new();
        write_io_error_count(&mut buf, 42).unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(read_io_error_count(&mut cursor).unwrap(), 42);
    }
}
