//! The data-model node shared by the walker, the codec and the file list:
//! one file, directory, symlink, device or special node.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const S_IFMT: u32 = 0o170_000;
const S_IFREG: u32 = 0o100_000;
const S_IFDIR: u32 = 0o040_000;
const S_IFLNK: u32 = 0o120_000;
const S_IFBLK: u32 = 0o060_000;
const S_IFCHR: u32 = 0o020_000;

/// What kind of filesystem node a [`FileEntry`] describes, derived from its
/// POSIX mode bits.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FileKind {
    /// A regular file.
    Regular,
    /// A directory.
    Directory,
    /// A symbolic link.
    Symlink,
    /// A block or character device.
    Device,
    /// A FIFO, socket, or other node that carries no transferable content.
    Special,
}

impl FileKind {
    /// Derives the kind from raw POSIX mode bits.
    #[must_use]
    pub const fn from_mode(mode: u32) -> Self {
        match mode & S_IFMT {
            S_IFREG => FileKind::Regular,
            S_IFDIR => FileKind::Directory,
            S_IFLNK => FileKind::Symlink,
            S_IFBLK | S_IFCHR => FileKind::Device,
            _ => FileKind::Special,
        }
    }
}

/// Owner or group identity: a numeric id plus an optional resolved name.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Identity {
    id: u32,
    name: Option<Vec<u8>>,
}

impl Identity {
    /// Builds an identity from a numeric id, optionally with a resolved name.
    #[must_use]
    pub fn new(id: u32, name: Option<Vec<u8>>) -> Self {
        Self { id, name }
    }

    /// The numeric id.
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// The resolved name, if one was recorded.
    #[must_use]
    pub fn name(&self) -> Option<&[u8]> {
        self.name.as_deref()
    }
}

/// One node of a file list: a path plus the attributes the wire protocol
/// negotiates preserving.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FileEntry {
    path: Box<[u8]>,
    mode: u32,
    size: u64,
    mtime: i64,
    uid: Option<Identity>,
    gid: Option<Identity>,
    link_target: Option<Vec<u8>>,
    device: Option<(u32, u32)>,
}

impl FileEntry {
    /// Builds a new entry. `path` must already be sorted relative to its
    /// siblings by the caller; `FileEntry` itself does not enforce ordering.
    #[must_use]
    pub fn new(path: impl Into<Box<[u8]>>, mode: u32, size: u64, mtime: i64) -> Self {
        Self {
            path: path.into(),
            mode,
            size,
            mtime,
            uid: None,
            gid: None,
            link_target: None,
            device: None,
        }
    }

    /// Sets the owner identity.
    #[must_use]
    pub fn with_uid(mut self, uid: Identity) -> Self {
        self.uid = Some(uid);
        self
    }

    /// Sets the group identity.
    #[must_use]
    pub fn with_gid(mut self, gid: Identity) -> Self {
        self.gid = Some(gid);
        self
    }

    /// Sets the symlink target; meaningful only when [`Self::kind`] is
    /// [`FileKind::Symlink`].
    #[must_use]
    pub fn with_link_target(mut self, target: Vec<u8>) -> Self {
        self.link_target = Some(target);
        self
    }

    /// Sets the device major/minor numbers; meaningful only when
    /// [`Self::kind`] is [`FileKind::Device`].
    #[must_use]
    pub fn with_device(mut self, major: u32, minor: u32) -> Self {
        self.device = Some((major, minor));
        self
    }

    /// The path, in the session's transfer charset, `/`-separated.
    #[must_use]
    pub fn path(&self) -> &[u8] {
        &self.path
    }

    /// POSIX-style type and permission bits.
    #[must_use]
    pub const fn mode(&self) -> u32 {
        self.mode
    }

    /// The kind of node this entry describes, derived from [`Self::mode`].
    #[must_use]
    pub const fn kind(&self) -> FileKind {
        FileKind::from_mode(self.mode)
    }

    /// Size in bytes. Meaningless for directories and devices.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Last-modified time, in seconds since the epoch.
    #[must_use]
    pub const fn mtime(&self) -> i64 {
        self.mtime
    }

    /// The owner identity, if preserved.
    #[must_use]
    pub fn uid(&self) -> Option<&Identity> {
        self.uid.as_ref()
    }

    /// The group identity, if preserved.
    #[must_use]
    pub fn gid(&self) -> Option<&Identity> {
        self.gid.as_ref()
    }

    /// The symlink target, for [`FileKind::Symlink`] entries.
    #[must_use]
    pub fn link_target(&self) -> Option<&[u8]> {
        self.link_target.as_deref()
    }

    /// The device major/minor numbers, for [`FileKind::Device`] entries.
    #[must_use]
    pub const fn device(&self) -> Option<(u32, u32)> {
        self.device
    }
}
