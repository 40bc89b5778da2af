//! The filesystem abstraction the three state machines transfer through.
//!
//! Listing a tree is `flist`'s job; `FsOps` covers everything a Receiver or
//! Generator does to one path once the file list already names it: reading
//! a basis file, writing a new one atomically, and applying the attributes
//! and node types the session negotiated to preserve. Production callers
//! implement this against `std::fs`/`rustix`; tests implement it against an
//! in-memory fake.

use std::io::{self, Read, Write};
use std::path::Path;

use flist::FileEntry;

/// Attributes a [`FsOps`] implementation applies to a path after writing its
/// content, per the session's negotiated [`crate::PreservationFlags`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FileAttributes {
    /// POSIX permission bits to set, if permissions are preserved.
    pub mode: Option<u32>,
    /// Modification time to set, in seconds since the epoch, if times are
    /// preserved.
    pub mtime: Option<i64>,
    /// Numeric owner id to set, if the owner is preserved.
    pub uid: Option<u32>,
    /// Numeric group id to set, if the group is preserved.
    pub gid: Option<u32>,
}

impl FileAttributes {
    /// Derives the attributes to apply for `entry`, honouring which of them
    /// the session preserves.
    #[must_use]
    pub fn from_entry(entry: &FileEntry, preservation: crate::PreservationFlags) -> Self {
        Self {
            mode: preservation.perms.then(|| entry.mode()),
            mtime: preservation.times.then(|| entry.mtime()),
            uid: preservation.owner.then(|| entry.uid().map(flist::Identity::id)).flatten(),
            gid: preservation.group.then(|| entry.gid().map(flist::Identity::id)).flatten(),
        }
    }
}

/// A write handle opened against a temporary path, committed to its final
/// name only once the written content has been verified.
///
/// This is how the Receiver avoids leaving a half-written file at the
/// destination path if the connection drops mid-transfer.
pub trait AtomicWrite: Write {
    /// Renames the temporary file into place at `dest`, replacing whatever
    /// is there.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the rename fails.
    fn commit(self: Box<Self>, dest: &Path) -> io::Result<()>;

    /// Discards the temporary file without installing it.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if removing the temporary file fails.
    fn discard(self: Box<Self>) -> io::Result<()>;
}

/// The filesystem operations the engine's state machines need, abstracted
/// so they can run against a real filesystem or an in-memory fake.
pub trait FsOps {
    /// The type returned by [`Self::open_read`].
    type Reader: Read;
    /// The type returned by [`Self::open_write`].
    type Writer: AtomicWrite;

    /// Opens `path` (a basis file) for reading.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the path cannot be opened.
    fn open_read(&self, path: &Path) -> io::Result<Self::Reader>;

    /// Returns `(size, mtime)` for `path` if it currently exists at the
    /// destination, `None` if it does not. Used by the Generator to decide
    /// whether a quick-check skip applies before requesting a delta.
    ///
    /// # Errors
    ///
    /// Returns an I/O error other than "not found".
    fn stat(&self, path: &Path) -> io::Result<Option<(u64, i64)>>;

    /// Opens a temporary file, in the same directory as `dest`, for writing
    /// a file that will eventually replace `dest`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the temporary file cannot be created.
    fn open_write(&self, dest: &Path) -> io::Result<Self::Writer>;

    /// Applies `attributes` to `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if any requested attribute cannot be set.
    fn set_attributes(&self, path: &Path, attributes: FileAttributes) -> io::Result<()>;

    /// Creates a symlink at `path` pointing at `target`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the symlink cannot be created.
    fn make_symlink(&self, path: &Path, target: &[u8]) -> io::Result<()>;

    /// Creates a device node at `path` with the given kind and major/minor
    /// numbers.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the node cannot be created.
    fn make_device(&self, path: &Path, kind: flist::FileKind, major: u32, minor: u32) -> io::Result<()>;

    /// Creates a directory at `path` (not recursively; parents are assumed
    /// to already exist by file-list order).
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    fn make_directory(&self, path: &Path) -> io::Result<()>;

    /// Removes the entry at `path`, recursively if it is a directory.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the removal fails.
    fn remove(&self, path: &Path) -> io::Result<()>;
}

#[cfg(test)]
pub(crate) mod fake {
    use super::{AtomicWrite, FileAttributes, FsOps};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::io::{self, Cursor, Read, Write};
    use std::path::{Path, PathBuf};
    use std::rc::Rc;

    #[derive(Default)]
    pub(crate) struct InMemoryFs {
        pub(crate) files: Rc<RefCell<HashMap<PathBuf, Vec<u8>>>>,
        pub(crate) attributes: RefCell<HashMap<PathBuf, FileAttributes>>,
        pub(crate) symlinks: RefCell<HashMap<PathBuf, Vec<u8>>>,
        pub(crate) directories: RefCell<Vec<PathBuf>>,
    }

    pub(crate) struct PendingWrite {
        buf: Vec<u8>,
        files: Rc<RefCell<HashMap<PathBuf, Vec<u8>>>>,
    }

    impl Write for PendingWrite {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.buf.write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl AtomicWrite for PendingWrite {
        fn commit(self: Box<Self>, dest: &Path) -> io::Result<()> {
            self.files.borrow_mut().insert(dest.to_path_buf(), self.buf);
            Ok(())
        }
        fn discard(self: Box<Self>) -> io::Result<()> {
            Ok(())
        }
    }

    impl FsOps for InMemoryFs {
        type Reader = Cursor<Vec<u8>>;
        type Writer = PendingWrite;

        fn open_read(&self, path: &Path) -> io::Result<Self::Reader> {
            self.files
                .borrow()
                .get(path)
                .cloned()
                .map(Cursor::new)
                .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
        }

        fn stat(&self, path: &Path) -> io::Result<Option<(u64, i64)>> {
            Ok(self.files.borrow().get(path).map(|bytes| {
                let mtime = self.attributes.borrow().get(path).and_then(|a| a.mtime).unwrap_or(0);
                (bytes.len() as u64, mtime)
            }))
        }

        fn open_write(&self, _dest: &Path) -> io::Result<Self::Writer> {
            Ok(PendingWrite {
                buf: Vec::new(),
                files: Rc::clone(&self.files),
            })
        }

        fn set_attributes(&self, path: &Path, attributes: FileAttributes) -> io::Result<()> {
            self.attributes.borrow_mut().insert(path.to_path_buf(), attributes);
            Ok(())
        }

        fn make_symlink(&self, path: &Path, target: &[u8]) -> io::Result<()> {
            self.symlinks.borrow_mut().insert(path.to_path_buf(), target.to_vec());
            Ok(())
        }

        fn make_device(&self, _path: &Path, _kind: flist::FileKind, _major: u32, _minor: u32) -> io::Result<()> {
            Ok(())
        }

        fn make_directory(&self, path: &Path) -> io::Result<()> {
            self.directories.borrow_mut().push(path.to_path_buf());
            Ok(())
        }

        fn remove(&self, path: &Path) -> io::Result<()> {
            self.files.borrow_mut().remove(path);
            Ok(())
        }
    }

    #[test]
    fn write_then_commit_is_visible_through_open_read() {
        let fs = InMemoryFs::default();
        let mut handle: Box<dyn AtomicWrite> = Box::new(fs.open_write(Path::new("a.txt")).unwrap());
        handle.write_all(b"hello").unwrap();
        handle.commit(Path::new("a.txt")).unwrap();

        let mut buf = Vec::new();
        fs.open_read(Path::new("a.txt")).unwrap().read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"hello");
    }
}
