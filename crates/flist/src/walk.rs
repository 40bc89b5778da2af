//! Filesystem traversal, producing entries in the order Sender would send
//! them.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::entry::{FileEntry, Identity};

/// How the walker selects which filesystem nodes to include, mirroring the
/// three `rsync` traversal modes this implementation supports.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum FileSelection {
    /// Include only the given roots; follow a symlink only when it was
    /// named directly as a root. No descent into directories.
    Exact,
    /// Like [`Self::Exact`], but a directory root's immediate children are
    /// included (without recursing into their subdirectories).
    TransferDirs,
    /// Full recursive walk of every root.
    #[default]
    Recurse,
}

/// Error produced while walking a directory tree.
#[derive(Debug, thiserror::Error)]
pub enum FileListError {
    /// A filesystem operation failed for the given path.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The path the failing operation was attempted against.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl FileListError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// One entry produced by a [`FileListWalker`]: a [`FileEntry`] plus the path
/// it was discovered at, relative to the walk's root.
#[derive(Debug, Clone)]
pub struct FileListEntry {
    relative_path: PathBuf,
    is_root: bool,
    entry: FileEntry,
}

impl FileListEntry {
    /// The path relative to the root the walk started from. Empty for the
    /// root entry itself.
    #[must_use]
    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }

    /// Whether this is the synthetic entry for the walk's own root.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.is_root
    }

    /// The underlying file-list data.
    #[must_use]
    pub const fn entry(&self) -> &FileEntry {
        &self.entry
    }
}

/// Configures and builds a [`FileListWalker`].
#[derive(Debug, Clone)]
pub struct FileListBuilder {
    root: PathBuf,
    include_root: bool,
    follow_symlinks: bool,
    selection: FileSelection,
}

impl FileListBuilder {
    /// Starts building a walker rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            include_root: true,
            follow_symlinks: false,
            selection: FileSelection::Recurse,
        }
    }

    /// Whether to emit a synthetic entry for the root itself. Defaults to
    /// `true`.
    #[must_use]
    pub const fn include_root(mut self, include_root: bool) -> Self {
        self.include_root = include_root;
        self
    }

    /// Whether a symlink root should be followed rather than recorded as a
    /// symlink entry. Defaults to `false`. Non-root symlinks encountered
    /// during a [`FileSelection::Recurse`] walk are never followed,
    /// regardless of this setting, matching upstream's default `-l`
    /// behaviour.
    #[must_use]
    pub const fn follow_symlinks(mut self, follow_symlinks: bool) -> Self {
        self.follow_symlinks = follow_symlinks;
        self
    }

    /// Sets the traversal mode. Defaults to [`FileSelection::Recurse`].
    #[must_use]
    pub const fn selection(mut self, selection: FileSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Builds the walker, performing the initial `stat` of the root.
    ///
    /// # Errors
    ///
    /// Returns [`FileListError::Io`] if the root cannot be inspected.
    pub fn build(self) -> Result<FileListWalker, FileListError> {
        let metadata = root_metadata(&self.root, self.follow_symlinks)?;
        let root_entry = to_file_entry(&self.root, &metadata);

        let mut pending = Vec::new();
        if self.include_root {
            pending.push(FileListEntry {
                relative_path: PathBuf::new(),
                is_root: true,
                entry: root_entry.clone(),
            });
        }

        if metadata.is_dir() {
            match self.selection {
                FileSelection::Exact => {}
                FileSelection::TransferDirs => {
                    let mut children = read_children(&self.root)?;
                    children.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
                    pending.extend(children);
                }
                FileSelection::Recurse => {
                    let mut children = read_children(&self.root)?;
                    children.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
                    // Reversed: the walker is a stack, so pushing in
                    // reverse sorted order pops them back out in order.
                    for child in children.into_iter().rev() {
                        pending.push(child);
                    }
                }
            }
        }

        Ok(FileListWalker {
            root: self.root,
            selection: self.selection,
            stack: pending,
        })
    }
}

fn root_metadata(root: &Path, follow_symlinks: bool) -> Result<fs::Metadata, FileListError> {
    let metadata = if follow_symlinks {
        fs::metadata(root)
    } else {
        fs::symlink_metadata(root)
    };
    metadata.map_err(|source| FileListError::io(root, source))
}

fn read_children(dir: &Path) -> Result<Vec<FileListEntry>, FileListError> {
    let read_dir = fs::read_dir(dir).map_err(|source| FileListError::io(dir, source))?;
    let mut children = Vec::new();

    for item in read_dir {
        let item = item.map_err(|source| FileListError::io(dir, source))?;
        let path = item.path();
        let metadata = fs::symlink_metadata(&path).map_err(|source| FileListError::io(&path, source))?;
        children.push(FileListEntry {
            relative_path: PathBuf::from(item.file_name()),
            is_root: false,
            entry: to_file_entry(&path, &metadata),
        });
    }

    Ok(children)
}

#[cfg(unix)]
fn to_file_entry(path: &Path, metadata: &fs::Metadata) -> FileEntry {
    use std::os::unix::fs::MetadataExt;

    let mtime = metadata.mtime();
    let mut entry = FileEntry::new(
        path.as_os_str().as_encoded_bytes().to_vec(),
        metadata.mode(),
        metadata.size(),
        mtime,
    )
    .with_uid(Identity::new(metadata.uid(), None))
    .with_gid(Identity::new(metadata.gid(), None));

    if metadata.file_type().is_symlink() {
        if let Ok(target) = fs::read_link(path) {
            entry = entry.with_link_target(target.as_os_str().as_encoded_bytes().to_vec());
        }
    }

    entry
}

#[cfg(not(unix))]
fn to_file_entry(path: &Path, metadata: &fs::Metadata) -> FileEntry {
    let mode = if metadata.is_dir() {
        0o040_000 | 0o755
    } else {
        0o100_000 | 0o644
    };
    let mtime = metadata
        .modified()
        .ok()
        .and_then(|m| m.duration_since(std::time::UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_secs() as i64);

    FileEntry::new(
        path.as_os_str().to_string_lossy().into_owned().into_bytes(),
        mode,
        metadata.len(),
        mtime,
    )
}

/// Iterator over the entries discovered by a [`FileListBuilder`].
///
/// Walks depth-first in sorted order; each directory's contents are read
/// lazily as the walker descends into it (for [`FileSelection::Recurse`]).
pub struct FileListWalker {
    root: PathBuf,
    selection: FileSelection,
    stack: Vec<FileListEntry>,
}

impl Iterator for FileListWalker {
    type Item = Result<FileListEntry, FileListError>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;

        if self.selection == FileSelection::Recurse
            && !current.is_root
            && current.entry.kind() == crate::entry::FileKind::Directory
        {
            let absolute = self.root.join(&current.relative_path);
            match read_children(&absolute) {
                Ok(mut children) => {
                    children.sort_by(|a, b| b.relative_path.cmp(&a.relative_path));
                    for mut child in children {
                        child.relative_path = current.relative_path.join(&child.relative_path);
                        self.stack.push(child);
                    }
                }
                Err(err) => return Some(Err(err)),
            }
        }

        Some(Ok(current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn empty_directory_yields_root_only() {
        let temp = tempfile::tempdir().unwrap();
        let walker = FileListBuilder::new(temp.path()).build().unwrap();
        let entries: Vec<_> = walker.map(Result::unwrap).collect();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_root());
    }

    #[test]
    fn include_root_false_yields_only_children() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("a.txt"), b"x").unwrap();
        let walker = FileListBuilder::new(temp.path())
            .include_root(false)
            .build()
            .unwrap();
        let entries: Vec<_> = walker.map(Result::unwrap).collect();
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].is_root());
        assert_eq!(entries[0].relative_path(), Path::new("a.txt"));
    }

    #[test]
    fn recurse_mode_descends_into_subdirectories() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        fs::write(temp.path().join("sub/inner.txt"), b"x").unwrap();

        let walker = FileListBuilder::new(temp.path())
            .include_root(false)
            .selection(FileSelection::Recurse)
            .build()
            .unwrap();
        let paths: Vec<_> = walker.map(|e| e.unwrap().relative_path().to_path_buf()).collect();
        assert!(paths.contains(&PathBuf::from("sub")));
        assert!(paths.contains(&PathBuf::from("sub/inner.txt")));
    }

    #[test]
    fn exact_mode_does_not_descend() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();

        let walker = FileListBuilder::new(temp.path())
            .include_root(false)
            .selection(FileSelection::Exact)
            .build()
            .unwrap();
        let entries: Vec<_> = walker.map(Result::unwrap).collect();
        assert!(entries.is_empty());
    }

    #[test]
    fn transfer_dirs_mode_lists_children_without_recursing() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        fs::write(temp.path().join("sub/inner.txt"), b"x").unwrap();

        let walker = FileListBuilder::new(temp.path())
            .include_root(false)
            .selection(FileSelection::TransferDirs)
            .build()
            .unwrap();
        let paths: Vec<_> = walker.map(|e| e.unwrap().relative_path().to_path_buf()).collect();
        assert_eq!(paths, vec![PathBuf::from("sub")]);
    }

    #[test]
    fn nonexistent_root_is_an_error() {
        let err = FileListBuilder::new("/does/not/exist/at/all").build().unwrap_err();
        assert!(matches!(err, FileListError::Io { .. }));
    }
}
