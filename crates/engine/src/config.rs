//! Agreed session parameters and the builder that validates them.

use std::path::PathBuf;

use flist::FileSelection;

/// What a `--delete`-style sweep should do with extraneous destination
/// entries once a directory's segment has been fully received.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum DeletePolicy {
    /// Never remove anything from the destination.
    #[default]
    Disabled,
    /// Remove extraneous entries as each directory segment completes.
    Enabled,
}

/// Which file attributes the session preserves from source to destination.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub struct PreservationFlags {
    /// Preserve symlinks as symlinks rather than following them.
    pub links: bool,
    /// Preserve permission bits.
    pub perms: bool,
    /// Preserve modification times.
    pub times: bool,
    /// Preserve the owning user.
    pub owner: bool,
    /// Preserve the owning group.
    pub group: bool,
    /// Preserve device nodes.
    pub devices: bool,
    /// Preserve FIFOs, sockets and other special nodes.
    pub specials: bool,
    /// Transmit owner/group as numeric ids only, never resolved names.
    pub numeric_ids: bool,
}

/// Error returned when a [`SessionConfigBuilder`] cannot produce a valid
/// [`SessionConfig`].
#[derive(Debug, thiserror::Error, Eq, PartialEq)]
pub enum ConfigError {
    /// `numeric_ids` was set without preserving an owner or a group, so
    /// there is nothing for it to affect.
    #[error("numeric_ids requires preserving owner or group")]
    NumericIdsWithoutOwnership,
    /// A delete policy was enabled under a selection mode that never visits
    /// a directory's full contents, so a deletion sweep cannot be sound.
    #[error("delete policy requires FileSelection::Recurse")]
    DeleteRequiresRecurse,
    /// The receiver destination path was empty.
    #[error("destination path must not be empty")]
    EmptyDestination,
}

/// Agreed parameters for one rsync session, negotiated during the
/// handshake and fixed for its duration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    protocol_version: u32,
    checksum_seed: [u8; 4],
    charset: String,
    selection: FileSelection,
    preservation: PreservationFlags,
    delete_policy: DeletePolicy,
    ignore_times: bool,
    always_itemize: bool,
    safe_file_list: bool,
    destination: PathBuf,
}

impl SessionConfig {
    /// Starts a [`SessionConfigBuilder`] for the given checksum seed and
    /// destination path — the two values every session needs regardless of
    /// which optional flags are set.
    #[must_use]
    pub fn builder(checksum_seed: [u8; 4], destination: PathBuf) -> SessionConfigBuilder {
        SessionConfigBuilder::new(checksum_seed, destination)
    }

    /// The negotiated protocol version (always 30 for this implementation).
    #[must_use]
    pub const fn protocol_version(&self) -> u32 {
        self.protocol_version
    }

    /// The 4-byte seed mixed into every strong digest this session computes.
    #[must_use]
    pub const fn checksum_seed(&self) -> [u8; 4] {
        self.checksum_seed
    }

    /// The session's transfer charset, e.g. `"UTF-8"`.
    #[must_use]
    pub fn charset(&self) -> &str {
        &self.charset
    }

    /// How the sender selects which filesystem nodes to include.
    #[must_use]
    pub const fn selection(&self) -> FileSelection {
        self.selection
    }

    /// Which attributes are preserved across the transfer.
    #[must_use]
    pub const fn preservation(&self) -> PreservationFlags {
        self.preservation
    }

    /// Whether extraneous destination entries are removed.
    #[must_use]
    pub const fn delete_policy(&self) -> DeletePolicy {
        self.delete_policy
    }

    /// Whether a file is re-transferred even when size and mtime match.
    #[must_use]
    pub const fn ignore_times(&self) -> bool {
        self.ignore_times
    }

    /// Whether every file is itemized, even ones requiring no transfer.
    #[must_use]
    pub const fn always_itemize(&self) -> bool {
        self.always_itemize
    }

    /// Whether the receiver defers applying the file list until it has been
    /// fully validated.
    #[must_use]
    pub const fn safe_file_list(&self) -> bool {
        self.safe_file_list
    }

    /// The receiver's destination root.
    #[must_use]
    pub fn destination(&self) -> &std::path::Path {
        &self.destination
    }
}

/// Builds a [`SessionConfig`], validating cross-field invariants at
/// construction time rather than letting an inconsistent config panic deep
/// inside a transfer.
#[derive(Debug, Clone)]
pub struct SessionConfigBuilder {
    protocol_version: u32,
    checksum_seed: [u8; 4],
    charset: String,
    selection: FileSelection,
    preservation: PreservationFlags,
    delete_policy: DeletePolicy,
    ignore_times: bool,
    always_itemize: bool,
    safe_file_list: bool,
    destination: PathBuf,
}

impl SessionConfigBuilder {
    /// Starts a builder with protocol 30, an empty charset defaulting to
    /// `UTF-8`, and every optional flag off.
    #[must_use]
    pub fn new(checksum_seed: [u8; 4], destination: PathBuf) -> Self {
        Self {
            protocol_version: protocol::PROTOCOL_VERSION,
            checksum_seed,
            charset: String::from("UTF-8"),
            selection: FileSelection::default(),
            preservation: PreservationFlags::default(),
            delete_policy: DeletePolicy::default(),
            ignore_times: false,
            always_itemize: false,
            safe_file_list: false,
            destination,
        }
    }

    /// Sets the transfer charset.
    #[must_use]
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    /// Sets the file-selection mode.
    #[must_use]
    pub const fn selection(mut self, selection: FileSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Sets which attributes to preserve.
    #[must_use]
    pub const fn preservation(mut self, preservation: PreservationFlags) -> Self {
        self.preservation = preservation;
        self
    }

    /// Sets the delete policy.
    #[must_use]
    pub const fn delete_policy(mut self, delete_policy: DeletePolicy) -> Self {
        self.delete_policy = delete_policy;
        self
    }

    /// Sets whether unchanged size/mtime still forces a re-transfer.
    #[must_use]
    pub const fn ignore_times(mut self, ignore_times: bool) -> Self {
        self.ignore_times = ignore_times;
        self
    }

    /// Sets whether every file is itemized, even ones requiring no transfer.
    #[must_use]
    pub const fn always_itemize(mut self, always_itemize: bool) -> Self {
        self.always_itemize = always_itemize;
        self
    }

    /// Sets whether the receiver defers applying the file list.
    #[must_use]
    pub const fn safe_file_list(mut self, safe_file_list: bool) -> Self {
        self.safe_file_list = safe_file_list;
        self
    }

    /// Validates cross-field invariants and builds the final
    /// [`SessionConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the destination is empty, if
    /// `numeric_ids` is set without preserving an owner or group, or if a
    /// delete policy is enabled under a non-recursive selection mode.
    pub fn build(self) -> Result<SessionConfig, ConfigError> {
        if self.destination.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDestination);
        }
        if self.preservation.numeric_ids && !self.preservation.owner && !self.preservation.group {
            return Err(ConfigError::NumericIdsWithoutOwnership);
        }
        if self.delete_policy == DeletePolicy::Enabled && self.selection != FileSelection::Recurse {
            return Err(ConfigError::DeleteRequiresRecurse);
        }

        Ok(SessionConfig {
            protocol_version: self.protocol_version,
            checksum_seed: self.checksum_seed,
            charset: self.charset,
            selection: self.selection,
            preservation: self.preservation,
            delete_policy: self.delete_policy,
            ignore_times: self.ignore_times,
            always_itemize: self.always_itemize,
            safe_file_list: self.safe_file_list,
            destination: self.destination,
        })
    }
}
