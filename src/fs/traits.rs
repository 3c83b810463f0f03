//! Traits and types for filesystem access

use chrono::{DateTime, Utc};
use std::fs::File;
use std::io;
use std::path::Path;

/// What `lstat` reported about an existing path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    /// The path is a directory
    pub is_dir: bool,
    /// Size in bytes
    pub size: u64,
    /// Last modification time, if the platform reports one
    pub modified: Option<DateTime<Utc>>,
}

/// Timestamps to write, already filtered by the timestamp flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimesToSet {
    /// Creation time
    pub created: Option<DateTime<Utc>>,
    /// Access time
    pub accessed: Option<DateTime<Utc>>,
    /// Modification time
    pub modified: Option<DateTime<Utc>>,
}

impl TimesToSet {
    /// Nothing to write
    pub fn is_empty(&self) -> bool {
        self.created.is_none() && self.accessed.is_none() && self.modified.is_none()
    }
}

/// Filesystem primitives the session calls
///
/// Each call is a single atomic operation; the session decides what a failure
/// means for the item. Implementations must not follow symlinks in [`find`],
/// so a dangling link still counts as an existing path.
///
/// [`find`]: FileSystem::find
pub trait FileSystem {
    /// Look up `path` without following symlinks
    fn find(&self, path: &Path) -> Option<FileInfo>;

    /// Create a single directory
    fn create_dir(&self, path: &Path) -> io::Result<()>;

    /// Remove an empty directory
    fn remove_dir(&self, path: &Path) -> io::Result<()>;

    /// Delete a file, clearing a read-only flag first if needed
    fn delete_file(&self, path: &Path) -> io::Result<()>;

    /// Move a file to a new name
    fn move_file(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Write timestamps onto a file or directory
    fn set_times(&self, path: &Path, times: &TimesToSet) -> io::Result<()>;

    /// Apply an archive attribute word
    fn set_attributes(&self, path: &Path, attributes: u32) -> io::Result<()>;

    /// Open an output file for writing
    ///
    /// With `truncate` the file is created fresh; otherwise it is created if
    /// missing and existing content is kept.
    fn open_output(&self, path: &Path, truncate: bool) -> io::Result<File>;
}

/// Merges a staged AppleDouble payload into a file's extended attributes
pub trait MetadataMerger {
    /// Merge the payload at `payload` into `target`
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be parsed or the attributes
    /// cannot be written. The session logs the failure and moves on.
    fn merge(&self, payload: &Path, target: &Path) -> io::Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;

    /// Whether [`merge`](Self::merge) can succeed at all
    ///
    /// The session stages AppleDouble items only for mergers that return
    /// `true`, and writes them as ordinary files otherwise.
    fn supports_merge(&self) -> bool {
        true
    }
}
