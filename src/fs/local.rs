//! [`FileSystem`] backed by the local disk

use super::traits::{FileInfo, FileSystem, TimesToSet};
use chrono::{DateTime, Utc};
use filetime::FileTime;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use tracing::debug;

/// Attribute flag meaning the high 16 bits carry unix mode bits
pub const UNIX_EXTENSION_FLAG: u32 = 0x8000;

/// Permission bits honoured from an archive; special mode bits are dropped
#[cfg(unix)]
const UNIX_PERMISSION_MASK: u32 = 0o777;

/// Read-only attribute bit
pub const READONLY_ATTRIBUTE: u32 = 0x1;

/// Local filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystem;

fn to_file_time(time: DateTime<Utc>) -> FileTime {
    FileTime::from_unix_time(time.timestamp(), time.timestamp_subsec_nanos())
}

impl FileSystem for LocalFileSystem {
    fn find(&self, path: &Path) -> Option<FileInfo> {
        let meta = fs::symlink_metadata(path).ok()?;
        Some(FileInfo {
            is_dir: meta.is_dir(),
            size: meta.len(),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
        })
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        fs::create_dir(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path)
    }

    fn delete_file(&self, path: &Path) -> io::Result<()> {
        match fs::remove_file(path) {
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                // Clear the read-only bit and retry once
                let mut perms = fs::symlink_metadata(path)?.permissions();
                if !perms.readonly() {
                    return Err(e);
                }
                #[allow(clippy::permissions_set_readonly_false)]
                perms.set_readonly(false);
                fs::set_permissions(path, perms)?;
                fs::remove_file(path)
            }
            other => other,
        }
    }

    fn move_file(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn set_times(&self, path: &Path, times: &TimesToSet) -> io::Result<()> {
        if times.created.is_some() {
            debug!(?path, "creation time is not settable through this filesystem");
        }
        if let Some(accessed) = times.accessed {
            filetime::set_file_atime(path, to_file_time(accessed))?;
        }
        if let Some(modified) = times.modified {
            filetime::set_file_mtime(path, to_file_time(modified))?;
        }
        Ok(())
    }

    fn set_attributes(&self, path: &Path, attributes: u32) -> io::Result<()> {
        let mut perms = fs::metadata(path)?.permissions();

        #[cfg(unix)]
        if attributes & UNIX_EXTENSION_FLAG != 0 {
            use std::os::unix::fs::PermissionsExt;
            perms.set_mode((attributes >> 16) & UNIX_PERMISSION_MASK);
            return fs::set_permissions(path, perms);
        }

        if attributes & READONLY_ATTRIBUTE != 0 {
            perms.set_readonly(true);
            fs::set_permissions(path, perms)?;
        }
        Ok(())
    }

    fn open_output(&self, path: &Path, truncate: bool) -> io::Result<File> {
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(truncate)
            .open(path)
    }
}
