//! Utility functions for path manipulation

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Default upper bound for the numbered-suffix search
pub const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Find a free sibling name for `path` by appending a numbered suffix
///
/// Candidates are `stem (1).ext`, `stem (2).ext`, ... up to `max_attempts`.
/// `is_taken` decides whether a candidate collides; the caller supplies it so
/// the check uses the same existence semantics as the rest of the run.
///
/// Returns `None` when every candidate within the budget is taken or the
/// path has no file name.
///
/// # Examples
///
/// ```
/// use extract_orchestrator::utils::auto_rename_path;
/// use std::path::{Path, PathBuf};
///
/// let taken = [PathBuf::from("/out/movie (1).mkv")];
/// let free = auto_rename_path(Path::new("/out/movie.mkv"), 10, |p| taken.iter().any(|t| t == p));
/// assert_eq!(free, Some(PathBuf::from("/out/movie (2).mkv")));
/// ```
pub fn auto_rename_path(
    path: &Path,
    max_attempts: u32,
    mut is_taken: impl FnMut(&Path) -> bool,
) -> Option<PathBuf> {
    let stem = path.file_stem()?;
    let extension = path.extension();
    let parent = path.parent().unwrap_or_else(|| Path::new(""));

    for i in 1..=max_attempts {
        let mut name = OsString::from(stem);
        name.push(format!(" ({i})"));
        if let Some(ext) = extension {
            name.push(".");
            name.push(ext);
        }

        let candidate = parent.join(name);
        if !is_taken(&candidate) {
            return Some(candidate);
        }
    }

    None
}
