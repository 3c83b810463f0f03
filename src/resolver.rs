//! Path resolution and sanitization
//!
//! Turns an engine-reported item path into a destination path that is
//! guaranteed to live under the destination root:
//!
//! 1. split on both `/` and `\`
//! 2. apply the configured [`PathMode`]
//! 3. drop `.`/`..` components and replace characters the target filesystem
//!    cannot store
//! 4. join under the root and verify containment

use crate::config::PathMode;
use crate::error::{Error, Result};
use crate::fs::{FileSystem, TimesToSet};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Replacement for characters that cannot appear in a file name
const REPLACEMENT: char = '_';

/// Split a raw archive path into its non-empty components
pub fn split_path(raw: &str) -> Vec<String> {
    raw.split(['/', '\\'])
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Apply a path mode to already-split components
///
/// `raw` is only used for error context.
pub fn apply_path_mode(mut components: Vec<String>, mode: &PathMode, raw: &str) -> Result<Vec<String>> {
    if components.is_empty() {
        return Err(Error::MalformedPath {
            path: raw.to_string(),
        });
    }

    match mode {
        PathMode::Full => {}
        PathMode::Current { remove_prefix } => {
            let mismatch = || Error::PrefixMismatch {
                path: raw.to_string(),
                prefix: remove_prefix.join("/"),
            };
            if components.len() <= remove_prefix.len() {
                return Err(mismatch());
            }
            let matches = remove_prefix
                .iter()
                .zip(&components)
                .all(|(want, got)| want.to_lowercase() == got.to_lowercase());
            if !matches {
                return Err(mismatch());
            }
            components.drain(..remove_prefix.len());
        }
        PathMode::Flat => {
            let last = components.len() - 1;
            components.drain(..last);
        }
    }

    Ok(components)
}

fn is_illegal(c: char) -> bool {
    if c == '\0' || c.is_control() {
        return true;
    }
    cfg!(windows) && matches!(c, '<' | '>' | ':' | '"' | '|' | '?' | '*')
}

/// Make a single component storable, or `None` if it must be dropped
pub fn correct_component(component: &str) -> Option<String> {
    if component.is_empty() || component == "." || component == ".." {
        return None;
    }

    let mut name: String = component
        .chars()
        .map(|c| if is_illegal(c) { REPLACEMENT } else { c })
        .collect();

    if cfg!(windows) {
        // Windows silently strips trailing dots and spaces
        let kept = name.trim_end_matches(['.', ' ']).len();
        let trailing = name.len() - kept;
        name.truncate(kept);
        name.extend(std::iter::repeat_n(REPLACEMENT, trailing));
    }

    Some(name)
}

/// Drop traversal components and sanitize the rest
pub fn correct_components(components: &[String]) -> Vec<String> {
    components
        .iter()
        .filter_map(|c| correct_component(c))
        .collect()
}

/// A destination path known to be inside the destination root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Sanitized components relative to the root
    pub components: Vec<String>,
    /// Absolute destination path
    pub path: PathBuf,
}

/// Maps item paths to destination paths for one session
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    mode: PathMode,
}

impl PathResolver {
    /// Create a resolver rooted at `root`
    pub fn new(root: impl Into<PathBuf>, mode: PathMode) -> Self {
        Self {
            root: root.into(),
            mode,
        }
    }

    /// Destination root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve split components of the item whose raw path is `raw`
    pub fn resolve(&self, raw: &str, components: Vec<String>) -> Result<ResolvedPath> {
        let components = apply_path_mode(components, &self.mode, raw)?;
        let components = correct_components(&components);
        if components.is_empty() {
            return Err(Error::MalformedPath {
                path: raw.to_string(),
            });
        }

        let path = self.join(&components);
        if !path.starts_with(&self.root) || path == self.root {
            return Err(Error::PathEscape {
                path: raw.to_string(),
                resolved: path,
            });
        }

        Ok(ResolvedPath { components, path })
    }

    /// Join sanitized components under the root
    pub fn join(&self, components: &[String]) -> PathBuf {
        let mut path = self.root.clone();
        path.extend(components);
        path
    }

    /// Create the root and any missing ancestors, shallowest first
    pub fn create_root(&self, fs: &dyn FileSystem) -> io::Result<()> {
        let missing: Vec<&Path> = self
            .root
            .ancestors()
            .take_while(|p| !p.as_os_str().is_empty() && fs.find(p).is_none())
            .collect();
        for path in missing.into_iter().rev() {
            match fs.create_dir(path) {
                Err(e) if e.kind() != io::ErrorKind::AlreadyExists => return Err(e),
                _ => debug!(?path, "destination directory created"),
            }
        }
        Ok(())
    }

    /// Create every directory in `components`, shallowest first
    ///
    /// Creation errors are ignored: a directory that already exists is the
    /// common case, and any real failure surfaces when the leaf is opened.
    /// Returns the deepest directory path.
    pub fn create_dirs(&self, fs: &dyn FileSystem, components: &[String]) -> PathBuf {
        let mut path = self.root.clone();
        for component in components {
            path.push(component);
            if fs.find(&path).is_some_and(|info| info.is_dir) {
                continue;
            }
            if let Err(e) = fs.create_dir(&path) {
                debug!(?path, error = %e, "could not create directory");
            }
        }
        path
    }

    /// Create a directory item's directory chain and stamp its times
    pub fn create_dir_item(
        &self,
        fs: &dyn FileSystem,
        components: &[String],
        times: &TimesToSet,
    ) -> PathBuf {
        let path = self.create_dirs(fs, components);
        if !times.is_empty()
            && let Err(e) = fs.set_times(&path, times)
        {
            debug!(?path, error = %e, "could not stamp directory times");
        }
        path
    }
}
