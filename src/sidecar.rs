//! AppleDouble sidecar handling
//!
//! Archives created on macOS carry resource forks and extended attributes as
//! separate `._name` items, often under a top-level `__MACOSX` container.
//! Those payloads are staged into a session-private directory while the run
//! is in progress and merged into their owning file once it exists.

use crate::fs::{FileSystem, MetadataMerger};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Top-level container directory for AppleDouble payloads
pub const CONTAINER: &str = "__MACOSX";

/// File name prefix of an AppleDouble payload
pub const PREFIX: &str = "._";

/// How an item relates to the sidecar convention
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SidecarKind {
    /// Ordinary item
    Regular,
    /// Metadata payload for the file at these components
    Metadata(Vec<String>),
    /// Container entry that carries nothing; skipped silently
    Noise,
}

/// Classify split item components
pub fn classify(components: &[String], is_dir: bool) -> SidecarKind {
    let Some(name) = components.last() else {
        return SidecarKind::Regular;
    };
    let enclosed = components.first().is_some_and(|c| c == CONTAINER);
    let is_payload = !is_dir && name.starts_with(PREFIX) && name.chars().count() > PREFIX.len();

    if enclosed && !is_payload {
        return SidecarKind::Noise;
    }
    if !is_payload {
        return SidecarKind::Regular;
    }

    let skip = usize::from(enclosed);
    let mut target: Vec<String> = components[skip..].to_vec();
    if let Some(last) = target.last_mut() {
        last.drain(..PREFIX.len());
    }
    SidecarKind::Metadata(target)
}

/// A staged payload waiting to be merged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarEntry {
    /// Staged payload file
    pub payload: PathBuf,
    /// File the payload belongs to
    pub target: PathBuf,
}

/// Counters from one drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Payloads merged into their target
    pub merged: u64,
    /// Entries whose target did not exist
    pub missing: u64,
    /// Merges the merger rejected
    pub failed: u64,
}

/// Ordered queue of staged payloads, owning the staging directory
#[derive(Debug)]
pub struct SidecarQueue {
    root: PathBuf,
    staging: Option<TempDir>,
    entries: Vec<SidecarEntry>,
}

impl SidecarQueue {
    /// Create an empty queue that stages under `root` on first use
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            staging: None,
            entries: Vec::new(),
        }
    }

    /// Number of queued entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Queued entries in enqueue order
    pub fn entries(&self) -> &[SidecarEntry] {
        &self.entries
    }

    /// Staging directory, once created
    pub fn staging_dir(&self) -> Option<&Path> {
        self.staging.as_ref().map(TempDir::path)
    }

    /// Create a fresh payload file for `target` and queue it
    pub fn stage(&mut self, target: PathBuf) -> io::Result<(File, PathBuf)> {
        let staging = match self.staging.take() {
            Some(dir) => dir,
            None => tempfile::Builder::new()
                .prefix(".metadata.")
                .tempdir_in(&self.root)?,
        };
        let staging = self.staging.insert(staging);

        let (file, payload) = tempfile::Builder::new()
            .prefix("meta.")
            .tempfile_in(staging.path())?
            .keep()?;

        debug!(?payload, ?target, "sidecar payload staged");
        self.entries.push(SidecarEntry {
            payload: payload.clone(),
            target,
        });
        Ok((file, payload))
    }

    /// Merge every entry in enqueue order, then remove the staging directory
    ///
    /// A missing target is skipped, a failed merge is logged, and every payload
    /// is removed either way. Draining an empty queue does nothing.
    pub fn drain(&mut self, fs: &dyn FileSystem, merger: &dyn MetadataMerger) -> DrainReport {
        let mut report = DrainReport::default();

        for entry in self.entries.drain(..) {
            if fs.find(&entry.target).is_none() {
                debug!(target = ?entry.target, "sidecar target missing, merge skipped");
                report.missing += 1;
            } else {
                match merger.merge(&entry.payload, &entry.target) {
                    Ok(()) => report.merged += 1,
                    Err(e) => {
                        warn!(
                            target = ?entry.target,
                            merger = merger.name(),
                            error = %e,
                            "sidecar merge failed"
                        );
                        report.failed += 1;
                    }
                }
            }

            if let Err(e) = fs.delete_file(&entry.payload) {
                debug!(payload = ?entry.payload, error = %e, "could not remove staged payload");
            }
        }

        if let Some(staging) = self.staging.take() {
            let path = staging.path().to_path_buf();
            if let Err(e) = staging.close() {
                warn!(?path, error = %e, "could not remove sidecar staging directory");
            }
            info!(
                merged = report.merged,
                missing = report.missing,
                failed = report.failed,
                "sidecar queue drained"
            );
        }

        report
    }
}
