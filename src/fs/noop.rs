//! No-op metadata merger for platforms without extended attribute support

use super::traits::MetadataMerger;
use std::io;
use std::path::Path;

/// Metadata merger used when no attribute-merge facility is configured
///
/// Every merge fails with [`io::ErrorKind::Unsupported`], and
/// [`supports_merge`](MetadataMerger::supports_merge) is `false`, so while this
/// merger is installed the session writes `._name` items as ordinary files
/// instead of staging them.
///
/// # Examples
///
/// ```
/// use extract_orchestrator::fs::{MetadataMerger, NoOpMetadataMerger};
/// use std::path::Path;
///
/// let merger = NoOpMetadataMerger;
/// assert!(!merger.supports_merge());
/// assert!(merger.merge(Path::new("meta.1"), Path::new("report.txt")).is_err());
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpMetadataMerger;

impl MetadataMerger for NoOpMetadataMerger {
    fn merge(&self, _payload: &Path, _target: &Path) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "extended attribute merge requires a platform merger; \
             install one with ExtractSession::with_metadata_merger",
        ))
    }

    fn name(&self) -> &'static str {
        "noop"
    }

    fn supports_merge(&self) -> bool {
        false
    }
}
