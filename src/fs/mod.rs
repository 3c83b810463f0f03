//! Filesystem and metadata-merge collaborators
//!
//! Every primitive the session performs on the destination goes through the
//! [`FileSystem`] trait so hosts can sandbox, instrument or fake it. The one
//! exception is the sidecar staging directory, which `tempfile` creates and
//! removes. AppleDouble payloads are handed to a [`MetadataMerger`].
//!
//! - [`LocalFileSystem`]: std + `filetime` implementation used by default
//! - [`NoOpMetadataMerger`]: reports every merge as unsupported

mod local;
mod noop;
mod traits;

pub use local::{LocalFileSystem, READONLY_ATTRIBUTE, UNIX_EXTENSION_FLAG};
pub use noop::NoOpMetadataMerger;
pub use traits::{FileInfo, FileSystem, MetadataMerger, TimesToSet};
