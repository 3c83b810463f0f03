//! # extract-orchestrator
//!
//! Extraction orchestration for archive decoders: everything between "the
//! engine decoded some bytes" and "the right file exists on disk".
//!
//! ## Design Philosophy
//!
//! extract-orchestrator is designed to be:
//! - **Engine-agnostic** - Any decoder that can report item properties and
//!   write bytes plugs in through [`ArchiveEngine`]
//! - **Sensible defaults** - Full paths, ask before overwriting, modification
//!   times restored
//! - **Library-first** - No CLI or UI; prompts and progress go through
//!   [`ExtractCallback`]
//! - **Contained** - Every destination path is proven to stay under the
//!   destination root
//!
//! ## Quick Start
//!
//! ```
//! use extract_orchestrator::{
//!     ArchiveEngine, ArchiveReader, AskMode, ExtractSession, ExtractionConfig, NoOpCallback,
//!     OperationResult, ProgressSink, PropId, PropValue, Result,
//! };
//! use std::io::Write;
//!
//! /// A one-file "archive"
//! struct Single;
//!
//! impl ArchiveReader for Single {
//!     fn property(&self, _index: u32, prop: PropId) -> Result<PropValue> {
//!         Ok(match prop {
//!             PropId::Path => PropValue::Str("notes/hello.txt".into()),
//!             PropId::Size => PropValue::U64(5),
//!             _ => PropValue::Empty,
//!         })
//!     }
//! }
//!
//! impl ArchiveEngine for Single {
//!     fn item_count(&self) -> u32 {
//!         1
//!     }
//!
//!     fn extract(
//!         &mut self,
//!         _index: u32,
//!         _mode: AskMode,
//!         out: Option<&mut dyn Write>,
//!         progress: &mut dyn ProgressSink,
//!     ) -> Result<OperationResult> {
//!         if let Some(out) = out {
//!             out.write_all(b"hello")?;
//!         }
//!         progress.completed(5)?;
//!         Ok(OperationResult::Ok)
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! let dest = tempfile::tempdir()?;
//! let mut session = ExtractSession::new(ExtractionConfig::new(dest.path()), NoOpCallback)?;
//! session.run(&mut Single)?;
//! let summary = session.finish()?;
//!
//! assert_eq!(summary.files, 1);
//! assert_eq!(std::fs::read_to_string(dest.path().join("notes/hello.txt"))?, "hello");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Host callbacks and item filters
pub mod callback;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Filesystem and metadata-merge collaborators
pub mod fs;
/// Overwrite policy for existing destination files
pub mod overwrite;
/// Password resolution
pub mod password;
/// Progress aggregation across volumes
pub mod progress;
/// Destination path resolution
pub mod resolver;
/// Extraction session and engine protocol
pub mod session;
/// AppleDouble sidecar staging and merging
pub mod sidecar;
/// Per-item output streams
pub mod stream;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use callback::{AcceptAll, ExtractCallback, NoOpCallback, PathFilter};
pub use config::{ExtractionConfig, PathMode, TimestampConfig};
pub use error::{Error, ItemError, Result};
pub use fs::{FileSystem, LocalFileSystem, MetadataMerger, NoOpMetadataMerger};
pub use overwrite::{OverwriteMode, OverwriteRequest};
pub use session::{ArchiveEngine, ArchiveReader, ExtractSession, ItemState, ProgressSink};
pub use stream::ItemStream;
pub use types::{
    AskMode, ItemDescriptor, ItemTimes, OperationResult, OverwriteAnswer, PropId, PropValue,
    Summary,
};
