//! Error types for extract-orchestrator
//!
//! Errors come in two tiers:
//! - [`Error`]: fatal conditions that terminate the whole extraction run
//! - [`ItemError`]: per-item conditions that are reported through the callback,
//!   cause the current item to be skipped, and never escape the item lifecycle
//!
//! Both carry machine-readable codes so hosts can react programmatically.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::PropId;

/// Result type alias for extract-orchestrator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal error that aborts the extraction run
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "path_mode")
        key: Option<String>,
    },

    /// The engine returned a property of the wrong type
    #[error("item {index}: property {property:?} has unexpected type (expected {expected})")]
    InvalidPropertyType {
        /// Archive index of the item
        index: u32,
        /// The property that was read
        property: PropId,
        /// The type the core required
        expected: &'static str,
    },

    /// The item path has no usable components
    #[error("malformed item path '{path}'")]
    MalformedPath {
        /// The raw path reported by the engine
        path: String,
    },

    /// `current` path mode could not strip the configured prefix
    #[error("item path '{path}' does not start with '{prefix}'")]
    PrefixMismatch {
        /// The raw path reported by the engine
        path: String,
        /// The prefix that was expected, joined with '/'
        prefix: String,
    },

    /// A resolved path ended up outside the destination root
    #[error("item path '{path}' resolves outside the destination: '{resolved}'")]
    PathEscape {
        /// The raw path reported by the engine
        path: String,
        /// The path it resolved to
        resolved: PathBuf,
    },

    /// The overwrite prompt returned a value outside the known answers
    #[error("invalid overwrite prompt answer: {0}")]
    InvalidPromptAnswer(i32),

    /// Extraction cancelled by the user or the progress callback
    #[error("extraction aborted")]
    Aborted,

    /// The engine reported a fatal result for an item
    #[error("item {index} failed with operation result {code}")]
    ItemFailed {
        /// Archive index of the item
        index: u32,
        /// The raw result code
        code: i32,
    },

    /// A protocol call arrived in the wrong item state
    #[error("cannot {operation} while item is {state}")]
    InvalidState {
        /// The call that was made (e.g., "prepare_operation")
        operation: &'static str,
        /// The state the item lifecycle was in
        state: &'static str,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::InvalidPropertyType { .. } => "invalid_property_type",
            Error::MalformedPath { .. } => "malformed_path",
            Error::PrefixMismatch { .. } => "prefix_mismatch",
            Error::PathEscape { .. } => "path_escape",
            Error::InvalidPromptAnswer(_) => "invalid_prompt_answer",
            Error::Aborted => "aborted",
            Error::ItemFailed { .. } => "item_failed",
            Error::InvalidState { .. } => "invalid_state",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
        }
    }

    /// Whether this error came from the user cancelling the run
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Aborted)
    }
}

/// Non-fatal per-item error
///
/// These are reported through [`crate::ExtractCallback::message_error`] and the
/// item is skipped; the run continues with the next item.
#[derive(Debug, Error)]
pub enum ItemError {
    /// No free name could be derived within the rename budget
    #[error("can not create file with auto name: {path}")]
    CannotAutoRename {
        /// The path that collided
        path: PathBuf,
    },

    /// The existing file could not be moved aside
    #[error("can not rename existing file {path} to {renamed}: {reason}")]
    CannotRenameExisting {
        /// The existing file
        path: PathBuf,
        /// The free name it should have been moved to
        renamed: PathBuf,
        /// The reason the move failed
        reason: String,
    },

    /// The existing file could not be deleted before overwriting
    #[error("can not delete output file {path}: {reason}")]
    CannotDeleteOutputFile {
        /// The existing file
        path: PathBuf,
        /// The reason deletion failed
        reason: String,
    },

    /// The destination file could not be opened for writing
    #[error("can not open output file {path}: {reason}")]
    CannotOpenOutputFile {
        /// The destination file
        path: PathBuf,
        /// The reason opening failed
        reason: String,
    },
}

impl ItemError {
    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            ItemError::CannotAutoRename { .. } => "cannot_auto_rename",
            ItemError::CannotRenameExisting { .. } => "cannot_rename_existing",
            ItemError::CannotDeleteOutputFile { .. } => "cannot_delete_output_file",
            ItemError::CannotOpenOutputFile { .. } => "cannot_open_output_file",
        }
    }

    /// The destination path the error refers to
    pub fn path(&self) -> &std::path::Path {
        match self {
            ItemError::CannotAutoRename { path }
            | ItemError::CannotRenameExisting { path, .. }
            | ItemError::CannotDeleteOutputFile { path, .. }
            | ItemError::CannotOpenOutputFile { path, .. } => path,
        }
    }
}
