//! Overwrite policy for destination paths that already exist
//!
//! [`OverwritePolicy`] owns the session's [`OverwriteMode`]. The only
//! transitions are out of [`OverwriteMode::AskBefore`], driven by a prompt
//! answer; every other mode is terminal for the rest of the run.

use crate::error::{Error, ItemError, Result};
use crate::fs::FileSystem;
use crate::types::OverwriteAnswer;
use crate::utils::auto_rename_path;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How a conflict with an existing file is resolved
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverwriteMode {
    /// Ask the callback for every conflict (default)
    #[default]
    AskBefore,
    /// Keep the existing file, skip the item
    SkipExisting,
    /// Delete the existing file and write the item
    WithoutPrompt,
    /// Write the item under a free numbered name
    AutoRename,
    /// Move the existing file to a free numbered name, write the item in place
    AutoRenameExisting,
}

/// What the prompt collaborator is shown for a conflict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverwriteRequest {
    /// Destination path that already exists
    pub existing_path: PathBuf,
    /// Modification time of the existing file
    pub existing_modified: Option<DateTime<Utc>>,
    /// Size of the existing file
    pub existing_size: u64,
    /// Item path as reported by the archive
    pub item_path: String,
    /// Modification time of the new item
    pub item_modified: Option<DateTime<Utc>>,
    /// Declared size of the new item
    pub item_size: Option<u64>,
}

/// Result of applying a prompt answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptDecision {
    /// Leave the existing file alone
    Skip,
    /// Continue with the (possibly narrowed) mode
    Proceed,
}

/// Outcome of resolving one conflict
#[derive(Debug)]
pub enum ConflictOutcome {
    /// Write the item at this path
    Write(PathBuf),
    /// Skip the item silently
    Skip,
    /// Skip the item and report the error
    Failed(ItemError),
}

/// Session-scoped overwrite state
#[derive(Debug, Clone)]
pub struct OverwritePolicy {
    mode: OverwriteMode,
    max_rename_attempts: u32,
}

impl OverwritePolicy {
    /// Start in `mode`, searching at most `max_rename_attempts` names when renaming
    pub fn new(mode: OverwriteMode, max_rename_attempts: u32) -> Self {
        Self {
            mode,
            max_rename_attempts,
        }
    }

    /// Current mode
    pub fn mode(&self) -> OverwriteMode {
        self.mode
    }

    /// Apply a prompt answer
    ///
    /// Only valid while the mode is still [`OverwriteMode::AskBefore`]. The
    /// "-to-all" answers and auto-rename narrow the mode permanently.
    pub fn answer(&mut self, answer: OverwriteAnswer) -> Result<PromptDecision> {
        if self.mode != OverwriteMode::AskBefore {
            return Err(Error::InvalidState {
                operation: "answer overwrite prompt",
                state: "narrowed",
            });
        }

        let (narrow_to, decision) = match answer {
            OverwriteAnswer::Cancel => return Err(Error::Aborted),
            OverwriteAnswer::No => (None, PromptDecision::Skip),
            OverwriteAnswer::Yes => (None, PromptDecision::Proceed),
            OverwriteAnswer::NoToAll => (Some(OverwriteMode::SkipExisting), PromptDecision::Skip),
            OverwriteAnswer::YesToAll => (Some(OverwriteMode::WithoutPrompt), PromptDecision::Proceed),
            OverwriteAnswer::AutoRename => (Some(OverwriteMode::AutoRename), PromptDecision::Proceed),
        };

        if let Some(mode) = narrow_to {
            info!(?answer, ?mode, "overwrite mode narrowed for the rest of the run");
            self.mode = mode;
        }
        Ok(decision)
    }

    /// Decide what to do about `request.existing_path`, which already exists
    ///
    /// `ask` is called only in [`OverwriteMode::AskBefore`]. Fatal outcomes
    /// (cancel, prompt errors) come back as `Err`; everything the run can
    /// survive is a [`ConflictOutcome`].
    pub fn resolve(
        &mut self,
        fs: &dyn FileSystem,
        request: &OverwriteRequest,
        ask: impl FnOnce(&OverwriteRequest) -> Result<OverwriteAnswer>,
    ) -> Result<ConflictOutcome> {
        let target = request.existing_path.as_path();

        match self.mode {
            OverwriteMode::SkipExisting => {
                debug!(path = ?target, "existing file kept");
                return Ok(ConflictOutcome::Skip);
            }
            OverwriteMode::AskBefore => {
                let answer = ask(request)?;
                if self.answer(answer)? == PromptDecision::Skip {
                    debug!(path = ?target, ?answer, "existing file kept");
                    return Ok(ConflictOutcome::Skip);
                }
            }
            _ => {}
        }

        let outcome = match self.mode {
            OverwriteMode::AutoRename => match self.free_name(fs, target) {
                Some(renamed) => {
                    debug!(path = ?target, ?renamed, "writing item under a free name");
                    ConflictOutcome::Write(renamed)
                }
                None => ConflictOutcome::Failed(ItemError::CannotAutoRename {
                    path: target.to_path_buf(),
                }),
            },
            OverwriteMode::AutoRenameExisting => self.move_existing_aside(fs, target),
            // WithoutPrompt, or a one-off "yes" while still asking
            _ => match fs.delete_file(target) {
                Ok(()) => ConflictOutcome::Write(target.to_path_buf()),
                Err(e) => ConflictOutcome::Failed(ItemError::CannotDeleteOutputFile {
                    path: target.to_path_buf(),
                    reason: e.to_string(),
                }),
            },
        };

        if let ConflictOutcome::Failed(ref error) = outcome {
            warn!(path = ?target, code = error.error_code(), %error, "conflict not resolved, skipping item");
        }
        Ok(outcome)
    }

    fn free_name(&self, fs: &dyn FileSystem, path: &Path) -> Option<PathBuf> {
        auto_rename_path(path, self.max_rename_attempts, |p| fs.find(p).is_some())
    }

    fn move_existing_aside(&self, fs: &dyn FileSystem, target: &Path) -> ConflictOutcome {
        let Some(renamed) = self.free_name(fs, target) else {
            return ConflictOutcome::Failed(ItemError::CannotAutoRename {
                path: target.to_path_buf(),
            });
        };

        match fs.move_file(target, &renamed) {
            Ok(()) => {
                debug!(path = ?target, ?renamed, "existing file moved aside");
                ConflictOutcome::Write(target.to_path_buf())
            }
            Err(e) => ConflictOutcome::Failed(ItemError::CannotRenameExisting {
                path: target.to_path_buf(),
                renamed,
                reason: e.to_string(),
            }),
        }
    }
}
