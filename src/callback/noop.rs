//! Non-interactive callback

use super::traits::ExtractCallback;
use crate::error::Result;
use crate::overwrite::OverwriteRequest;
use crate::types::OverwriteAnswer;

/// Callback for unattended runs
///
/// Ignores every notification and answers every overwrite prompt with
/// [`OverwriteAnswer::No`], so existing files are never touched unless the
/// configured [`crate::OverwriteMode`] says otherwise.
///
/// # Examples
///
/// ```
/// use extract_orchestrator::{ExtractionConfig, ExtractSession, NoOpCallback};
///
/// # fn main() -> extract_orchestrator::Result<()> {
/// let dest = tempfile::tempdir()?;
/// let session = ExtractSession::new(ExtractionConfig::new(dest.path()), NoOpCallback)?;
/// let summary = session.finish()?;
/// assert_eq!(summary.files, 0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpCallback;

impl ExtractCallback for NoOpCallback {
    fn ask_overwrite(&mut self, _request: &OverwriteRequest) -> Result<OverwriteAnswer> {
        Ok(OverwriteAnswer::No)
    }
}
